//! CLI entry point (§10.4): wires a packet source (live interface or
//! capture file) through the pipeline driver into a CSV or JSON-lines sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flowmeter::capture::{list_interfaces, CaptureEvent, LiveCapture, LiveSource, OfflineCapture, PacketSource};
use flowmeter::config::Config;
use flowmeter::error::{Error, Result};
use flowmeter::pipeline::Driver;
use flowmeter::sink::{CsvSink, JsonLinesSink, Sink};

#[derive(Parser, Debug)]
#[command(name = "flowmeter", about = "Bidirectional network-flow feature extractor")]
struct Cli {
    /// Capture live from this interface.
    #[arg(long, conflicts_with = "read")]
    interface: Option<String>,

    /// Replay packets from this capture file instead of a live interface.
    #[arg(long)]
    read: Option<String>,

    /// Where to write completed flow records.
    #[arg(long)]
    output: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Optional TOML config file with flow-table tunables.
    #[arg(long)]
    config: Option<String>,

    /// Print available capture interfaces and exit.
    #[arg(long)]
    list_interfaces: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))).init();

    let cli = Cli::parse();

    if cli.list_interfaces {
        for iface in list_interfaces()? {
            println!("{}\t{}\t{}", iface.name, if iface.is_up { "up" } else { "down" }, iface.description);
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.validate()?;
    let limits = config.to_limits();

    let output_path = cli.output.as_deref().ok_or_else(|| Error::Config("--output is required unless --list-interfaces is given".into()))?;

    let mut sink: Box<dyn Sink> = match cli.format {
        OutputFormat::Csv => Box::new(CsvSink::create(output_path)?),
        OutputFormat::Json => Box::new(JsonLinesSink::create(output_path)?),
    };

    match (&cli.interface, &cli.read) {
        (Some(interface), None) => run_live(interface, limits, config.expire_scan_interval_packets, sink.as_mut()),
        (None, Some(path)) => run_offline(path, limits, config.expire_scan_interval_packets, sink.as_mut()),
        (Some(_), Some(_)) => Err(Error::Config("--interface and --read are mutually exclusive".into())),
        (None, None) => Err(Error::Config("one of --interface or --read is required".into())),
    }
}

fn run_live(interface: &str, limits: flowmeter::flow::Limits, scan_interval: u64, sink: &mut dyn Sink) -> Result<()> {
    let capture = LiveCapture::start(interface)?;
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("shutdown requested, draining flows");
        handler_flag.store(true, Ordering::Relaxed);
    })
    .map_err(|e| Error::Capture(e.to_string()))?;

    let source = ShutdownAwareSource { inner: LiveSource::new(capture), shutdown };
    let mut driver = Driver::new(source, limits, scan_interval);
    driver.run(sink)
}

fn run_offline(path: &str, limits: flowmeter::flow::Limits, scan_interval: u64, sink: &mut dyn Sink) -> Result<()> {
    let capture = OfflineCapture::open(path)?;
    let mut driver = Driver::new(capture, limits, scan_interval);
    driver.run(sink)
}

/// Stops pulling packets once Ctrl-C flips `shutdown`, letting the driver's
/// own EOF-triggered drain handle the cooperative shutdown.
struct ShutdownAwareSource {
    inner: LiveSource,
    shutdown: Arc<AtomicBool>,
}

impl PacketSource for ShutdownAwareSource {
    fn next_event(&mut self) -> CaptureEvent {
        if self.shutdown.load(Ordering::Relaxed) {
            return CaptureEvent::Eof;
        }
        self.inner.next_event()
    }
}
