//! Live capture off a named interface, generalizing the teacher's
//! `capture::sniffer::PacketSniffer` (IPv4/TCP-only, start/stop lifecycle)
//! into a thread that forwards decoded packets over a bounded channel until
//! told to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver};
use pcap::{Capture, Device};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

use super::decode::decode;
use super::CaptureEvent;

const CHANNEL_CAPACITY: usize = 4096;

pub struct NetworkInterface {
    pub name: String,
    pub description: String,
    pub is_up: bool,
}

pub fn list_interfaces() -> Result<Vec<NetworkInterface>> {
    let devices = Device::list().map_err(|e| Error::Capture(e.to_string()))?;
    Ok(devices
        .into_iter()
        .map(|d| NetworkInterface {
            name: d.name,
            description: d.desc.unwrap_or_else(|| "No description".to_string()),
            is_up: d.flags.is_up(),
        })
        .collect())
}

/// Owns the capture thread for one interface. Dropping this (or calling
/// `stop`) joins the thread.
pub struct LiveCapture {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    receiver: Receiver<CaptureEvent>,
}

impl LiveCapture {
    pub fn start(interface: &str) -> Result<Self> {
        let mut cap = Capture::from_device(interface)
            .map_err(|e| Error::Capture(e.to_string()))?
            .promisc(true)
            .immediate_mode(true)
            .timeout(10)
            .open()
            .map_err(|e| Error::Capture(e.to_string()))?;

        info!(interface, "live capture opened");

        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();

        let thread = thread::spawn(move || {
            while thread_running.load(Ordering::Relaxed) {
                let event = match cap.next_packet() {
                    Ok(raw) => match decode(raw.header, raw.data) {
                        Ok(pkt) => CaptureEvent::Packet(pkt),
                        Err(_) => CaptureEvent::Malformed,
                    },
                    Err(pcap::Error::TimeoutExpired) => continue,
                    Err(e) => {
                        error!(error = %e, "capture error, stopping thread");
                        break;
                    }
                };
                if tx.try_send(event).is_err() {
                    warn!("packet channel full, dropping event");
                }
            }
            debug!("live capture thread exiting");
        });

        Ok(Self { running, thread: Some(thread), receiver: rx })
    }

    pub fn receiver(&self) -> Receiver<CaptureEvent> {
        self.receiver.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LiveCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
