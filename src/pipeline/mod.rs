//! Pipeline driver (§4.5): pulls packets from a source, drives the flow
//! table, periodically scans for expired flows, and drains everything on
//! shutdown. Generalizes the teacher's `processor::engine::processing_loop`
//! (crossbeam `select!` over a packet channel and a tick timer) to run
//! against the `PacketSource` trait instead of a hardwired sniffer channel,
//! so the same loop drives both live and offline capture.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

use crate::capture::{CaptureEvent, PacketSource};
use crate::flow::{FlowTable, Limits};
use crate::sink::Sink;

/// Cheap-to-read counters for non-propagating events (§10.11/§10.12):
/// malformed packets are counted here when a source reports a decode
/// failure (the decoder itself only classifies, it never counts — see
/// §10.1), clock regressions are packets whose timestamp moves backwards
/// relative to the flow they land in, and table overflow evictions mirror
/// `FlowTable`'s own counter.
#[derive(Debug, Default)]
pub struct Counters {
    pub malformed_packets: AtomicU64,
    pub clock_regressions: AtomicU64,
    pub table_overflow_evictions: AtomicU64,
    pub flows_emitted: AtomicU64,
}

impl Counters {
    pub fn log_summary(&self) {
        info!(
            malformed_packets = self.malformed_packets.load(Ordering::Relaxed),
            clock_regressions = self.clock_regressions.load(Ordering::Relaxed),
            table_overflow_evictions = self.table_overflow_evictions.load(Ordering::Relaxed),
            flows_emitted = self.flows_emitted.load(Ordering::Relaxed),
            "pipeline counters"
        );
    }
}

pub struct Driver<S: PacketSource> {
    source: S,
    table: FlowTable,
    counters: Counters,
    expire_scan_interval_packets: u64,
}

impl<S: PacketSource> Driver<S> {
    pub fn new(source: S, limits: Limits, expire_scan_interval_packets: u64) -> Self {
        Self {
            source,
            table: FlowTable::new(limits),
            counters: Counters::default(),
            expire_scan_interval_packets,
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Runs until the source is exhausted, pushing completed and expired
    /// flow records to `sink`, then drains whatever is left in the table.
    pub fn run(&mut self, sink: &mut dyn Sink) -> crate::error::Result<()> {
        let mut packets_since_scan: u64 = 0;
        let mut last_now: u64 = 0;

        loop {
            let pkt = match self.source.next_event() {
                CaptureEvent::Packet(pkt) => pkt,
                CaptureEvent::Malformed => {
                    self.counters.malformed_packets.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                CaptureEvent::Eof => break,
            };

            let ts = pkt.timestamp_micros();
            if ts < last_now {
                self.counters.clock_regressions.fetch_add(1, Ordering::Relaxed);
            }
            last_now = last_now.max(ts);

            if let Some(record) = self.table.ingest(&pkt) {
                sink.push(&record)?;
            }

            packets_since_scan += 1;
            if packets_since_scan >= self.expire_scan_interval_packets {
                packets_since_scan = 0;
                for record in self.table.expire_scan(last_now) {
                    sink.push(&record)?;
                }
            }
        }

        for record in self.table.drain() {
            sink.push(&record)?;
        }
        sink.flush()?;

        self.counters.table_overflow_evictions.store(self.table.stats().overflow_evictions, Ordering::Relaxed);
        self.counters.flows_emitted.store(self.table.stats().flows_emitted, Ordering::Relaxed);
        self.counters.log_summary();

        Ok(())
    }
}
