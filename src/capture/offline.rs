//! Offline replay from a capture file, used for deterministic scenario
//! fixtures and file-driven runs of the CLI (§10.1).

use pcap::Capture;
use tracing::debug;

use crate::error::{Error, Result};

use super::decode::decode;
use super::CaptureEvent;

pub struct OfflineCapture {
    inner: Capture<pcap::Offline>,
}

impl OfflineCapture {
    pub fn open(path: &str) -> Result<Self> {
        let inner = Capture::from_file(path).map_err(|e| Error::Capture(e.to_string()))?;
        Ok(Self { inner })
    }

    /// One decode attempt per underlying captured frame: a failed decode is
    /// reported as `Malformed`, not silently skipped, so the caller can
    /// count it.
    pub(super) fn poll(&mut self) -> CaptureEvent {
        match self.inner.next_packet() {
            Ok(raw) => match decode(raw.header, raw.data) {
                Ok(pkt) => CaptureEvent::Packet(pkt),
                Err(e) => {
                    debug!(error = %e, "unparseable packet");
                    CaptureEvent::Malformed
                }
            },
            Err(pcap::Error::NoMorePackets) => CaptureEvent::Eof,
            Err(e) => {
                debug!(error = %e, "capture read error, stopping replay");
                CaptureEvent::Eof
            }
        }
    }
}
