//! Packet sources (§10.1): a live interface or an offline capture file, both
//! exposed through the same `PacketSource` trait so the pipeline driver
//! doesn't care which one it's pulling from.

mod decode;
mod live;
mod offline;

use std::time::Duration;

pub use live::{list_interfaces, LiveCapture, NetworkInterface};
pub use offline::OfflineCapture;

use crate::packet::Packet;

const RECV_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// One unit of progress from a packet source. Decode failures are surfaced
/// as `Malformed` rather than silently skipped inside the source, so the
/// pipeline driver — not the decoder — is the place that turns them into a
/// counted drop (§10.1, §10.11).
pub enum CaptureEvent {
    Packet(Packet),
    Malformed,
    Eof,
}

pub trait PacketSource {
    fn next_event(&mut self) -> CaptureEvent;
}

impl PacketSource for OfflineCapture {
    fn next_event(&mut self) -> CaptureEvent {
        self.poll()
    }
}

/// Wraps a `LiveCapture`'s channel with a bounded poll so the driver loop
/// can periodically check its own shutdown flag between packets.
pub struct LiveSource {
    capture: LiveCapture,
}

impl LiveSource {
    pub fn new(capture: LiveCapture) -> Self {
        Self { capture }
    }
}

impl PacketSource for LiveSource {
    fn next_event(&mut self) -> CaptureEvent {
        let rx = self.capture.receiver();
        loop {
            match rx.recv_timeout(RECV_POLL_TIMEOUT) {
                Ok(event) => return event,
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    if !self.capture.is_running() {
                        return CaptureEvent::Eof;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return CaptureEvent::Eof,
            }
        }
    }
}
