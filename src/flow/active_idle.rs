//! Active/idle period detector (§4.2 "Active/Idle update"). This follows the
//! cleaned-up algorithm the spec gives directly (SPEC_FULL.md §4.2), not the
//! original Python's literal `update_active_idle`, which conflates a time
//! delta with an absolute timestamp — see S4 in the test below for the
//! scenario this resolves.

use super::stats::StatAccumulator;

#[derive(Debug, Clone, Default)]
pub struct ActiveIdleDetector {
    start_active: u64,
    last_active: u64,
    pub active: StatAccumulator,
    pub idle: StatAccumulator,
}

impl ActiveIdleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `latest_timestamp` is the flow's `latest_timestamp` *before* this
    /// packet is folded in. `ts` is this packet's timestamp.
    pub fn on_packet(&mut self, ts: u64, latest_timestamp: u64, clump_timeout: u64, active_timeout: u64) {
        let reference = if latest_timestamp == 0 { ts } else { latest_timestamp };
        let gap = ts.saturating_sub(reference);

        if gap > clump_timeout {
            if gap > active_timeout {
                if self.last_active > self.start_active {
                    let duration = self.last_active - self.start_active;
                    self.active.push(duration as f64);
                }
                self.idle.push(gap as f64);
                self.start_active = ts;
                self.last_active = ts;
            } else {
                self.last_active = ts;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLUMP_TIMEOUT_US: u64 = 1_000_000;
    const ACTIVE_TIMEOUT_US: u64 = 5_000_000;

    /// S4 — idle gap: two packets 10s apart (> ACTIVE_TIMEOUT).
    #[test]
    fn s4_idle_gap_recorded_active_stays_empty() {
        let mut d = ActiveIdleDetector::new();
        // first packet: latest_timestamp is 0 (no prior packet), handled
        // by the caller never invoking on_packet for packet #1.
        d.on_packet(10_000_000, 0, CLUMP_TIMEOUT_US, ACTIVE_TIMEOUT_US);
        assert_eq!(d.idle.count(), 1);
        assert!((d.idle.total() - 1.0e7).abs() < 1.0);
        assert_eq!(d.active.count(), 0);
    }

    #[test]
    fn gap_within_clump_timeout_is_ignored() {
        let mut d = ActiveIdleDetector::new();
        d.on_packet(500_000, 0, CLUMP_TIMEOUT_US, ACTIVE_TIMEOUT_US);
        assert_eq!(d.idle.count(), 0);
        assert_eq!(d.active.count(), 0);
    }

    #[test]
    fn moderate_gap_extends_active_without_closing() {
        let mut d = ActiveIdleDetector::new();
        // gap of 2s: beyond clump timeout but within active timeout.
        d.on_packet(2_000_000, 0, CLUMP_TIMEOUT_US, ACTIVE_TIMEOUT_US);
        assert_eq!(d.idle.count(), 0);
        assert_eq!(d.active.count(), 0);
    }
}
