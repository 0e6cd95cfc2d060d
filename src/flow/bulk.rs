//! Bulk-transfer detector (§4.2 "Bulk update"), independently instantiated
//! per direction. A "tentative bulk" is a burst of payload-carrying packets
//! uninterrupted by the opposite direction or by gaps >= CLUMP_TIMEOUT; it is
//! confirmed once `BULK_BOUND` packets have accumulated.

#[derive(Debug, Clone, Copy, Default)]
pub struct BulkDetector {
    start_tmp: u64,
    last_tmp: u64,
    count_tmp: u32,
    size_tmp: u64,

    pub count: u64,
    pub packet_count: u64,
    pub size: u64,
    pub duration: u64,
}

impl BulkDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// `opposite_last_tmp` is the other direction's `last_tmp`, used to reset
    /// this detector when the opposite direction has been more active since
    /// this one's tentative bulk opened.
    pub fn on_packet(&mut self, ts: u64, payload_len: u32, bulk_bound: u32, clump_timeout: u64, opposite_last_tmp: u64) {
        if payload_len == 0 {
            return;
        }

        if opposite_last_tmp > self.start_tmp {
            self.start_tmp = 0;
        }

        if self.start_tmp == 0 {
            self.start_tmp = ts;
            self.last_tmp = ts;
            self.count_tmp = 1;
            self.size_tmp = payload_len as u64;
        } else if ts.saturating_sub(self.last_tmp) > clump_timeout {
            self.start_tmp = ts;
            self.last_tmp = ts;
            self.count_tmp = 1;
            self.size_tmp = payload_len as u64;
        } else {
            self.count_tmp += 1;
            self.size_tmp += payload_len as u64;

            if self.count_tmp == bulk_bound {
                self.count += 1;
                self.packet_count += self.count_tmp as u64;
                self.size += self.size_tmp;
                self.duration += ts.saturating_sub(self.start_tmp);
            } else if self.count_tmp > bulk_bound {
                self.packet_count += 1;
                self.size += payload_len as u64;
                self.duration += ts.saturating_sub(self.last_tmp);
            }
            self.last_tmp = ts;
        }
    }

    pub fn last_tmp(&self) -> u64 {
        self.last_tmp
    }

    pub fn bytes_per_bulk(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.size as f64 / self.count as f64
        }
    }

    pub fn packets_per_bulk(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.packet_count as f64 / self.count as f64
        }
    }

    pub fn bulk_rate(&self) -> f64 {
        if self.duration == 0 {
            0.0
        } else {
            self.size as f64 / (self.duration as f64 / 1_000_000.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BULK_BOUND: u32 = 4;
    const CLUMP_TIMEOUT_US: u64 = 1_000_000;

    /// S3 — bulk forward: t=0,0.01,0.02,0.03 A->B each 1000B payload.
    #[test]
    fn s3_confirms_on_fourth_packet() {
        let mut d = BulkDetector::new();
        for i in 0..4u64 {
            d.on_packet(i * 10_000, 1000, BULK_BOUND, CLUMP_TIMEOUT_US, 0);
        }
        assert_eq!(d.count, 1);
        assert_eq!(d.packet_count, 4);
        assert_eq!(d.size, 4000);
        assert_eq!(d.duration, 30_000);
        assert_eq!(d.packets_per_bulk(), 4.0);
        assert_eq!(d.bytes_per_bulk(), 4000.0);
        let expected_rate = 4000.0 / (30_000.0 / 1_000_000.0);
        assert!((d.bulk_rate() - expected_rate).abs() < 1.0);
    }

    #[test]
    fn zero_payload_packets_are_ignored() {
        let mut d = BulkDetector::new();
        d.on_packet(0, 0, BULK_BOUND, CLUMP_TIMEOUT_US, 0);
        assert_eq!(d.count, 0);
        assert_eq!(d.packet_count, 0);
    }

    #[test]
    fn gap_beyond_clump_timeout_restarts_tentative_bulk() {
        let mut d = BulkDetector::new();
        d.on_packet(0, 1000, BULK_BOUND, CLUMP_TIMEOUT_US, 0);
        d.on_packet(2_000_000, 1000, BULK_BOUND, CLUMP_TIMEOUT_US, 0);
        // second packet restarted the tentative bulk; only 1 packet in it.
        assert_eq!(d.count, 0);
    }

    #[test]
    fn extends_confirmed_bulk_past_bound() {
        let mut d = BulkDetector::new();
        for i in 0..6u64 {
            d.on_packet(i * 10_000, 1000, BULK_BOUND, CLUMP_TIMEOUT_US, 0);
        }
        assert_eq!(d.count, 1);
        assert_eq!(d.packet_count, 6);
        assert_eq!(d.size, 6000);
    }
}
