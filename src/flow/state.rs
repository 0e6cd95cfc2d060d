//! Per-flow accumulator state (§4.2).

use std::net::IpAddr;

use crate::packet::Packet;

use super::active_idle::ActiveIdleDetector;
use super::bulk::BulkDetector;
use super::key::{Direction, Endpoint};
use super::limits::Limits;
use super::stats::StatAccumulator;

#[derive(Debug, Clone)]
pub struct FlowState {
    pub forward_endpoint: Endpoint,

    pub src_ip: IpAddr,
    pub dst_ip: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,

    pub start_timestamp: u64,
    pub latest_timestamp: u64,

    fwd_packets_count: u64,
    bwd_packets_count: u64,

    pkt_len: StatAccumulator,
    fwd_pkt_len: StatAccumulator,
    bwd_pkt_len: StatAccumulator,

    flow_iat: StatAccumulator,
    fwd_iat: StatAccumulator,
    bwd_iat: StatAccumulator,
    last_fwd_ts: Option<u64>,
    last_bwd_ts: Option<u64>,

    fwd_header_bytes: u64,
    bwd_header_bytes: u64,
    fwd_seg_size_min: f64,
    fwd_act_data_pkts: u64,

    fin_count: u32,
    syn_count: u32,
    rst_count: u32,
    psh_count: u32,
    ack_count: u32,
    urg_count: u32,
    ece_count: u32,
    cwr_count: u32,
    fwd_psh: u32,
    bwd_psh: u32,
    fwd_urg: u32,
    bwd_urg: u32,

    pub fwd_bulk: BulkDetector,
    pub bwd_bulk: BulkDetector,

    active_idle: ActiveIdleDetector,

    init_fwd_window: u16,
    init_bwd_window: u16,
    seen_reverse_tcp: bool,

    fin_fwd: bool,
    fin_bwd: bool,
    later_fin_ts: Option<u64>,
    fin_ack_seen: bool,
    rst_seen: bool,
}

impl FlowState {
    /// Creates a new flow from its first packet. The sender of this packet
    /// is frozen as the FORWARD endpoint for the lifetime of the flow.
    pub fn new(first: &Packet) -> Self {
        let ts = first.timestamp_micros();
        Self {
            forward_endpoint: Endpoint::new(first.src_addr, first.src_port),
            src_ip: first.src_addr,
            dst_ip: first.dst_addr,
            src_port: first.src_port,
            dst_port: first.dst_port,
            protocol: first.l4_proto,
            start_timestamp: ts,
            latest_timestamp: ts,
            fwd_packets_count: 0,
            bwd_packets_count: 0,
            pkt_len: StatAccumulator::new(),
            fwd_pkt_len: StatAccumulator::new(),
            bwd_pkt_len: StatAccumulator::new(),
            flow_iat: StatAccumulator::new(),
            fwd_iat: StatAccumulator::new(),
            bwd_iat: StatAccumulator::new(),
            last_fwd_ts: None,
            last_bwd_ts: None,
            fwd_header_bytes: 0,
            bwd_header_bytes: 0,
            fwd_seg_size_min: f64::INFINITY,
            fwd_act_data_pkts: 0,
            fin_count: 0,
            syn_count: 0,
            rst_count: 0,
            psh_count: 0,
            ack_count: 0,
            urg_count: 0,
            ece_count: 0,
            cwr_count: 0,
            fwd_psh: 0,
            bwd_psh: 0,
            fwd_urg: 0,
            bwd_urg: 0,
            fwd_bulk: BulkDetector::new(),
            bwd_bulk: BulkDetector::new(),
            active_idle: ActiveIdleDetector::new(),
            init_fwd_window: 0,
            init_bwd_window: 0,
            seen_reverse_tcp: false,
            fin_fwd: false,
            fin_bwd: false,
            later_fin_ts: None,
            fin_ack_seen: false,
            rst_seen: false,
        }
    }

    /// Direction of `pkt` relative to this flow's recorded first sender.
    pub fn direction_of(&self, pkt: &Packet) -> Direction {
        let sender = Endpoint::new(pkt.src_addr, pkt.src_port);
        if sender == self.forward_endpoint {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    pub fn packets_count(&self) -> u64 {
        self.fwd_packets_count + self.bwd_packets_count
    }

    pub fn add_packet(&mut self, pkt: &Packet, direction: Direction, limits: &Limits) {
        let ts = pkt.timestamp_micros();
        let is_first = self.packets_count() == 0;

        self.pkt_len.push(pkt.total_len as f64);

        match direction {
            Direction::Forward => {
                self.fwd_packets_count += 1;
                self.fwd_pkt_len.push(pkt.total_len as f64);
                self.fwd_header_bytes += pkt.header_len() as u64;
                if pkt.payload_len > 0 {
                    self.fwd_act_data_pkts += 1;
                    let hdr = pkt.l4_header_len as f64;
                    if hdr < self.fwd_seg_size_min {
                        self.fwd_seg_size_min = hdr;
                    }
                }
            }
            Direction::Reverse => {
                self.bwd_packets_count += 1;
                self.bwd_pkt_len.push(pkt.total_len as f64);
                self.bwd_header_bytes += pkt.header_len() as u64;
            }
        }

        self.fwd_bulk.on_packet(
            ts,
            if direction == Direction::Forward { pkt.payload_len } else { 0 },
            limits.bulk_bound,
            limits.clump_timeout_us,
            self.bwd_bulk.last_tmp(),
        );
        self.bwd_bulk.on_packet(
            ts,
            if direction == Direction::Reverse { pkt.payload_len } else { 0 },
            limits.bulk_bound,
            limits.clump_timeout_us,
            self.fwd_bulk.last_tmp(),
        );

        self.active_idle.on_packet(ts, self.latest_timestamp, limits.clump_timeout_us, limits.active_timeout_us);

        if !is_first {
            let flow_iat = ts as f64 - self.latest_timestamp as f64;
            self.flow_iat.push(flow_iat);

            match direction {
                Direction::Forward => {
                    if let Some(prev) = self.last_fwd_ts {
                        self.fwd_iat.push(ts as f64 - prev as f64);
                    }
                }
                Direction::Reverse => {
                    if let Some(prev) = self.last_bwd_ts {
                        self.bwd_iat.push(ts as f64 - prev as f64);
                    }
                }
            }
        }

        match direction {
            Direction::Forward => self.last_fwd_ts = Some(ts),
            Direction::Reverse => self.last_bwd_ts = Some(ts),
        }

        self.latest_timestamp = self.latest_timestamp.max(ts);

        if let Some(tcp) = pkt.tcp {
            match direction {
                Direction::Forward => {
                    if self.fwd_packets_count == 1 {
                        self.init_fwd_window = tcp.window;
                    }
                }
                Direction::Reverse => {
                    if limits.init_window_first_reverse_only {
                        if !self.seen_reverse_tcp {
                            self.init_bwd_window = tcp.window;
                        }
                    } else {
                        self.init_bwd_window = tcp.window;
                    }
                    self.seen_reverse_tcp = true;
                }
            }

            self.update_tcp_flags(tcp.flags, direction);
            self.update_close_state(tcp.flags, direction, ts);
        }
    }

    fn update_tcp_flags(&mut self, flags: crate::packet::TcpFlags, direction: Direction) {
        if flags.fin {
            self.fin_count += 1;
        }
        if flags.syn {
            self.syn_count += 1;
        }
        if flags.rst {
            self.rst_count += 1;
        }
        if flags.psh {
            self.psh_count += 1;
            match direction {
                Direction::Forward => self.fwd_psh += 1,
                Direction::Reverse => self.bwd_psh += 1,
            }
        }
        if flags.ack {
            self.ack_count += 1;
        }
        if flags.urg {
            self.urg_count += 1;
            match direction {
                Direction::Forward => self.fwd_urg += 1,
                Direction::Reverse => self.bwd_urg += 1,
            }
        }
        if flags.ece {
            self.ece_count += 1;
        }
        if flags.cwr {
            self.cwr_count += 1;
        }
    }

    fn update_close_state(&mut self, flags: crate::packet::TcpFlags, direction: Direction, ts: u64) {
        if flags.rst {
            self.rst_seen = true;
        }
        if flags.fin {
            match direction {
                Direction::Forward => self.fin_fwd = true,
                Direction::Reverse => self.fin_bwd = true,
            }
            if self.fin_fwd && self.fin_bwd {
                self.later_fin_ts = Some(self.later_fin_ts.map_or(ts, |t| t.max(ts)));
            }
        }
        if flags.ack {
            if let Some(later_fin) = self.later_fin_ts {
                if ts >= later_fin {
                    self.fin_ack_seen = true;
                }
            }
        }
    }

    /// TCP termination rule (§4.4): RST observed, or both FINs observed and
    /// acknowledged.
    pub fn should_terminate(&self, limits: &Limits) -> bool {
        if !limits.tcp_termination_enabled {
            return false;
        }
        self.rst_seen || (self.fin_fwd && self.fin_bwd && self.fin_ack_seen)
    }

    pub fn is_idle_expired(&self, now: u64, limits: &Limits) -> bool {
        now.saturating_sub(self.latest_timestamp) > limits.flow_timeout_idle_us
    }

    pub fn is_active_expired(&self, limits: &Limits) -> bool {
        self.latest_timestamp.saturating_sub(self.start_timestamp) > limits.flow_timeout_active_us
    }

    // Accessors the feature extractor needs.
    pub fn fwd_packets(&self) -> u64 {
        self.fwd_packets_count
    }
    pub fn bwd_packets(&self) -> u64 {
        self.bwd_packets_count
    }
    pub fn pkt_len(&self) -> &StatAccumulator {
        &self.pkt_len
    }
    pub fn fwd_pkt_len(&self) -> &StatAccumulator {
        &self.fwd_pkt_len
    }
    pub fn bwd_pkt_len(&self) -> &StatAccumulator {
        &self.bwd_pkt_len
    }
    pub fn flow_iat(&self) -> &StatAccumulator {
        &self.flow_iat
    }
    pub fn fwd_iat(&self) -> &StatAccumulator {
        &self.fwd_iat
    }
    pub fn bwd_iat(&self) -> &StatAccumulator {
        &self.bwd_iat
    }
    pub fn fwd_header_bytes(&self) -> u64 {
        self.fwd_header_bytes
    }
    pub fn bwd_header_bytes(&self) -> u64 {
        self.bwd_header_bytes
    }
    pub fn fwd_seg_size_min(&self) -> f64 {
        if self.fwd_seg_size_min.is_finite() {
            self.fwd_seg_size_min
        } else {
            0.0
        }
    }
    pub fn fwd_act_data_pkts(&self) -> u64 {
        self.fwd_act_data_pkts
    }
    pub fn fin_count(&self) -> u32 {
        self.fin_count
    }
    pub fn syn_count(&self) -> u32 {
        self.syn_count
    }
    pub fn rst_count(&self) -> u32 {
        self.rst_count
    }
    pub fn psh_count(&self) -> u32 {
        self.psh_count
    }
    pub fn ack_count(&self) -> u32 {
        self.ack_count
    }
    pub fn urg_count(&self) -> u32 {
        self.urg_count
    }
    pub fn ece_count(&self) -> u32 {
        self.ece_count
    }
    pub fn cwr_count(&self) -> u32 {
        self.cwr_count
    }
    pub fn fwd_psh(&self) -> u32 {
        self.fwd_psh
    }
    pub fn bwd_psh(&self) -> u32 {
        self.bwd_psh
    }
    pub fn fwd_urg(&self) -> u32 {
        self.fwd_urg
    }
    pub fn bwd_urg(&self) -> u32 {
        self.bwd_urg
    }
    pub fn active(&self) -> &StatAccumulator {
        &self.active_idle.active
    }
    pub fn idle(&self) -> &StatAccumulator {
        &self.active_idle.idle
    }
    pub fn init_fwd_window(&self) -> u16 {
        self.init_fwd_window
    }
    pub fn init_bwd_window(&self) -> u16 {
        self.init_bwd_window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Packet, TcpFlags, TcpInfo, PROTO_TCP, PROTO_UDP};

    fn pkt(ts: f64, src: &str, sport: u16, dst: &str, dport: u16, proto: u8, payload: u32, total: u32, tcp: Option<TcpInfo>) -> Packet {
        Packet {
            timestamp: ts,
            src_addr: src.parse().unwrap(),
            dst_addr: dst.parse().unwrap(),
            l4_proto: proto,
            src_port: sport,
            dst_port: dport,
            ip_header_len: 20,
            l4_header_len: if proto == PROTO_TCP { 20 } else { 8 },
            payload_len: payload,
            total_len: total,
            tcp,
        }
    }

    /// S1 — UDP query/response.
    #[test]
    fn s1_udp_query_response() {
        let p1 = pkt(0.0, "10.0.0.1", 5000, "10.0.0.2", 53, PROTO_UDP, 60, 88, None);
        let p2 = pkt(0.05, "10.0.0.2", 53, "10.0.0.1", 5000, PROTO_UDP, 120, 148, None);

        let mut flow = FlowState::new(&p1);
        let limits = Limits::default();
        let d1 = flow.direction_of(&p1);
        flow.add_packet(&p1, d1, &limits);
        let d2 = flow.direction_of(&p2);
        flow.add_packet(&p2, d2, &limits);

        assert_eq!(flow.fwd_packets(), 1);
        assert_eq!(flow.bwd_packets(), 1);
        assert_eq!(flow.latest_timestamp - flow.start_timestamp, 50_000);
        assert!((flow.flow_iat().mean() - 50_000.0).abs() < 1.0);
        assert_eq!(flow.fin_count(), 0);
        assert_eq!(flow.fwd_bulk.count, 0);
        assert_eq!(flow.bwd_bulk.count, 0);
        assert_eq!(flow.active().count(), 0);
        assert_eq!(flow.idle().count(), 0);
    }

    /// S2 — TCP SYN-only.
    #[test]
    fn s2_tcp_syn_only() {
        let tcp = TcpInfo { flags: TcpFlags { syn: true, ..Default::default() }, window: 65535 };
        let p1 = pkt(0.0, "10.0.0.1", 5000, "10.0.0.2", 80, PROTO_TCP, 0, 60, Some(tcp));

        let mut flow = FlowState::new(&p1);
        let limits = Limits::default();
        let d1 = flow.direction_of(&p1);
        flow.add_packet(&p1, d1, &limits);

        assert_eq!(flow.syn_count(), 1);
        assert_eq!(flow.fwd_packets(), 1);
        assert_eq!(flow.latest_timestamp - flow.start_timestamp, 0);
        assert_eq!(flow.init_fwd_window(), 65535);
    }

    #[test]
    fn direction_resolves_against_true_first_sender_not_sort_order() {
        // client has the numerically larger address/port than the server;
        // a sort-order-based direction test would get this backwards.
        let p1 = pkt(0.0, "192.168.1.200", 55000, "10.0.0.1", 80, PROTO_TCP, 0, 60, None);
        let mut flow = FlowState::new(&p1);
        let limits = Limits::default();
        let d1 = flow.direction_of(&p1);
        assert_eq!(d1, Direction::Forward);
        flow.add_packet(&p1, d1, &limits);

        let reply = pkt(0.01, "10.0.0.1", 80, "192.168.1.200", 55000, PROTO_TCP, 0, 60, None);
        assert_eq!(flow.direction_of(&reply), Direction::Reverse);
    }

    #[test]
    fn reverse_init_window_overwrite_policy() {
        let tcp1 = TcpInfo { flags: TcpFlags::default(), window: 100 };
        let tcp2 = TcpInfo { flags: TcpFlags::default(), window: 200 };
        let p1 = pkt(0.0, "10.0.0.1", 5000, "10.0.0.2", 80, PROTO_TCP, 0, 60, Some(tcp1));
        let mut flow = FlowState::new(&p1);
        let limits = Limits::default();
        let d1 = flow.direction_of(&p1);
        flow.add_packet(&p1, d1, &limits);

        let r1 = pkt(0.01, "10.0.0.2", 80, "10.0.0.1", 5000, PROTO_TCP, 0, 60, Some(tcp1));
        let d = flow.direction_of(&r1);
        flow.add_packet(&r1, d, &limits);
        assert_eq!(flow.init_bwd_window(), 100);

        let r2 = pkt(0.02, "10.0.0.2", 80, "10.0.0.1", 5000, PROTO_TCP, 0, 60, Some(tcp2));
        let d = flow.direction_of(&r2);
        flow.add_packet(&r2, d, &limits);
        assert_eq!(flow.init_bwd_window(), 200, "default policy overwrites on every reverse packet");
    }

    #[test]
    fn reverse_init_window_first_packet_policy() {
        let mut limits = Limits::default();
        limits.init_window_first_reverse_only = true;
        let tcp1 = TcpInfo { flags: TcpFlags::default(), window: 100 };
        let tcp2 = TcpInfo { flags: TcpFlags::default(), window: 200 };
        let p1 = pkt(0.0, "10.0.0.1", 5000, "10.0.0.2", 80, PROTO_TCP, 0, 60, Some(tcp1));
        let mut flow = FlowState::new(&p1);
        let d1 = flow.direction_of(&p1);
        flow.add_packet(&p1, d1, &limits);

        let r1 = pkt(0.01, "10.0.0.2", 80, "10.0.0.1", 5000, PROTO_TCP, 0, 60, Some(tcp1));
        let d = flow.direction_of(&r1);
        flow.add_packet(&r1, d, &limits);
        let r2 = pkt(0.02, "10.0.0.2", 80, "10.0.0.1", 5000, PROTO_TCP, 0, 60, Some(tcp2));
        let d = flow.direction_of(&r2);
        flow.add_packet(&r2, d, &limits);
        assert_eq!(flow.init_bwd_window(), 100, "first-packet policy keeps the first value");
    }

    /// S6 — RST termination.
    #[test]
    fn s6_rst_terminates() {
        let limits = Limits::default();
        let mut flow = FlowState::new(&pkt(0.0, "10.0.0.1", 5000, "10.0.0.2", 80, PROTO_TCP, 0, 60, Some(TcpInfo { flags: TcpFlags { syn: true, ..Default::default() }, window: 0 })));
        let p0 = pkt(0.0, "10.0.0.1", 5000, "10.0.0.2", 80, PROTO_TCP, 0, 60, Some(TcpInfo { flags: TcpFlags { syn: true, ..Default::default() }, window: 0 }));
        let d = flow.direction_of(&p0);
        flow.add_packet(&p0, d, &limits);

        for i in 1..5u64 {
            let flags = if i == 4 { TcpFlags { rst: true, ..Default::default() } } else { TcpFlags { ack: true, ..Default::default() } };
            let p = pkt(i as f64 * 0.01, "10.0.0.1", 5000, "10.0.0.2", 80, PROTO_TCP, 10, 70, Some(TcpInfo { flags, window: 0 }));
            let d = flow.direction_of(&p);
            flow.add_packet(&p, d, &limits);
        }

        assert_eq!(flow.rst_count(), 1);
        assert!(flow.should_terminate(&limits));
    }
}
