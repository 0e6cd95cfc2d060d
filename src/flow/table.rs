//! Flow table (§4.4): owns the live set of in-progress flows, keyed by the
//! symmetric 5-tuple, and handles the three ways a flow leaves the table —
//! TCP termination, timeout, and the optional LRU overflow eviction.

use std::collections::HashMap;

use tracing::debug;

use crate::packet::Packet;

use super::key::{Endpoint, FlowKey};
use super::limits::Limits;
use super::record::FlowRecord;
use super::state::FlowState;

#[derive(Debug, Default)]
pub struct TableStats {
    pub flows_emitted: u64,
    pub overflow_evictions: u64,
}

pub struct FlowTable {
    flows: HashMap<FlowKey, FlowState>,
    limits: Limits,
    stats: TableStats,
}

impl FlowTable {
    pub fn new(limits: Limits) -> Self {
        Self { flows: HashMap::new(), limits, stats: TableStats::default() }
    }

    pub fn stats(&self) -> &TableStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Folds one packet into its flow, creating the flow if needed. Returns
    /// the finished record if this packet caused the flow to terminate
    /// (TCP RST/FIN-ACK close, or the flow crossing its active-duration
    /// timeout on this packet).
    pub fn ingest(&mut self, pkt: &Packet) -> Option<FlowRecord> {
        let key = FlowKey::new(
            Endpoint::new(pkt.src_addr, pkt.src_port),
            Endpoint::new(pkt.dst_addr, pkt.dst_port),
            pkt.l4_proto,
        );

        if !self.flows.contains_key(&key) {
            self.maybe_evict_for_new_flow();
            self.flows.insert(key.clone(), FlowState::new(pkt));
        }

        let state = self.flows.get_mut(&key).expect("just inserted or already present");
        let direction = state.direction_of(pkt);
        state.add_packet(pkt, direction, &self.limits);

        if state.should_terminate(&self.limits) || state.is_active_expired(&self.limits) {
            let state = self.flows.remove(&key).expect("key known to be present");
            self.stats.flows_emitted += 1;
            return Some(FlowRecord::from(&state));
        }

        None
    }

    /// Scans for flows past their idle or active timeout and removes them.
    /// Called periodically by the pipeline driver (§10.4), not per packet.
    pub fn expire_scan(&mut self, now: u64) -> Vec<FlowRecord> {
        let expired: Vec<FlowKey> = self
            .flows
            .iter()
            .filter(|(_, s)| s.is_idle_expired(now, &self.limits) || s.is_active_expired(&self.limits))
            .map(|(k, _)| k.clone())
            .collect();

        let mut records = Vec::with_capacity(expired.len());
        for key in expired {
            if let Some(state) = self.flows.remove(&key) {
                self.stats.flows_emitted += 1;
                records.push(FlowRecord::from(&state));
            }
        }
        records
    }

    /// Flushes every remaining flow, regardless of timeout. Called once at
    /// shutdown (EOF on an offline capture, or Ctrl-C on a live one).
    pub fn drain(&mut self) -> Vec<FlowRecord> {
        let records = self.flows.values().map(FlowRecord::from).collect();
        self.flows.clear();
        records
    }

    /// §10.8: when `max_flows` is set and already at capacity, evicts the
    /// coldest flow (oldest `latest_timestamp`) by a linear scan before
    /// admitting a new one. O(n) per eviction; acceptable at the table sizes
    /// this tool targets, and documented as a tradeoff rather than hidden
    /// behind a more complex structure.
    fn maybe_evict_for_new_flow(&mut self) {
        let Some(max_flows) = self.limits.max_flows else { return };
        if self.flows.len() < max_flows {
            return;
        }

        if let Some(coldest) = self.flows.iter().min_by_key(|(_, s)| s.latest_timestamp).map(|(k, _)| k.clone()) {
            self.flows.remove(&coldest);
            self.stats.overflow_evictions += 1;
            debug!(max_flows, "evicted coldest flow to admit a new one");
        }
    }
}
