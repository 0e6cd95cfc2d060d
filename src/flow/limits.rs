//! Thresholds the flow state machine and table are parameterised by (§6).
//! Produced from `Config` (seconds, human units) once at startup.

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub clump_timeout_us: u64,
    pub active_timeout_us: u64,
    pub bulk_bound: u32,
    pub init_window_first_reverse_only: bool,
    pub tcp_termination_enabled: bool,
    pub flow_timeout_idle_us: u64,
    pub flow_timeout_active_us: u64,
    pub max_flows: Option<usize>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            clump_timeout_us: 1_000_000,
            active_timeout_us: 5_000_000,
            bulk_bound: 4,
            init_window_first_reverse_only: false,
            tcp_termination_enabled: true,
            flow_timeout_idle_us: 120_000_000,
            flow_timeout_active_us: 120_000_000,
            max_flows: None,
        }
    }
}
