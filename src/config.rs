//! Tunable thresholds, loaded from an optional TOML file and overridable by
//! CLI flags (§10.3). Every field has a default so a missing config file is
//! not an error, following `secuaas-NetSentinel`'s `Config::from_file` shape.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::flow::Limits;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub flow_timeout_idle_s: f64,
    pub flow_timeout_active_s: f64,
    pub clump_timeout_s: f64,
    pub active_timeout_s: f64,
    pub bulk_bound: u32,
    pub max_flows: Option<usize>,
    pub expire_scan_interval_packets: u64,
    pub init_window_first_reverse_only: bool,
    pub tcp_termination_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            flow_timeout_idle_s: 120.0,
            flow_timeout_active_s: 120.0,
            clump_timeout_s: 1.0,
            active_timeout_s: 5.0,
            bulk_bound: 4,
            max_flows: None,
            expire_scan_interval_packets: 1000,
            init_window_first_reverse_only: false,
            tcp_termination_enabled: true,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file. Missing fields fall back to
    /// `Config::default()`'s values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("reading {:?}: {e}", path.as_ref())))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("parsing config: {e}")))
    }

    /// Rejects non-positive timeouts and a zero `bulk_bound`/`max_flows`
    /// (use `None`, not `0`, to mean "unlimited").
    pub fn validate(&self) -> Result<()> {
        if self.flow_timeout_idle_s <= 0.0 {
            return Err(Error::Config("flow_timeout_idle_s must be positive".into()));
        }
        if self.flow_timeout_active_s <= 0.0 {
            return Err(Error::Config("flow_timeout_active_s must be positive".into()));
        }
        if self.clump_timeout_s <= 0.0 {
            return Err(Error::Config("clump_timeout_s must be positive".into()));
        }
        if self.active_timeout_s <= 0.0 {
            return Err(Error::Config("active_timeout_s must be positive".into()));
        }
        if self.bulk_bound == 0 {
            return Err(Error::Config("bulk_bound must be nonzero".into()));
        }
        if self.max_flows == Some(0) {
            return Err(Error::Config("max_flows of 0 is not allowed; omit it for unlimited".into()));
        }
        if self.expire_scan_interval_packets == 0 {
            return Err(Error::Config("expire_scan_interval_packets must be nonzero".into()));
        }
        Ok(())
    }

    pub fn to_limits(&self) -> Limits {
        Limits {
            clump_timeout_us: (self.clump_timeout_s * 1_000_000.0) as u64,
            active_timeout_us: (self.active_timeout_s * 1_000_000.0) as u64,
            bulk_bound: self.bulk_bound,
            init_window_first_reverse_only: self.init_window_first_reverse_only,
            tcp_termination_enabled: self.tcp_termination_enabled,
            flow_timeout_idle_us: (self.flow_timeout_idle_s * 1_000_000.0) as u64,
            flow_timeout_active_us: (self.flow_timeout_active_s * 1_000_000.0) as u64,
            max_flows: self.max_flows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let toml_content = r#"
bulk_bound = 6
max_flows = 10000
"#;
        let cfg: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(cfg.bulk_bound, 6);
        assert_eq!(cfg.max_flows, Some(10000));
        assert_eq!(cfg.clump_timeout_s, 1.0, "unset fields keep their default");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_max_flows() {
        let mut cfg = Config::default();
        cfg.max_flows = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_nonpositive_timeout() {
        let mut cfg = Config::default();
        cfg.active_timeout_s = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn to_limits_converts_seconds_to_micros() {
        let cfg = Config::default();
        let limits = cfg.to_limits();
        assert_eq!(limits.clump_timeout_us, 1_000_000);
        assert_eq!(limits.active_timeout_us, 5_000_000);
        assert_eq!(limits.flow_timeout_idle_us, 120_000_000);
    }
}
