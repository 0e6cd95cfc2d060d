//! Error taxonomy (§7). Propagating failures use `Error`; non-propagating
//! events (malformed packets, table overflow) are tracked as counters in
//! `pipeline::Counters` instead, per the spec's "count, don't fail" policy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("capture error: {0}")]
    Capture(String),

    #[error("sink write failed: {0}")]
    Sink(#[from] std::io::Error),

    #[error("sink write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
