//! Output sinks for completed flow records (§10.2): CSV (CICFlowMeter's own
//! output shape) and newline-delimited JSON.

mod csv_sink;
mod json_sink;

pub use csv_sink::CsvSink;
pub use json_sink::JsonLinesSink;

use crate::error::Result;
use crate::flow::FlowRecord;

/// A destination for completed flow records. Implementations buffer
/// internally and must flush on `flush()` and on `Drop`, so records handed
/// to `push` are never lost to buffering even if the caller forgets to
/// flush explicitly.
pub trait Sink {
    fn push(&mut self, record: &FlowRecord) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}
