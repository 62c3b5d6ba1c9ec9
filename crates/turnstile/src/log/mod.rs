//! The ordered access-log pipeline.
//!
//! This module is the correctness core of the crate. It guarantees that the
//! value returned to a worker as "previous request count" is exactly the
//! counter's pre-increment value, and that the resulting access-log entry
//! reaches the log file in sequence-number order, no matter how many workers
//! record concurrently.
//!
//! ## Structure
//!
//! - [`entry`] - the immutable access-log record and its rendering.
//! - [`pipeline`] - [`AccessLogPipeline`], the producer side: the coupled
//!   "increment counter + enqueue entry" critical section.
//! - [`writer`] - the single consumer task that owns the log file handle.

mod entry;
mod pipeline;
mod writer;

pub use entry::{AccessLogEntry, ConnectionInfo};
pub use pipeline::AccessLogPipeline;
