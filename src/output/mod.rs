//! Output streams.
//!
//! - [`header`]: per-barcode read groups and the @PG record
//! - [`layout`]: file names for the single and split layouts
//! - [`writer`]: SAM/BAM writers implementing [`RecordSink`](crate::routing::RecordSink)

pub mod header;
pub mod layout;
pub mod writer;

pub use writer::{open_sinks, AlignmentWriter, OutputTarget};
