//! Record routing.
//!
//! Every read unit (a record, or a record and its mate) goes through four
//! stages in input order:
//!
//! 1. **Extract**: read the barcode attribute, preferring the primary record
//!    over the mate, and cut it to the table's barcode length.
//! 2. **Classify**: run the [`MatchingEngine`](crate::matching::MatchingEngine).
//! 3. **Rewrite**: append `.<barcode>` (or `.undetermined`) to the read name and
//!    read group of both records.
//! 4. **Dispatch**: write both records to one stream. Controls go to the
//!    control stream, vendor failures to the filtered stream of their barcode,
//!    everything else to the passed stream of their barcode.
//!
//! Classification may run on a worker pool; metrics, rewriting and dispatch
//! always run on the calling thread.

pub mod record;
pub mod router;
pub mod sink;

pub use record::{AlignmentRecord, ReadUnit};
pub use router::{ObservedBarcode, ReadUnits, RecordRouter, RoutingError, RoutingSummary};
pub use sink::{RecordSink, SinkSet};
