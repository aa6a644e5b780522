//! Record Filter Engine
//!
//! Pure matching logic: given candidate records (or handling entries) and a
//! filter, produce the matching subset deterministically. No engine access
//! happens here; every backing engine and the coordinator reuse these
//! functions so that matching semantics are identical everywhere.

mod engine;
mod record_filter;

pub use engine::{
    filter_records, handling_matches, order_records, record_matches, select_records_to_filter,
    FilterCandidate,
};
pub use record_filter::{RecordFilter, RecordFilterBuilder, RecordsToFilterCriteria};
