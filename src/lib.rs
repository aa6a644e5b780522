//! rstream - Append-only record streams with coordinated work handling
//!
//! A stream stores immutable, typed records on one or more resource
//! locators and keeps a per-record handling ledger so that independent
//! workers can claim records for a concern, report outcomes, and retry.
//!
//! # Quick Start
//!
//! ```
//! use rstream::{ClaimRequest, ExistingStreamEncounteredStrategy, RecordLocation, Stream};
//!
//! let stream = Stream::in_memory("orders")?;
//! stream.create_stream(ExistingStreamEncounteredStrategy::Throw)?;
//!
//! // Append a record under a business id
//! stream.put_with_id(&"order-1".to_string(), &42u64, &Default::default())?;
//!
//! // Claim it for a unit of work, then report the outcome
//! let claim = stream.try_handle("export", &ClaimRequest::new())?;
//! if let Some(record) = claim.record() {
//!     stream.complete(&RecordLocation::from(record), "export", None)?;
//! }
//! # Ok::<(), rstream::StreamError>(())
//! ```
//!
//! # Architecture
//!
//! Every operation reduces to a [`StandardOp`] executed by a
//! [`StandardStreamEngine`]. The [`Stream`] adds locator fan-out, typed
//! serialization and the claim protocol on top; the engine stays the only
//! source of truth.

pub use rstream_core::*;
pub use rstream_engine::{
    ClaimRequest, HashPartitionedResolver, PutOptions, PutReport, RecordLocation, ResourceLocatorResolver,
    SingleLocatorResolver, Stream, StreamBuilder, StreamConfig, CONFIG_FILE_NAME,
};
