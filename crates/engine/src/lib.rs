//! Record stream engine
//!
//! This crate turns a backing engine into a usable stream:
//! - Stream: name, engine, locator resolver, serializer and claim settings
//! - Record store: typed puts with existing-record policies, reads by id,
//!   filter reads fanned out across locators, pruning
//! - Handling coordinator: mutex-guarded claims, outcome transitions,
//!   stream-wide blocking, status and history queries
//! - Lifecycle: create, delete and existence checks on every locator
//! - Configuration: `rstream.toml`
//!
//! The backing engine is the only source of truth. Nothing here caches
//! records or handling state between calls.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod handling;
pub mod locator;
mod management;
pub mod record_store;
pub mod stream;

pub use handling::ClaimRequest;
pub use locator::{HashPartitionedResolver, ResourceLocatorResolver, SingleLocatorResolver};
pub use record_store::{PutOptions, PutReport, RecordLocation};
pub use stream::{Stream, StreamBuilder, StreamConfig, CONFIG_FILE_NAME};
