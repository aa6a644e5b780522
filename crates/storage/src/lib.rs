//! Backing engines for rstream
//!
//! This crate implements the standard stream protocol with:
//! - MemoryStreamEngine: DashMap of per-locator partitions, each behind an RwLock
//! - NullStreamEngine: stores nothing, answers every valid operation with an empty result
//!
//! Both validate operations the same way, so a caller that works against
//! the null engine sends only operations a real engine accepts.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod null;

pub use memory::{MemoryStreamEngine, Partition};
pub use null::NullStreamEngine;
