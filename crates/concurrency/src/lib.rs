//! Concurrency primitives for rstream
//!
//! This crate provides the process-local [`LocalMutex`] used to serialize
//! handling claims per `(stream, concern)` scope.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mutex;

pub use mutex::{LocalMutex, MutexStats};
