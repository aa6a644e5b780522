//! The stream: one logical append-only record stream
//!
//! A `Stream` owns no data. It holds a backing engine, a resolver mapping
//! records to resource locators, and the settings every operation needs.
//! Record store, handling and lifecycle operations are implemented on it in
//! sibling modules.
//!
//! # Three Ways to Get a Stream
//!
//! ```
//! use rstream_engine::{Stream, StreamConfig};
//!
//! // 1. In-memory, single locator
//! let stream = Stream::in_memory("orders").unwrap();
//!
//! // 2. From configuration
//! let stream = Stream::builder("orders").from_config(&StreamConfig::named("orders")).unwrap().build().unwrap();
//!
//! // 3. Null engine, for exercising callers without storage
//! let stream = Stream::null("orders").unwrap();
//! ```

mod builder;
pub mod config;

pub use builder::StreamBuilder;
pub use config::{StreamConfig, CONFIG_FILE_NAME};

use rstream_core::{
    MutexGuard, MutexScope, PayloadSerializer, ResourceLocator, StandardOp, StandardOutput,
    StandardStreamEngine, StreamResult,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::locator::ResourceLocatorResolver;

/// A record stream over a backing engine
#[derive(Clone)]
pub struct Stream {
    name: String,
    engine: Arc<dyn StandardStreamEngine>,
    resolver: Arc<dyn ResourceLocatorResolver>,
    serializer: PayloadSerializer,
    mutex_timeout: Duration,
    claim_lease: Option<Duration>,
}

impl Stream {
    /// Start configuring a stream
    pub fn builder(name: impl Into<String>) -> StreamBuilder {
        StreamBuilder::new(name)
    }

    /// Single-locator stream over a fresh in-memory engine
    ///
    /// The stream's storage is not created; call `create_stream` first.
    pub fn in_memory(name: impl Into<String>) -> StreamResult<Self> {
        StreamBuilder::new(name).build()
    }

    /// Stream over the null engine
    pub fn null(name: impl Into<String>) -> StreamResult<Self> {
        StreamBuilder::new(name)
            .engine(Arc::new(rstream_storage::NullStreamEngine::new()))
            .build()
    }

    /// Stream described by a config, over the given engine
    pub fn open(config: &StreamConfig, engine: Arc<dyn StandardStreamEngine>) -> StreamResult<Self> {
        StreamBuilder::new(config.name.clone())
            .from_config(config)?
            .engine(engine)
            .build()
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing engine
    pub fn engine(&self) -> &Arc<dyn StandardStreamEngine> {
        &self.engine
    }

    /// Locator resolver
    pub fn resolver(&self) -> &dyn ResourceLocatorResolver {
        self.resolver.as_ref()
    }

    /// Every locator of the stream, primary first
    pub fn locators(&self) -> &[ResourceLocator] {
        self.resolver.all_locators()
    }

    /// Payload serializer for writes
    pub fn serializer(&self) -> PayloadSerializer {
        self.serializer
    }

    /// Mutex acquisition timeout
    pub fn mutex_timeout(&self) -> Duration {
        self.mutex_timeout
    }

    /// Claim lease, if enabled
    pub fn claim_lease(&self) -> Option<Duration> {
        self.claim_lease
    }

    pub(crate) fn execute(&self, op: StandardOp) -> StreamResult<StandardOutput> {
        self.engine.execute(op)
    }

    /// Hold the claim mutex for `concern`
    ///
    /// Keyed on the primary locator rather than the stream name, so handles
    /// sharing storage under different names still exclude each other.
    pub(crate) fn lock_concern(&self, concern: &str) -> StreamResult<MutexGuard<'_>> {
        rstream_core::lock(
            self.engine.mutex(),
            &MutexScope::for_locator(self.resolver.primary_locator(), concern),
            self.mutex_timeout,
        )
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("name", &self.name)
            .field("backend", &self.engine.backend_name())
            .field("locators", &self.resolver.all_locators())
            .field("serializer", &self.serializer.representation())
            .field("mutex_timeout", &self.mutex_timeout)
            .field("claim_lease", &self.claim_lease)
            .finish()
    }
}
