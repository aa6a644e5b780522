//! Builder for fluent stream configuration

use rstream_core::{require_non_blank, PayloadSerializer, StandardStreamEngine, StreamError, StreamResult};
use rstream_storage::MemoryStreamEngine;
use std::sync::Arc;
use std::time::Duration;

use super::{Stream, StreamConfig};
use crate::locator::{HashPartitionedResolver, ResourceLocatorResolver};

// ============================================================================
// Stream Builder Pattern
// ============================================================================

/// Builder for [`Stream`]
///
/// Defaults: in-memory engine, one locator named after the stream, JSON
/// payloads, 5 s mutex timeout, no claim lease.
///
/// ```
/// use rstream_engine::Stream;
/// use std::time::Duration;
///
/// let stream = Stream::builder("orders")
///     .partitions(4)
///     .message_pack()
///     .claim_lease(Duration::from_secs(60))
///     .build()
///     .unwrap();
/// assert_eq!(stream.locators().len(), 4);
/// ```
pub struct StreamBuilder {
    name: String,
    engine: Option<Arc<dyn StandardStreamEngine>>,
    resolver: Option<Arc<dyn ResourceLocatorResolver>>,
    partitions: u32,
    serializer: PayloadSerializer,
    mutex_timeout: Duration,
    claim_lease: Option<Duration>,
}

impl StreamBuilder {
    /// Create new builder with defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            engine: None,
            resolver: None,
            partitions: 1,
            serializer: PayloadSerializer::json(),
            mutex_timeout: Duration::from_millis(5000),
            claim_lease: None,
        }
    }

    /// Apply every setting of a config file
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the config does not validate.
    pub fn from_config(mut self, config: &StreamConfig) -> StreamResult<Self> {
        config.validate()?;
        self.name = config.name.clone();
        self.partitions = config.partitions;
        self.serializer = config.payload_serializer()?;
        self.mutex_timeout = config.mutex_timeout();
        self.claim_lease = config.claim_lease();
        Ok(self)
    }

    /// Backing engine; an in-memory engine is created otherwise
    pub fn engine(mut self, engine: Arc<dyn StandardStreamEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Explicit locator resolver; overrides `partitions`
    pub fn resolver(mut self, resolver: Arc<dyn ResourceLocatorResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Hash-partition records across `n` locators
    pub fn partitions(mut self, n: u32) -> Self {
        self.partitions = n;
        self
    }

    /// Write payloads as JSON text
    pub fn json(mut self) -> Self {
        self.serializer = PayloadSerializer::json();
        self
    }

    /// Write payloads as MessagePack bytes
    pub fn message_pack(mut self) -> Self {
        self.serializer = PayloadSerializer::message_pack();
        self
    }

    /// Mutex acquisition timeout
    pub fn mutex_timeout(mut self, timeout: Duration) -> Self {
        self.mutex_timeout = timeout;
        self
    }

    /// Treat `Running` claims older than `lease` as abandoned
    pub fn claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = Some(lease);
        self
    }

    /// Build the stream
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank name, zero partitions or a
    /// zero lease.
    pub fn build(self) -> StreamResult<Stream> {
        require_non_blank(&self.name, "stream name")?;
        if self.claim_lease == Some(Duration::ZERO) {
            return Err(StreamError::invalid_argument("claim lease must be positive"));
        }
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HashPartitionedResolver::for_stream(&self.name, self.partitions)?),
        };
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(MemoryStreamEngine::new()));
        Ok(Stream {
            name: self.name,
            engine,
            resolver,
            serializer: self.serializer,
            mutex_timeout: self.mutex_timeout,
            claim_lease: self.claim_lease,
        })
    }
}
