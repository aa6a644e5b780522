//! Resource locator resolution
//!
//! A stream's records may be spread across several resource locators. The
//! resolver decides which locator holds a business id; reads that are not
//! keyed by id fan out to every locator and the record store aggregates.

use rstream_core::{ResourceLocator, StreamError, StreamResult, StringSerializedIdentifier};
use std::collections::HashSet;
use xxhash_rust::xxh3::xxh3_64;

/// Maps a stream's records to resource locators
pub trait ResourceLocatorResolver: Send + Sync {
    /// Locator that holds records with this business id
    ///
    /// Records without an id go to the primary locator.
    fn locator_for_id(&self, id: Option<&StringSerializedIdentifier>) -> &ResourceLocator;

    /// Every locator of the stream, primary first
    fn all_locators(&self) -> &[ResourceLocator];

    /// Locator holding stream-wide state such as blocking entries
    fn primary_locator(&self) -> &ResourceLocator;
}

/// Every record on one locator
#[derive(Debug, Clone)]
pub struct SingleLocatorResolver {
    locators: [ResourceLocator; 1],
}

impl SingleLocatorResolver {
    /// Resolve everything to `locator`
    pub fn new(locator: ResourceLocator) -> Self {
        Self { locators: [locator] }
    }
}

impl ResourceLocatorResolver for SingleLocatorResolver {
    fn locator_for_id(&self, _id: Option<&StringSerializedIdentifier>) -> &ResourceLocator {
        &self.locators[0]
    }

    fn all_locators(&self) -> &[ResourceLocator] {
        &self.locators
    }

    fn primary_locator(&self) -> &ResourceLocator {
        &self.locators[0]
    }
}

/// Spreads business ids across locators by hash
///
/// The partition is `xxh3(serialized id) % n`, so the same id always lands
/// on the same locator regardless of identifier type version.
#[derive(Debug, Clone)]
pub struct HashPartitionedResolver {
    primary: ResourceLocator,
    rest: Vec<ResourceLocator>,
    all: Vec<ResourceLocator>,
}

impl HashPartitionedResolver {
    /// Partition across explicit locators; the first is primary
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty or duplicated list.
    pub fn new(locators: Vec<ResourceLocator>) -> StreamResult<Self> {
        let mut seen = HashSet::new();
        for locator in &locators {
            if !seen.insert(locator) {
                return Err(StreamError::invalid_argument(format!(
                    "duplicate resource locator '{}'",
                    locator
                )));
            }
        }
        let mut iter = locators.clone().into_iter();
        let primary = iter
            .next()
            .ok_or_else(|| StreamError::invalid_argument("at least one resource locator is required"))?;
        Ok(Self {
            primary,
            rest: iter.collect(),
            all: locators,
        })
    }

    /// `partitions` locators named after the stream
    ///
    /// A single partition uses the bare stream name; more are suffixed
    /// `-p0`, `-p1`, ...
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank name or zero partitions.
    pub fn for_stream(name: &str, partitions: u32) -> StreamResult<Self> {
        let locators = match partitions {
            0 => return Err(StreamError::invalid_argument("partitions must be at least 1")),
            1 => vec![ResourceLocator::new(name)?],
            n => (0..n)
                .map(|i| ResourceLocator::new(format!("{}-p{}", name, i)))
                .collect::<StreamResult<Vec<_>>>()?,
        };
        Self::new(locators)
    }

    /// Number of partitions
    pub fn partition_count(&self) -> usize {
        self.all.len()
    }
}

impl ResourceLocatorResolver for HashPartitionedResolver {
    fn locator_for_id(&self, id: Option<&StringSerializedIdentifier>) -> &ResourceLocator {
        let Some(id) = id else {
            return &self.primary;
        };
        let index = (xxh3_64(id.id.as_bytes()) % self.all.len() as u64) as usize;
        match index {
            0 => &self.primary,
            i => &self.rest[i - 1],
        }
    }

    fn all_locators(&self) -> &[ResourceLocator] {
        &self.all
    }

    fn primary_locator(&self) -> &ResourceLocator {
        &self.primary
    }
}
