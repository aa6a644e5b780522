//! Record filter and records-to-filter criteria

use serde::{Deserialize, Serialize};

use crate::error::StreamResult;
use crate::identity::{StringSerializedIdentifier, TypeRepresentation};
use crate::strategy::{RecordsToFilterSelectionStrategy, TagMatchStrategy, VersionMatchStrategy};
use crate::tags::{validate_tags, Tag};

/// Query predicate over records
///
/// Within one axis the candidate must match at least one listed value;
/// across axes every non-empty axis must match. An empty axis imposes no
/// constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    internal_record_ids: Vec<u64>,
    ids: Vec<StringSerializedIdentifier>,
    id_types: Vec<TypeRepresentation>,
    object_types: Vec<TypeRepresentation>,
    version_match_strategy: VersionMatchStrategy,
    tags: Vec<Tag>,
    tag_match_strategy: TagMatchStrategy,
}

impl RecordFilter {
    /// A filter that matches every record
    pub fn all() -> Self {
        Self::default()
    }

    /// Start building a filter
    pub fn builder() -> RecordFilterBuilder {
        RecordFilterBuilder::default()
    }

    /// Filter on a single business id
    pub fn by_id(id: StringSerializedIdentifier) -> Self {
        Self {
            ids: vec![id],
            ..Self::default()
        }
    }

    /// Internal record id constraint
    pub fn internal_record_ids(&self) -> &[u64] {
        &self.internal_record_ids
    }

    /// Business id constraint
    pub fn ids(&self) -> &[StringSerializedIdentifier] {
        &self.ids
    }

    /// Identifier type constraint
    pub fn id_types(&self) -> &[TypeRepresentation] {
        &self.id_types
    }

    /// Object type constraint
    pub fn object_types(&self) -> &[TypeRepresentation] {
        &self.object_types
    }

    /// Version-match strategy for ids and types
    pub fn version_match_strategy(&self) -> VersionMatchStrategy {
        self.version_match_strategy
    }

    /// Tag constraint
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Tag-match strategy
    pub fn tag_match_strategy(&self) -> TagMatchStrategy {
        self.tag_match_strategy
    }

    /// Whether no axis is constrained
    pub fn is_unconstrained(&self) -> bool {
        self.internal_record_ids.is_empty()
            && self.ids.is_empty()
            && self.id_types.is_empty()
            && self.object_types.is_empty()
            && self.tags.is_empty()
    }

    /// Re-check strategies and tags
    ///
    /// Filters that arrive through deserialization bypass the builder, so
    /// every boundary calls this before touching an engine.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` strategies or bad tags.
    pub fn validate(&self) -> StreamResult<()> {
        self.version_match_strategy.validate()?;
        self.tag_match_strategy.validate()?;
        validate_tags(&self.tags)
    }
}

/// Builder for [`RecordFilter`]
#[derive(Debug, Clone, Default)]
pub struct RecordFilterBuilder {
    filter: RecordFilter,
}

impl RecordFilterBuilder {
    /// Constrain internal record ids
    pub fn internal_record_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.filter.internal_record_ids = ids.into_iter().collect();
        self
    }

    /// Constrain business ids
    pub fn ids(mut self, ids: impl IntoIterator<Item = StringSerializedIdentifier>) -> Self {
        self.filter.ids = ids.into_iter().collect();
        self
    }

    /// Constrain identifier types
    pub fn id_types(mut self, types: impl IntoIterator<Item = TypeRepresentation>) -> Self {
        self.filter.id_types = types.into_iter().collect();
        self
    }

    /// Constrain object types
    pub fn object_types(mut self, types: impl IntoIterator<Item = TypeRepresentation>) -> Self {
        self.filter.object_types = types.into_iter().collect();
        self
    }

    /// Version-match strategy
    pub fn version_match_strategy(mut self, strategy: VersionMatchStrategy) -> Self {
        self.filter.version_match_strategy = strategy;
        self
    }

    /// Constrain tags
    pub fn tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
        self.filter.tags = tags.into_iter().collect();
        self
    }

    /// Tag-match strategy
    pub fn tag_match_strategy(mut self, strategy: TagMatchStrategy) -> Self {
        self.filter.tag_match_strategy = strategy;
        self
    }

    /// Finish and validate
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` strategies or bad tags.
    pub fn build(self) -> StreamResult<RecordFilter> {
        self.filter.validate()?;
        Ok(self.filter)
    }
}

/// Which candidates are fed into a [`RecordFilter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordsToFilterCriteria {
    /// Pre-selection applied before filtering
    pub selection: RecordsToFilterSelectionStrategy,
    /// How object types are compared for `LatestByIdAndObjectType`
    pub version_match_strategy: VersionMatchStrategy,
}

impl RecordsToFilterCriteria {
    /// Pre-select with the given strategy
    pub fn new(
        selection: RecordsToFilterSelectionStrategy,
        version_match_strategy: VersionMatchStrategy,
    ) -> Self {
        Self {
            selection,
            version_match_strategy,
        }
    }

    /// Reject sentinel values
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` strategies.
    pub fn validate(&self) -> StreamResult<()> {
        self.selection.validate()?;
        self.version_match_strategy.validate()?;
        Ok(())
    }
}
