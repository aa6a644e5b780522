//! Standard operations every backing engine executes
//!
//! Operations are:
//! - **Self-contained**: all parameters are in the variant
//! - **Locator-scoped**: each targets exactly one resource locator; fan-out
//!   across locators is the record store's job, not the engine's
//! - **Atomic**: an engine applies each operation all-or-nothing
//! - **Pure data**: serializable, no closures

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};
use crate::filter::{RecordFilter, RecordsToFilterCriteria};
use crate::handling::NewHandlingEntry;
use crate::identity::ResourceLocator;
use crate::record::{DescribedSerialization, StreamRecordMetadata};
use crate::strategy::{
    ExistingRecordStrategy, ExistingStreamEncounteredStrategy, ExistingStreamNotEncounteredStrategy,
    OrderRecordsBy, VersionMatchStrategy,
};
use crate::tags::validate_tags;

/// A self-contained operation against one resource locator
///
/// Each variant maps to exactly one [`StandardOutput`](super::StandardOutput)
/// variant, noted on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardOp {
    // ==================== Stream lifecycle ====================
    /// Create the stream's storage.
    /// Returns: `StandardOutput::Unit`
    CreateStream {
        locator: ResourceLocator,
        strategy: ExistingStreamEncounteredStrategy,
    },

    /// Delete the stream's storage.
    /// Returns: `StandardOutput::Unit`
    DeleteStream {
        locator: ResourceLocator,
        strategy: ExistingStreamNotEncounteredStrategy,
    },

    /// Whether the stream's storage exists.
    /// Returns: `StandardOutput::Bool`
    StreamExists { locator: ResourceLocator },

    // ==================== Records ====================
    /// Append a record, applying the existing-record strategy atomically.
    /// Returns: `StandardOutput::Put`
    PutRecord {
        locator: ResourceLocator,
        metadata: StreamRecordMetadata,
        payload: DescribedSerialization,
        existing_record_strategy: ExistingRecordStrategy,
        record_retention_count: Option<i64>,
        version_match_strategy: VersionMatchStrategy,
    },

    /// Records matching a filter, in the requested order.
    /// Returns: `StandardOutput::Records`
    GetRecords {
        locator: ResourceLocator,
        filter: RecordFilter,
        criteria: RecordsToFilterCriteria,
        order: OrderRecordsBy,
    },

    /// Metadata of records matching a filter, in the requested order.
    /// Returns: `StandardOutput::Metadatas`
    GetMetadatas {
        locator: ResourceLocator,
        filter: RecordFilter,
        criteria: RecordsToFilterCriteria,
        order: OrderRecordsBy,
    },

    /// The matching record with the greatest internal id.
    /// Returns: `StandardOutput::MaybeRecord`
    GetLatestRecord {
        locator: ResourceLocator,
        filter: RecordFilter,
        criteria: RecordsToFilterCriteria,
    },

    /// Internal ids of matching records, ascending.
    /// Returns: `StandardOutput::RecordIds`
    GetInternalRecordIds {
        locator: ResourceLocator,
        filter: RecordFilter,
        criteria: RecordsToFilterCriteria,
    },

    /// Distinct business ids of matching records, in first-written order.
    /// Returns: `StandardOutput::Identifiers`
    GetDistinctIds {
        locator: ResourceLocator,
        filter: RecordFilter,
        criteria: RecordsToFilterCriteria,
    },

    /// Delete records (and their handling entries) below an internal id.
    /// Returns: `StandardOutput::Count`
    PruneBeforeInternalRecordId {
        locator: ResourceLocator,
        internal_record_id: u64,
    },

    // ==================== Handling ====================
    /// Handling entries, ascending by entry id. Empty `internal_record_ids`
    /// means every record; `None` concern means every concern.
    /// Returns: `StandardOutput::HandlingEntries`
    GetHandlingEntries {
        locator: ResourceLocator,
        internal_record_ids: Vec<u64>,
        concern: Option<String>,
    },

    /// Append handling entries atomically, in order.
    /// Returns: `StandardOutput::HandlingEntryIds`
    PutHandlingEntries {
        locator: ResourceLocator,
        entries: Vec<NewHandlingEntry>,
    },
}

impl StandardOp {
    /// Operation name, for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            StandardOp::CreateStream { .. } => "CreateStream",
            StandardOp::DeleteStream { .. } => "DeleteStream",
            StandardOp::StreamExists { .. } => "StreamExists",
            StandardOp::PutRecord { .. } => "PutRecord",
            StandardOp::GetRecords { .. } => "GetRecords",
            StandardOp::GetMetadatas { .. } => "GetMetadatas",
            StandardOp::GetLatestRecord { .. } => "GetLatestRecord",
            StandardOp::GetInternalRecordIds { .. } => "GetInternalRecordIds",
            StandardOp::GetDistinctIds { .. } => "GetDistinctIds",
            StandardOp::PruneBeforeInternalRecordId { .. } => "PruneBeforeInternalRecordId",
            StandardOp::GetHandlingEntries { .. } => "GetHandlingEntries",
            StandardOp::PutHandlingEntries { .. } => "PutHandlingEntries",
        }
    }

    /// Locator the operation targets
    pub fn locator(&self) -> &ResourceLocator {
        match self {
            StandardOp::CreateStream { locator, .. }
            | StandardOp::DeleteStream { locator, .. }
            | StandardOp::StreamExists { locator }
            | StandardOp::PutRecord { locator, .. }
            | StandardOp::GetRecords { locator, .. }
            | StandardOp::GetMetadatas { locator, .. }
            | StandardOp::GetLatestRecord { locator, .. }
            | StandardOp::GetInternalRecordIds { locator, .. }
            | StandardOp::GetDistinctIds { locator, .. }
            | StandardOp::PruneBeforeInternalRecordId { locator, .. }
            | StandardOp::GetHandlingEntries { locator, .. }
            | StandardOp::PutHandlingEntries { locator, .. } => locator,
        }
    }

    /// Validate every argument of the operation
    ///
    /// Engines call this before touching storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for sentinel strategies, bad tags, or an
    /// inconsistent retention count.
    pub fn validate(&self) -> StreamResult<()> {
        match self {
            StandardOp::CreateStream { strategy, .. } => strategy.validate().map(|_| ()),
            StandardOp::DeleteStream { strategy, .. } => strategy.validate().map(|_| ()),
            StandardOp::StreamExists { .. } => Ok(()),
            StandardOp::PutRecord {
                metadata,
                payload,
                existing_record_strategy,
                record_retention_count,
                version_match_strategy,
                ..
            } => {
                existing_record_strategy.validate_retention(*record_retention_count)?;
                version_match_strategy.validate()?;
                validate_tags(&metadata.tags)?;
                if metadata.serializer != payload.serializer {
                    return Err(StreamError::invalid_argument(
                        "metadata and payload serializer descriptors differ",
                    ));
                }
                if existing_record_strategy != &ExistingRecordStrategy::None
                    && metadata.string_serialized_id.is_none()
                {
                    return Err(StreamError::invalid_argument(format!(
                        "{} requires a business id",
                        existing_record_strategy
                    )));
                }
                Ok(())
            }
            StandardOp::GetRecords {
                filter,
                criteria,
                order,
                ..
            }
            | StandardOp::GetMetadatas {
                filter,
                criteria,
                order,
                ..
            } => {
                filter.validate()?;
                criteria.validate()?;
                order.validate().map(|_| ())
            }
            StandardOp::GetLatestRecord { filter, criteria, .. }
            | StandardOp::GetInternalRecordIds { filter, criteria, .. }
            | StandardOp::GetDistinctIds { filter, criteria, .. } => {
                filter.validate()?;
                criteria.validate()
            }
            StandardOp::PruneBeforeInternalRecordId { .. } => Ok(()),
            StandardOp::GetHandlingEntries { concern, .. } => match concern {
                Some(c) if c.trim().is_empty() => {
                    Err(StreamError::invalid_argument("concern must not be blank"))
                }
                _ => Ok(()),
            },
            StandardOp::PutHandlingEntries { entries, .. } => {
                if entries.is_empty() {
                    return Err(StreamError::invalid_argument(
                        "at least one handling entry is required",
                    ));
                }
                for entry in entries {
                    NewHandlingEntry::new(
                        entry.internal_record_id,
                        entry.concern.clone(),
                        entry.status,
                        entry.tags.clone(),
                        entry.details.clone(),
                    )?;
                }
                Ok(())
            }
        }
    }
}
