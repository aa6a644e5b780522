//! Caller-selected policies
//!
//! Every policy enum carries an `Unknown` member. It is what an unrecognized
//! wire or config value deserializes to, and it is always rejected with
//! `InvalidArgument` before any engine access; it never falls back to a default.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StreamError, StreamResult};

macro_rules! sentinel_policy {
    ($ty:ident, $label:expr) => {
        impl $ty {
            /// Reject the `Unknown` sentinel
            ///
            /// # Errors
            ///
            /// Returns `InvalidArgument` if `self` is `Unknown`.
            pub fn validate(self) -> StreamResult<Self> {
                if self == $ty::Unknown {
                    return Err(StreamError::invalid_argument(format!(
                        "{} must not be Unknown",
                        $label
                    )));
                }
                Ok(self)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

/// How a type's version takes part in matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum VersionMatchStrategy {
    /// Any version of the same logical type matches
    #[default]
    Any,
    /// Versions must be equal
    SpecifiedVersion,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(VersionMatchStrategy, "version match strategy");

/// How a candidate's tags must relate to the query's tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TagMatchStrategy {
    /// Candidate tags are a superset of the query tags
    #[default]
    RecordContainsAllQueryTags,
    /// Candidate carries at least one query tag
    RecordContainsAnyQueryTag,
    /// Candidate tags equal the query tags as a set
    RecordTagsEqualQueryTags,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(TagMatchStrategy, "tag match strategy");

/// What a Put does when records for the same business id already exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExistingRecordStrategy {
    /// Always append, never prune
    #[default]
    None,
    /// Fail if a record with the same id exists
    ThrowIfFoundById,
    /// Fail if a record with the same id and object type exists
    ThrowIfFoundByIdAndType,
    /// Write nothing if a record with the same id exists
    DoNotWriteIfFoundById,
    /// Write nothing if a record with the same id and object type exists
    DoNotWriteIfFoundByIdAndType,
    /// Append, then prune the oldest records with the same id
    PruneIfFoundById,
    /// Append, then prune the oldest records with the same id and object type
    PruneIfFoundByIdAndType,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(ExistingRecordStrategy, "existing record strategy");

impl ExistingRecordStrategy {
    /// Whether this strategy prunes and therefore needs a retention count
    pub fn is_prune(self) -> bool {
        matches!(
            self,
            ExistingRecordStrategy::PruneIfFoundById | ExistingRecordStrategy::PruneIfFoundByIdAndType
        )
    }

    /// Whether existing records are matched on object type as well as id
    pub fn matches_on_type(self) -> bool {
        matches!(
            self,
            ExistingRecordStrategy::ThrowIfFoundByIdAndType
                | ExistingRecordStrategy::DoNotWriteIfFoundByIdAndType
                | ExistingRecordStrategy::PruneIfFoundByIdAndType
        )
    }

    /// Check the retention count against the strategy
    ///
    /// Pruning strategies need a count of at least zero; all others need none.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on any inconsistency.
    pub fn validate_retention(self, record_retention_count: Option<i64>) -> StreamResult<()> {
        self.validate()?;
        match (self.is_prune(), record_retention_count) {
            (true, None) => Err(StreamError::invalid_argument(format!(
                "record retention count is required for {}",
                self
            ))),
            (true, Some(count)) if count < 0 => Err(StreamError::invalid_argument(format!(
                "record retention count must be >= 0, got {}",
                count
            ))),
            (false, Some(_)) => Err(StreamError::invalid_argument(format!(
                "record retention count must be absent for {}",
                self
            ))),
            _ => Ok(()),
        }
    }
}

/// What a read does when nothing matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordNotFoundStrategy {
    /// Return `None` or an empty collection
    #[default]
    ReturnDefault,
    /// Fail with `RecordNotFound`
    Throw,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(RecordNotFoundStrategy, "record not found strategy");

/// Ordering applied to query results and claim candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderRecordsBy {
    /// Oldest record first
    #[default]
    InternalRecordIdAscending,
    /// Newest record first
    InternalRecordIdDescending,
    /// Earliest record timestamp first
    TimestampAscending,
    /// Latest record timestamp first
    TimestampDescending,
    /// Unrecognized value
    #[serde(other)]
    Unspecified,
}

impl OrderRecordsBy {
    /// Reject the `Unspecified` sentinel
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `self` is `Unspecified`.
    pub fn validate(self) -> StreamResult<Self> {
        if self == OrderRecordsBy::Unspecified {
            return Err(StreamError::invalid_argument(
                "order records by must not be Unspecified",
            ));
        }
        Ok(self)
    }
}

/// Which type a Put stamps on the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeSelectionStrategy {
    /// The declared (static) type of the object
    #[default]
    UseDeclaredType,
    /// The object's runtime type; fails if it cannot be determined
    UseRuntimeType,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(TypeSelectionStrategy, "type selection strategy");

/// Which candidates are fed into a record filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RecordsToFilterSelectionStrategy {
    /// Every record
    #[default]
    All,
    /// Only the newest record per business id
    LatestById,
    /// Only the newest record per business id and object type
    LatestByIdAndObjectType,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(RecordsToFilterSelectionStrategy, "records to filter selection strategy");

/// What stream creation does when storage already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExistingStreamEncounteredStrategy {
    /// Fail with `StreamAlreadyExists`
    #[default]
    Throw,
    /// Leave the existing storage untouched
    Skip,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(ExistingStreamEncounteredStrategy, "existing stream encountered strategy");

/// What stream deletion does when storage does not exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExistingStreamNotEncounteredStrategy {
    /// Fail with `StreamNotFound`
    #[default]
    Throw,
    /// Do nothing
    Skip,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

sentinel_policy!(
    ExistingStreamNotEncounteredStrategy,
    "existing stream not encountered strategy"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sentinels_are_rejected() {
        assert!(VersionMatchStrategy::Unknown.validate().unwrap_err().is_invalid_argument());
        assert!(TagMatchStrategy::Unknown.validate().is_err());
        assert!(ExistingRecordStrategy::Unknown.validate().is_err());
        assert!(RecordNotFoundStrategy::Unknown.validate().is_err());
        assert!(OrderRecordsBy::Unspecified.validate().is_err());
        assert!(TypeSelectionStrategy::Unknown.validate().is_err());
        assert!(RecordsToFilterSelectionStrategy::Unknown.validate().is_err());
        assert!(ExistingStreamEncounteredStrategy::Unknown.validate().is_err());
        assert!(ExistingStreamNotEncounteredStrategy::Unknown.validate().is_err());
    }

    #[test]
    fn known_values_pass_validation() {
        assert_eq!(VersionMatchStrategy::Any.validate().unwrap(), VersionMatchStrategy::Any);
        assert!(TagMatchStrategy::default().validate().is_ok());
        assert!(OrderRecordsBy::default().validate().is_ok());
    }

    #[test]
    fn unrecognized_wire_value_deserializes_to_sentinel() {
        let strategy: TagMatchStrategy = serde_json::from_str("\"SomethingNew\"").unwrap();
        assert_eq!(strategy, TagMatchStrategy::Unknown);
        let order: OrderRecordsBy = serde_json::from_str("\"Random\"").unwrap();
        assert_eq!(order, OrderRecordsBy::Unspecified);
    }

    #[test]
    fn known_wire_values_keep_their_variant() {
        let json = serde_json::to_string(&ExistingRecordStrategy::PruneIfFoundByIdAndType).unwrap();
        assert_eq!(json, "\"PruneIfFoundByIdAndType\"");
        let strategy: ExistingRecordStrategy = serde_json::from_str(&json).unwrap();
        assert_eq!(strategy, ExistingRecordStrategy::PruneIfFoundByIdAndType);
        let strategy: VersionMatchStrategy = serde_json::from_str("\"SpecifiedVersion\"").unwrap();
        assert_eq!(strategy, VersionMatchStrategy::SpecifiedVersion);
        let unknown: RecordNotFoundStrategy = serde_json::from_str("\"Later\"").unwrap();
        assert!(unknown.validate().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn default_tag_match_is_superset() {
        assert_eq!(TagMatchStrategy::default(), TagMatchStrategy::RecordContainsAllQueryTags);
    }

    #[test]
    fn retention_count_required_for_prune() {
        let err = ExistingRecordStrategy::PruneIfFoundById
            .validate_retention(None)
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(ExistingRecordStrategy::PruneIfFoundByIdAndType
            .validate_retention(Some(-1))
            .is_err());
        assert!(ExistingRecordStrategy::PruneIfFoundById
            .validate_retention(Some(0))
            .is_ok());
    }

    #[test]
    fn retention_count_forbidden_without_prune() {
        assert!(ExistingRecordStrategy::None.validate_retention(Some(3)).is_err());
        assert!(ExistingRecordStrategy::DoNotWriteIfFoundById
            .validate_retention(Some(1))
            .is_err());
        assert!(ExistingRecordStrategy::None.validate_retention(None).is_ok());
    }

    #[test]
    fn type_matching_strategies() {
        assert!(ExistingRecordStrategy::PruneIfFoundByIdAndType.matches_on_type());
        assert!(!ExistingRecordStrategy::PruneIfFoundById.matches_on_type());
        assert!(ExistingRecordStrategy::ThrowIfFoundByIdAndType.matches_on_type());
    }
}
