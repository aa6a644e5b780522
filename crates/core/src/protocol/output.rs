//! Outputs of standard operations
//!
//! Every operation produces exactly one output variant. The mapping is
//! deterministic: the same operation always produces the same variant.

use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};
use crate::handling::HandlingEntry;
use crate::identity::StringSerializedIdentifier;
use crate::record::{LocatedMetadata, LocatedRecord};

/// What a `PutRecord` did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutRecordResult {
    /// Id of the new record; `None` when nothing was written
    pub internal_record_id: Option<u64>,
    /// Ids of pre-existing records matched by the existing-record strategy
    pub existing_record_ids: Vec<u64>,
    /// Ids of records removed by retention pruning
    pub pruned_record_ids: Vec<u64>,
}

/// Successful operation results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardOutput {
    /// No return value
    Unit,
    /// Boolean result
    Bool(bool),
    /// Count of affected items
    Count(u64),
    /// Result of a record write
    Put(PutRecordResult),
    /// Records with their locator
    Records(Vec<LocatedRecord>),
    /// Metadata with their locator
    Metadatas(Vec<LocatedMetadata>),
    /// Optional record
    MaybeRecord(Option<LocatedRecord>),
    /// Internal record ids
    RecordIds(Vec<u64>),
    /// Business identifiers
    Identifiers(Vec<StringSerializedIdentifier>),
    /// Handling ledger rows
    HandlingEntries(Vec<HandlingEntry>),
    /// Ids assigned to appended handling entries
    HandlingEntryIds(Vec<u64>),
}

macro_rules! output_accessor {
    ($fn_name:ident, $variant:ident, $ty:ty) => {
        /// Unwrap the expected variant
        ///
        /// # Errors
        ///
        /// Returns `UnexpectedOutput` naming `operation` for any other variant.
        pub fn $fn_name(self, operation: &str) -> StreamResult<$ty> {
            match self {
                StandardOutput::$variant(v) => Ok(v),
                _ => Err(StreamError::unexpected_output(operation)),
            }
        }
    };
}

impl StandardOutput {
    output_accessor!(into_bool, Bool, bool);
    output_accessor!(into_count, Count, u64);
    output_accessor!(into_put, Put, PutRecordResult);
    output_accessor!(into_records, Records, Vec<LocatedRecord>);
    output_accessor!(into_metadatas, Metadatas, Vec<LocatedMetadata>);
    output_accessor!(into_maybe_record, MaybeRecord, Option<LocatedRecord>);
    output_accessor!(into_record_ids, RecordIds, Vec<u64>);
    output_accessor!(into_identifiers, Identifiers, Vec<StringSerializedIdentifier>);
    output_accessor!(into_handling_entries, HandlingEntries, Vec<HandlingEntry>);
    output_accessor!(into_handling_entry_ids, HandlingEntryIds, Vec<u64>);

    /// Expect `Unit`
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedOutput` naming `operation` for any other variant.
    pub fn into_unit(self, operation: &str) -> StreamResult<()> {
        match self {
            StandardOutput::Unit => Ok(()),
            _ => Err(StreamError::unexpected_output(operation)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessor_returns_inner_value() {
        assert!(StandardOutput::Bool(true).into_bool("StreamExists").unwrap());
        assert_eq!(StandardOutput::RecordIds(vec![1, 2]).into_record_ids("GetInternalRecordIds").unwrap(), vec![1, 2]);
        assert!(StandardOutput::Unit.into_unit("CreateStream").is_ok());
    }

    #[test]
    fn accessor_rejects_other_variants() {
        let err = StandardOutput::Unit.into_records("GetRecords").unwrap_err();
        assert_eq!(
            err,
            StreamError::UnexpectedOutput {
                operation: "GetRecords".into()
            }
        );
    }
}
