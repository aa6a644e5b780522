//! Existing-record policy for writes
//!
//! Every Put variant reduces to one decision: given the records already on
//! the target locator, should the new record be written, and which older
//! records must be pruned. Engines evaluate the plan and apply it under the
//! same lock as the append so readers never see one without the other.

use crate::error::{StreamError, StreamResult};
use crate::filter::FilterCandidate;
use crate::record::StreamRecordMetadata;
use crate::strategy::{ExistingRecordStrategy, VersionMatchStrategy};

/// Decision for one Put
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutPlan {
    /// Whether to append the new record
    pub write: bool,
    /// Pre-existing records matched by the strategy, ascending
    pub existing_record_ids: Vec<u64>,
    /// Records to delete after the append, ascending
    pub prune_record_ids: Vec<u64>,
}

/// Decide what a Put does
///
/// For pruning strategies at most `max(record_retention_count, 1)` matching
/// records remain afterwards, the new record always among them.
///
/// # Errors
///
/// Returns `InvalidArgument` for inconsistent arguments and
/// `RecordAlreadyExists` when a throw-if-found strategy matches.
pub fn plan_put<C: FilterCandidate>(
    existing: &[C],
    metadata: &StreamRecordMetadata,
    strategy: ExistingRecordStrategy,
    record_retention_count: Option<i64>,
    version_match_strategy: VersionMatchStrategy,
) -> StreamResult<PutPlan> {
    strategy.validate_retention(record_retention_count)?;
    version_match_strategy.validate()?;

    if strategy == ExistingRecordStrategy::None {
        return Ok(PutPlan {
            write: true,
            ..PutPlan::default()
        });
    }

    let id = metadata.string_serialized_id.as_ref().ok_or_else(|| {
        StreamError::invalid_argument(format!("{} requires a business id", strategy))
    })?;

    let mut matching = Vec::new();
    for candidate in existing {
        let other = candidate.metadata();
        let Some(other_id) = &other.string_serialized_id else {
            continue;
        };
        if !other_id.matches(id, version_match_strategy)? {
            continue;
        }
        if strategy.matches_on_type()
            && !other
                .object_type
                .matches(metadata.object_type.with_version(), version_match_strategy)?
        {
            continue;
        }
        matching.push(candidate.internal_record_id());
    }
    matching.sort_unstable();

    let found = !matching.is_empty();
    let plan = match strategy {
        ExistingRecordStrategy::ThrowIfFoundById | ExistingRecordStrategy::ThrowIfFoundByIdAndType
            if found =>
        {
            return Err(StreamError::record_already_exists(format!(
                "{} found {} existing record(s) for id {}",
                strategy,
                matching.len(),
                id
            )));
        }
        ExistingRecordStrategy::DoNotWriteIfFoundById
        | ExistingRecordStrategy::DoNotWriteIfFoundByIdAndType
            if found =>
        {
            PutPlan {
                write: false,
                existing_record_ids: matching,
                prune_record_ids: Vec::new(),
            }
        }
        ExistingRecordStrategy::PruneIfFoundById | ExistingRecordStrategy::PruneIfFoundByIdAndType => {
            // the new record takes one retention slot
            let keep_existing = record_retention_count.unwrap_or(0).max(1) as usize - 1;
            let prune_count = matching.len().saturating_sub(keep_existing);
            PutPlan {
                write: true,
                prune_record_ids: matching[..prune_count].to_vec(),
                existing_record_ids: matching,
            }
        }
        _ => PutPlan {
            write: true,
            existing_record_ids: matching,
            prune_record_ids: Vec::new(),
        },
    };
    Ok(plan)
}
