//! Matching, pre-selection and ordering

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::error::{StreamError, StreamResult};
use crate::handling::{HandlingEntry, HandlingFilter, HandlingStatus};
use crate::identity::ResourceLocator;
use crate::record::{LocatedMetadata, LocatedRecord, StreamRecord, StreamRecordMetadata};
use crate::strategy::{OrderRecordsBy, RecordsToFilterSelectionStrategy, TagMatchStrategy, VersionMatchStrategy};
use crate::tags::tags_match;

use super::record_filter::{RecordFilter, RecordsToFilterCriteria};

/// Anything the filter engine can match: a record or its metadata
pub trait FilterCandidate {
    /// Locator-scoped record id
    fn internal_record_id(&self) -> u64;

    /// Record metadata
    fn metadata(&self) -> &StreamRecordMetadata;

    /// Locator holding the record, when known
    fn locator(&self) -> Option<&ResourceLocator> {
        None
    }
}

impl<T: FilterCandidate + ?Sized> FilterCandidate for &T {
    fn internal_record_id(&self) -> u64 {
        (**self).internal_record_id()
    }

    fn metadata(&self) -> &StreamRecordMetadata {
        (**self).metadata()
    }

    fn locator(&self) -> Option<&ResourceLocator> {
        (**self).locator()
    }
}

impl FilterCandidate for StreamRecord {
    fn internal_record_id(&self) -> u64 {
        self.internal_record_id
    }

    fn metadata(&self) -> &StreamRecordMetadata {
        &self.metadata
    }
}

impl FilterCandidate for LocatedRecord {
    fn internal_record_id(&self) -> u64 {
        self.record.internal_record_id
    }

    fn metadata(&self) -> &StreamRecordMetadata {
        &self.record.metadata
    }

    fn locator(&self) -> Option<&ResourceLocator> {
        Some(&self.locator)
    }
}

impl FilterCandidate for LocatedMetadata {
    fn internal_record_id(&self) -> u64 {
        self.internal_record_id
    }

    fn metadata(&self) -> &StreamRecordMetadata {
        &self.metadata
    }

    fn locator(&self) -> Option<&ResourceLocator> {
        Some(&self.locator)
    }
}

/// Whether a single candidate satisfies the filter
///
/// # Errors
///
/// Returns `InvalidArgument` if the filter carries an `Unknown` strategy.
pub fn record_matches<C: FilterCandidate + ?Sized>(candidate: &C, filter: &RecordFilter) -> StreamResult<bool> {
    filter.validate()?;
    let strategy = filter.version_match_strategy();
    let metadata = candidate.metadata();

    if !filter.internal_record_ids().is_empty()
        && !filter.internal_record_ids().contains(&candidate.internal_record_id())
    {
        return Ok(false);
    }

    if !filter.ids().is_empty() {
        let Some(id) = &metadata.string_serialized_id else {
            return Ok(false);
        };
        if !any_ok(filter.ids(), |q| id.matches(q, strategy))? {
            return Ok(false);
        }
    }

    if !filter.id_types().is_empty() {
        let Some(id) = &metadata.string_serialized_id else {
            return Ok(false);
        };
        if !any_ok(filter.id_types(), |q| id.identifier_type.matches(q, strategy))? {
            return Ok(false);
        }
    }

    if !filter.object_types().is_empty()
        && !any_ok(filter.object_types(), |q| metadata.object_type.matches(q, strategy))?
    {
        return Ok(false);
    }

    tags_match(&metadata.tags, filter.tags(), filter.tag_match_strategy())
}

fn any_ok<T>(items: &[T], mut f: impl FnMut(&T) -> StreamResult<bool>) -> StreamResult<bool> {
    for item in items {
        if f(item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Apply the records-to-filter pre-selection
///
/// `LatestById` keeps the newest record per business id; records without
/// an id are always kept. Input order is preserved.
///
/// # Errors
///
/// Returns `InvalidArgument` for `Unknown` strategies.
pub fn select_records_to_filter<C: FilterCandidate + Clone>(
    candidates: &[C],
    criteria: &RecordsToFilterCriteria,
) -> StreamResult<Vec<C>> {
    criteria.validate()?;
    let by_type = match criteria.selection {
        RecordsToFilterSelectionStrategy::All => return Ok(candidates.to_vec()),
        RecordsToFilterSelectionStrategy::LatestById => false,
        RecordsToFilterSelectionStrategy::LatestByIdAndObjectType => true,
        RecordsToFilterSelectionStrategy::Unknown => {
            return Err(StreamError::invalid_argument("records-to-filter selection is Unknown"))
        }
    };

    // newest candidate index per group; locator is part of the key since
    // internal ids are only comparable within a locator
    let mut newest: HashMap<(Option<String>, String, String), usize> = HashMap::new();
    for (index, candidate) in candidates.iter().enumerate() {
        let metadata = candidate.metadata();
        let Some(id) = &metadata.string_serialized_id else {
            continue;
        };
        let type_key = if by_type {
            match criteria.version_match_strategy {
                VersionMatchStrategy::SpecifiedVersion => {
                    metadata.object_type.with_version().to_string()
                }
                _ => metadata.object_type.without_version().to_string(),
            }
        } else {
            String::new()
        };
        let key = (
            candidate.locator().map(|l| l.as_str().to_string()),
            format!("{}|{}", id.id, id.identifier_type.without_version()),
            type_key,
        );
        match newest.get(&key) {
            Some(&existing)
                if candidates[existing].internal_record_id() >= candidate.internal_record_id() => {}
            _ => {
                newest.insert(key, index);
            }
        }
    }

    let keep: HashSet<usize> = newest.into_values().collect();
    Ok(candidates
        .iter()
        .enumerate()
        .filter(|(index, c)| c.metadata().string_serialized_id.is_none() || keep.contains(index))
        .map(|(_, c)| c.clone())
        .collect())
}

/// Pre-select, then keep the candidates matching the filter
///
/// Input order is preserved. Filtering an already filtered result with
/// the same filter and criteria returns it unchanged.
///
/// # Errors
///
/// Returns `InvalidArgument` for `Unknown` strategies.
pub fn filter_records<C: FilterCandidate + Clone>(
    candidates: &[C],
    filter: &RecordFilter,
    criteria: &RecordsToFilterCriteria,
) -> StreamResult<Vec<C>> {
    filter.validate()?;
    let selected = select_records_to_filter(candidates, criteria)?;
    let mut matched = Vec::with_capacity(selected.len());
    for candidate in selected {
        if record_matches(&candidate, filter)? {
            matched.push(candidate);
        }
    }
    Ok(matched)
}

/// Sort candidates into a total order
///
/// Ties on the primary key are broken by locator, then internal id.
///
/// # Errors
///
/// Returns `InvalidArgument` for `Unspecified`.
pub fn order_records<C: FilterCandidate>(records: &mut [C], order: OrderRecordsBy) -> StreamResult<()> {
    order.validate()?;
    let tie_break = |a: &C, b: &C| -> Ordering {
        a.locator()
            .cmp(&b.locator())
            .then(a.internal_record_id().cmp(&b.internal_record_id()))
    };
    match order {
        OrderRecordsBy::InternalRecordIdAscending => records.sort_by(|a, b| {
            a.internal_record_id()
                .cmp(&b.internal_record_id())
                .then_with(|| tie_break(a, b))
        }),
        OrderRecordsBy::InternalRecordIdDescending => records.sort_by(|a, b| {
            b.internal_record_id()
                .cmp(&a.internal_record_id())
                .then_with(|| tie_break(b, a))
        }),
        OrderRecordsBy::TimestampAscending => records.sort_by(|a, b| {
            a.metadata()
                .timestamp_utc
                .cmp(&b.metadata().timestamp_utc)
                .then_with(|| tie_break(a, b))
        }),
        OrderRecordsBy::TimestampDescending => records.sort_by(|a, b| {
            b.metadata()
                .timestamp_utc
                .cmp(&a.metadata().timestamp_utc)
                .then_with(|| tie_break(b, a))
        }),
        OrderRecordsBy::Unspecified => {
            return Err(StreamError::invalid_argument("record order is Unspecified"))
        }
    }
    Ok(())
}

/// Whether a pair's latest entry satisfies a handling filter
///
/// `latest` is `None` for a pair with no entries (status `Unclaimed`,
/// no tags).
pub fn handling_matches(latest: Option<&HandlingEntry>, filter: &HandlingFilter) -> StreamResult<bool> {
    let status = latest.map(|e| e.status).unwrap_or(HandlingStatus::Unclaimed);
    if !filter.current_statuses().is_empty() && !filter.current_statuses().contains(&status) {
        return Ok(false);
    }
    let tags = latest.map(|e| e.tags.as_slice()).unwrap_or(&[]);
    tags_match(tags, filter.tags(), TagMatchStrategy::RecordContainsAllQueryTags)
}
