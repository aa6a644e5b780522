//! Handling coordinator on a [`Stream`]
//!
//! Claims run under the distributed mutex scoped to `(primary locator, concern)`.
//! The mutex covers the blocked check, candidate selection and the
//! `Requested`+`Running` append, and is released before the claim is
//! returned. Outcome entries are validated against the current status
//! under the same mutex, so two callers cannot both finish one attempt.
//!
//! Stream-wide blocking lives on the primary locator under
//! [`BLOCKING_CONCERN`] and has its own mutex scope.

use chrono::Utc;
use rstream_core::{
    current_status, handling_matches, is_stream_blocked, latest_entries, order_records, validate_concern,
    validate_tags, HandlingEntry, HandlingFilter, HandlingStatus, LocatedRecord, NewHandlingEntry, OrderRecordsBy,
    RecordFilter, RecordHandlingStatus, RecordsToFilterCriteria, ResourceLocator, StandardOp, StreamError,
    StreamResult, Tag, TryHandleResult, BLOCKING_CONCERN, BLOCKING_RECORD_ID,
};
use tracing::{debug, info, warn};

use crate::record_store::RecordLocation;
use crate::stream::Stream;

const LEASE_EXPIRED_DETAILS: &str = "claim lease expired";

/// What a claimant is willing to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    /// Records eligible for the claim
    pub filter: RecordFilter,
    /// Pre-selection applied before `filter`
    pub criteria: RecordsToFilterCriteria,
    /// Narrows the eligible handling statuses and entry tags
    pub handling_filter: HandlingFilter,
    /// Tie-break between eligible records; the first wins
    pub order: OrderRecordsBy,
    /// Tags written on the claim's entries
    pub tags: Vec<Tag>,
}

impl Default for ClaimRequest {
    fn default() -> Self {
        Self {
            filter: RecordFilter::all(),
            criteria: RecordsToFilterCriteria::default(),
            handling_filter: HandlingFilter::new(),
            order: OrderRecordsBy::TimestampAscending,
            tags: Vec::new(),
        }
    }
}

impl ClaimRequest {
    /// Claim any eligible record, oldest first
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict eligible records
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Pre-select records before filtering
    pub fn with_criteria(mut self, criteria: RecordsToFilterCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Narrow eligibility by handling status or entry tags
    pub fn with_handling_filter(mut self, handling_filter: HandlingFilter) -> Self {
        self.handling_filter = handling_filter;
        self
    }

    /// Change the tie-break order
    pub fn with_order(mut self, order: OrderRecordsBy) -> Self {
        self.order = order;
        self
    }

    /// Tag the claim's entries
    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        self.tags = tags;
        self
    }

    fn validate(&self) -> StreamResult<()> {
        self.filter.validate()?;
        self.criteria.validate()?;
        self.order.validate()?;
        validate_tags(&self.tags)
    }
}

impl Stream {
    // ========================================================================
    // Ledger access
    // ========================================================================

    fn handling_entries(
        &self,
        locator: &ResourceLocator,
        internal_record_ids: Vec<u64>,
        concern: Option<&str>,
    ) -> StreamResult<Vec<HandlingEntry>> {
        self.execute(StandardOp::GetHandlingEntries {
            locator: locator.clone(),
            internal_record_ids,
            concern: concern.map(str::to_string),
        })?
        .into_handling_entries("GetHandlingEntries")
    }

    fn append_entries(&self, locator: &ResourceLocator, entries: Vec<NewHandlingEntry>) -> StreamResult<Vec<u64>> {
        self.execute(StandardOp::PutHandlingEntries {
            locator: locator.clone(),
            entries,
        })?
        .into_handling_entry_ids("PutHandlingEntries")
    }

    /// Id of the appended entry; `None` when the engine stores nothing
    fn append_entry(&self, locator: &ResourceLocator, entry: NewHandlingEntry) -> StreamResult<Option<u64>> {
        Ok(self.append_entries(locator, vec![entry])?.into_iter().next())
    }

    fn blocking_entries(&self) -> StreamResult<Vec<HandlingEntry>> {
        self.handling_entries(
            self.resolver().primary_locator(),
            vec![BLOCKING_RECORD_ID],
            Some(BLOCKING_CONCERN),
        )
    }

    // ========================================================================
    // Claims
    // ========================================================================

    /// Try to claim one eligible record for `concern`
    ///
    /// Returns a blocked result while the stream is blocked and an empty
    /// result when nothing is eligible. A record is eligible when it matches
    /// the request's filter, its current status for `concern` is available
    /// for claiming, and its latest entry satisfies the handling filter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank or reserved concern or an
    /// invalid request, `MutexTimeout` if the claim mutex is contended past
    /// the stream's timeout, and engine errors unchanged.
    pub fn try_handle(&self, concern: &str, request: &ClaimRequest) -> StreamResult<TryHandleResult> {
        validate_concern(concern)?;
        request.validate()?;

        let _guard = self.lock_concern(concern)?;

        if is_stream_blocked(&self.blocking_entries()?) {
            warn!(target: "rstream::handling", stream = %self.name(), concern, "Claim refused, stream is blocked");
            return Ok(TryHandleResult::blocked());
        }

        let mut candidates: Vec<LocatedRecord> = Vec::new();
        for locator in self.locators() {
            candidates.extend(self.eligible_on(locator, concern, request)?);
        }
        order_records(&mut candidates, request.order)?;

        let Some(chosen) = candidates.into_iter().next() else {
            debug!(target: "rstream::handling", stream = %self.name(), concern, "Nothing to handle");
            return Ok(TryHandleResult::nothing_to_handle());
        };

        let id = chosen.record.internal_record_id;
        let entry_ids = self.append_entries(
            &chosen.locator,
            vec![
                NewHandlingEntry::new(id, concern, HandlingStatus::Requested, request.tags.clone(), None)?,
                NewHandlingEntry::new(id, concern, HandlingStatus::Running, request.tags.clone(), None)?,
            ],
        )?;

        info!(
            target: "rstream::handling",
            stream = %self.name(),
            concern,
            locator = %chosen.locator,
            internal_record_id = id,
            entries = ?entry_ids,
            "Claimed record"
        );
        Ok(TryHandleResult::claimed(chosen.locator, chosen.record))
    }

    /// Eligible records on one locator, expiring stale claims first
    fn eligible_on(
        &self,
        locator: &ResourceLocator,
        concern: &str,
        request: &ClaimRequest,
    ) -> StreamResult<Vec<LocatedRecord>> {
        // expiry covers the whole locator, not just records this filter matches
        let mut entries = self.handling_entries(locator, Vec::new(), Some(concern))?;
        if self.expire_stale_claims(locator, concern, &entries)? {
            entries = self.handling_entries(locator, Vec::new(), Some(concern))?;
        }

        let records = self
            .execute(StandardOp::GetRecords {
                locator: locator.clone(),
                filter: request.filter.clone(),
                criteria: request.criteria,
                order: OrderRecordsBy::InternalRecordIdAscending,
            })?
            .into_records("GetRecords")?;
        if records.is_empty() {
            return Ok(records);
        }

        let latest = latest_entries(&entries);
        let mut eligible = Vec::new();
        for record in records {
            let entry = latest.get(&(record.record.internal_record_id, concern)).copied();
            let status = entry.map(|e| e.status).unwrap_or(HandlingStatus::Unclaimed);
            if status.is_available() && handling_matches(entry, &request.handling_filter)? {
                eligible.push(record);
            }
        }
        Ok(eligible)
    }

    /// Cancel `Running` attempts older than the claim lease
    ///
    /// Returns whether any entry was appended.
    fn expire_stale_claims(
        &self,
        locator: &ResourceLocator,
        concern: &str,
        entries: &[HandlingEntry],
    ) -> StreamResult<bool> {
        let Some(lease) = self.claim_lease() else {
            return Ok(false);
        };
        let now = Utc::now();
        let mut expired = Vec::new();
        for entry in latest_entries(entries).into_values() {
            if entry.status != HandlingStatus::Running {
                continue;
            }
            let age = (now - entry.timestamp_utc).to_std().unwrap_or_default();
            if age >= lease {
                warn!(
                    target: "rstream::handling",
                    stream = %self.name(),
                    concern,
                    locator = %locator,
                    internal_record_id = entry.internal_record_id,
                    age_ms = age.as_millis() as u64,
                    "Claim lease expired"
                );
                expired.push(NewHandlingEntry::new(
                    entry.internal_record_id,
                    concern,
                    HandlingStatus::CanceledRunning,
                    Vec::new(),
                    Some(LEASE_EXPIRED_DETAILS.to_string()),
                )?);
            }
        }
        if expired.is_empty() {
            return Ok(false);
        }
        expired.sort_by_key(|e| e.internal_record_id);
        self.append_entries(locator, expired)?;
        Ok(true)
    }

    // ========================================================================
    // Outcomes
    // ========================================================================

    fn transition(
        &self,
        location: &RecordLocation,
        concern: &str,
        to: HandlingStatus,
        details: Option<String>,
    ) -> StreamResult<Option<u64>> {
        validate_concern(concern)?;
        let _guard = self.lock_concern(concern)?;

        let entries = self.handling_entries(&location.locator, vec![location.internal_record_id], Some(concern))?;
        let from = current_status(&entries, location.internal_record_id, concern);
        if !from.can_transition_to(to) {
            return Err(StreamError::InvalidTransition {
                internal_record_id: location.internal_record_id,
                concern: concern.to_string(),
                from,
                to,
            });
        }

        let entry_id = self.append_entry(
            &location.locator,
            NewHandlingEntry::new(location.internal_record_id, concern, to, Vec::new(), details)?,
        )?;
        info!(
            target: "rstream::handling",
            stream = %self.name(),
            concern,
            locator = %location.locator,
            internal_record_id = location.internal_record_id,
            %from,
            %to,
            "Recorded handling outcome"
        );
        Ok(entry_id)
    }

    /// Record that a running attempt finished successfully
    ///
    /// Like every ledger write here, returns the new entry's id, or `None`
    /// on an engine that stores nothing.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the record is `Running` for `concern`.
    pub fn complete(
        &self,
        location: &RecordLocation,
        concern: &str,
        details: Option<String>,
    ) -> StreamResult<Option<u64>> {
        self.transition(location, concern, HandlingStatus::Completed, details)
    }

    /// Record that a running attempt failed
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the record is `Running` for `concern`.
    pub fn fail(
        &self,
        location: &RecordLocation,
        concern: &str,
        details: Option<String>,
    ) -> StreamResult<Option<u64>> {
        self.transition(location, concern, HandlingStatus::Failed, details)
    }

    /// Cancel a running attempt from outside
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the record is `Running` for `concern`.
    pub fn cancel_running(
        &self,
        location: &RecordLocation,
        concern: &str,
        details: Option<String>,
    ) -> StreamResult<Option<u64>> {
        self.transition(location, concern, HandlingStatus::CanceledRunning, details)
    }

    /// Abandon one's own running attempt
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the record is `Running` for `concern`.
    pub fn self_cancel_running(
        &self,
        location: &RecordLocation,
        concern: &str,
        details: Option<String>,
    ) -> StreamResult<Option<u64>> {
        self.transition(location, concern, HandlingStatus::SelfCanceledRunning, details)
    }

    /// Re-open a failed record for claiming
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the record is `Failed` for `concern`.
    pub fn retry_failed(
        &self,
        location: &RecordLocation,
        concern: &str,
        details: Option<String>,
    ) -> StreamResult<Option<u64>> {
        self.transition(location, concern, HandlingStatus::RetryFailed, details)
    }

    // ========================================================================
    // Stream-wide blocking
    // ========================================================================

    fn transition_stream(&self, to: HandlingStatus, details: Option<String>, check: bool) -> StreamResult<Option<u64>> {
        let _guard = self.lock_concern(BLOCKING_CONCERN)?;
        if check {
            let from = current_status(&self.blocking_entries()?, BLOCKING_RECORD_ID, BLOCKING_CONCERN);
            if !from.can_transition_to(to) {
                return Err(StreamError::InvalidTransition {
                    internal_record_id: BLOCKING_RECORD_ID,
                    concern: BLOCKING_CONCERN.to_string(),
                    from,
                    to,
                });
            }
        }
        let entry_id = self.append_entry(
            self.resolver().primary_locator(),
            NewHandlingEntry::new(BLOCKING_RECORD_ID, BLOCKING_CONCERN, to, Vec::new(), details)?,
        )?;
        warn!(target: "rstream::handling", stream = %self.name(), status = %to, "Stream block status changed");
        Ok(entry_id)
    }

    /// Halt claims for every concern until [`Stream::cancel_block`]
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for blank details and `InvalidTransition`
    /// if the stream is already blocked.
    pub fn block(&self, details: &str) -> StreamResult<Option<u64>> {
        self.transition_stream(HandlingStatus::Blocked, Some(details.to_string()), true)
    }

    /// Lift a stream block
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` if the stream is not blocked.
    pub fn cancel_block(&self, details: Option<String>) -> StreamResult<Option<u64>> {
        self.transition_stream(HandlingStatus::CanceledBlocked, details, true)
    }

    /// Whether claims are currently halted
    pub fn is_blocked(&self) -> StreamResult<bool> {
        Ok(is_stream_blocked(&self.blocking_entries()?))
    }

    // ========================================================================
    // Status and history
    // ========================================================================

    /// Current status of one record for `concern`
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank or reserved concern.
    pub fn get_handling_status(&self, location: &RecordLocation, concern: &str) -> StreamResult<HandlingStatus> {
        validate_concern(concern)?;
        let entries = self.handling_entries(&location.locator, vec![location.internal_record_id], Some(concern))?;
        Ok(current_status(&entries, location.internal_record_id, concern))
    }

    /// Current status of every matching record for each concern
    ///
    /// Results are grouped by locator, then record id, then concern in the
    /// order given.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank or reserved concern or an
    /// invalid filter.
    pub fn get_handling_statuses(
        &self,
        concerns: &[&str],
        filter: &RecordFilter,
        criteria: &RecordsToFilterCriteria,
    ) -> StreamResult<Vec<RecordHandlingStatus>> {
        for concern in concerns {
            validate_concern(concern)?;
        }
        filter.validate()?;
        criteria.validate()?;

        let mut statuses = Vec::new();
        for locator in self.locators() {
            let ids = self
                .execute(StandardOp::GetInternalRecordIds {
                    locator: locator.clone(),
                    filter: filter.clone(),
                    criteria: *criteria,
                })?
                .into_record_ids("GetInternalRecordIds")?;
            if ids.is_empty() {
                continue;
            }
            let entries = self.handling_entries(locator, ids.clone(), None)?;
            for id in ids {
                for concern in concerns {
                    statuses.push(RecordHandlingStatus {
                        locator: locator.clone(),
                        internal_record_id: id,
                        concern: concern.to_string(),
                        status: current_status(&entries, id, concern),
                    });
                }
            }
        }
        Ok(statuses)
    }

    /// Every entry recorded for a record, oldest first
    ///
    /// `None` returns the history of every concern.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank concern.
    pub fn get_handling_history(
        &self,
        location: &RecordLocation,
        concern: Option<&str>,
    ) -> StreamResult<Vec<HandlingEntry>> {
        if let Some(concern) = concern {
            rstream_core::require_non_blank(concern, "concern")?;
        }
        self.handling_entries(&location.locator, vec![location.internal_record_id], concern)
    }

    /// Every block and unblock recorded for the stream, oldest first
    pub fn get_block_history(&self) -> StreamResult<Vec<HandlingEntry>> {
        self.blocking_entries()
    }

    // ========================================================================
    // Administrative overrides
    // ========================================================================

    /// Force a record's status for `concern`, bypassing the transition table
    ///
    /// When `acceptable_current` is non-empty the current status must be one
    /// of its members.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a stream-axis or unrecordable status and
    /// `InvalidTransition` if the current status is not acceptable.
    pub fn update_handling_status_for_record(
        &self,
        location: &RecordLocation,
        concern: &str,
        status: HandlingStatus,
        acceptable_current: &[HandlingStatus],
        details: Option<String>,
        tags: Vec<Tag>,
    ) -> StreamResult<Option<u64>> {
        validate_concern(concern)?;
        if status.is_stream_axis() {
            return Err(StreamError::invalid_argument(format!(
                "{} applies to the whole stream, not a record",
                status
            )));
        }
        let entry = NewHandlingEntry::new(location.internal_record_id, concern, status, tags, details)?;

        let _guard = self.lock_concern(concern)?;
        let entries = self.handling_entries(&location.locator, vec![location.internal_record_id], Some(concern))?;
        let from = current_status(&entries, location.internal_record_id, concern);
        if !acceptable_current.is_empty() && !acceptable_current.contains(&from) {
            return Err(StreamError::InvalidTransition {
                internal_record_id: location.internal_record_id,
                concern: concern.to_string(),
                from,
                to: status,
            });
        }
        let entry_id = self.append_entry(&location.locator, entry)?;
        info!(
            target: "rstream::handling",
            stream = %self.name(),
            concern,
            locator = %location.locator,
            internal_record_id = location.internal_record_id,
            %from,
            to = %status,
            "Handling status overridden"
        );
        Ok(entry_id)
    }

    /// Force the stream-wide status, bypassing the blocked check
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` unless `status` is `Blocked` or
    /// `CanceledBlocked`, or when blocking without details.
    pub fn update_handling_status_for_stream(
        &self,
        status: HandlingStatus,
        details: Option<String>,
    ) -> StreamResult<Option<u64>> {
        if !status.is_stream_axis() {
            return Err(StreamError::invalid_argument(format!(
                "{} is not a stream-wide status",
                status
            )));
        }
        self.transition_stream(status, details, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstream_core::ExistingStreamEncounteredStrategy;
    use std::time::Duration;

    fn stream_with(records: u32) -> (Stream, Vec<RecordLocation>) {
        let stream = Stream::in_memory("jobs").unwrap();
        stream.create_stream(ExistingStreamEncounteredStrategy::Throw).unwrap();
        let locations = (0..records)
            .map(|i| {
                stream
                    .put_with_id(&format!("job-{i}"), &i, &Default::default())
                    .unwrap()
                    .location()
                    .unwrap()
            })
            .collect();
        (stream, locations)
    }

    #[test]
    fn test_claims_oldest_first() {
        let (stream, locations) = stream_with(2);
        let claim = stream.try_handle("export", &ClaimRequest::new()).unwrap();
        assert_eq!(RecordLocation::from(claim.record().unwrap()), locations[0]);
        assert_eq!(stream.get_handling_status(&locations[0], "export").unwrap(), HandlingStatus::Running);
    }

    #[test]
    fn test_nothing_to_handle() {
        let (stream, _) = stream_with(0);
        let result = stream.try_handle("export", &ClaimRequest::new()).unwrap();
        assert!(result.record().is_none());
        assert!(!result.is_blocked());
    }

    #[test]
    fn test_reserved_concern_rejected() {
        let (stream, _) = stream_with(1);
        assert!(stream
            .try_handle(BLOCKING_CONCERN, &ClaimRequest::new())
            .unwrap_err()
            .is_invalid_argument());
        assert!(stream.try_handle(" ", &ClaimRequest::new()).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_complete_requires_running() {
        let (stream, locations) = stream_with(1);
        let err = stream.complete(&locations[0], "export", None).unwrap_err();
        assert!(matches!(
            err,
            StreamError::InvalidTransition {
                from: HandlingStatus::Unclaimed,
                to: HandlingStatus::Completed,
                ..
            }
        ));
    }

    #[test]
    fn test_lease_expiry_reopens_claim() {
        let stream = Stream::builder("jobs").claim_lease(Duration::from_millis(1)).build().unwrap();
        stream.create_stream(ExistingStreamEncounteredStrategy::Throw).unwrap();
        let location = stream
            .put_with_id(&"job".to_string(), &1u64, &Default::default())
            .unwrap()
            .location()
            .unwrap();
        assert!(stream.try_handle("export", &ClaimRequest::new()).unwrap().record().is_some());
        std::thread::sleep(Duration::from_millis(5));

        let again = stream.try_handle("export", &ClaimRequest::new()).unwrap();
        assert_eq!(RecordLocation::from(again.record().unwrap()), location);
        let history = stream.get_handling_history(&location, Some("export")).unwrap();
        let statuses: Vec<_> = history.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                HandlingStatus::Requested,
                HandlingStatus::Running,
                HandlingStatus::CanceledRunning,
                HandlingStatus::Requested,
                HandlingStatus::Running,
            ]
        );
        assert_eq!(history[2].details.as_deref(), Some(LEASE_EXPIRED_DETAILS));
    }

    #[test]
    fn test_lease_expiry_ignores_claim_filter() {
        let stream = Stream::builder("jobs").claim_lease(Duration::from_millis(1)).build().unwrap();
        stream.create_stream(ExistingStreamEncounteredStrategy::Throw).unwrap();
        let location = stream
            .put_with_id(&"job".to_string(), &1u64, &Default::default())
            .unwrap()
            .location()
            .unwrap();
        assert!(stream.try_handle("export", &ClaimRequest::new()).unwrap().record().is_some());
        std::thread::sleep(Duration::from_millis(5));

        let nothing = RecordFilter::builder().internal_record_ids([999]).build().unwrap();
        let result = stream
            .try_handle("export", &ClaimRequest::new().with_filter(nothing))
            .unwrap();
        assert!(result.record().is_none());
        assert_eq!(
            stream.get_handling_status(&location, "export").unwrap(),
            HandlingStatus::CanceledRunning
        );
    }

    #[test]
    fn test_stream_override_only_accepts_stream_axis() {
        let (stream, _) = stream_with(0);
        assert!(stream
            .update_handling_status_for_stream(HandlingStatus::Completed, None)
            .unwrap_err()
            .is_invalid_argument());
        assert!(stream
            .update_handling_status_for_stream(HandlingStatus::Blocked, None)
            .unwrap_err()
            .is_invalid_argument());
        stream
            .update_handling_status_for_stream(HandlingStatus::Blocked, Some("maintenance".into()))
            .unwrap();
        // no axis check on overrides
        stream
            .update_handling_status_for_stream(HandlingStatus::Blocked, Some("still".into()))
            .unwrap();
        assert!(stream.is_blocked().unwrap());
        assert_eq!(stream.get_block_history().unwrap().len(), 2);
    }
}
