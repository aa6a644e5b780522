//! Handling ledger model
//!
//! Each `(internal_record_id, concern)` pair accumulates immutable
//! `HandlingEntry` rows. The current status of a pair is the status of its
//! entry with the greatest `internal_handling_entry_id`; a pair with no
//! entries is `Unclaimed`.
//!
//! ## Normal cycle
//!
//! ```text
//! Unclaimed ──► Requested ──► Running ──► Completed
//!     ▲                          │
//!     │                          ├──► Failed ──► RetryFailed ──► Requested ...
//!     │                          ├──► CanceledRunning ─────────► Requested ...
//!     │                          └──► SelfCanceledRunning ─────► Requested ...
//! ```
//!
//! ## Stream axis
//!
//! `Blocked` / `CanceledBlocked` are recorded under [`BLOCKING_CONCERN`] on
//! record id [`BLOCKING_RECORD_ID`] and gate claims for every concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{require_non_blank, StreamError, StreamResult};
use crate::identity::ResourceLocator;
use crate::record::StreamRecord;
use crate::tags::{validate_tags, Tag};

/// Reserved concern under which stream-wide blocking is recorded
pub const BLOCKING_CONCERN: &str = "__stream_blocking__";

/// Record id used for stream-wide blocking entries
pub const BLOCKING_RECORD_ID: u64 = 0;

/// Status of one `(record, concern)` pair, or of the stream axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlingStatus {
    /// No entries recorded yet
    Unclaimed,
    /// A claimant asked to handle the record
    Requested,
    /// A claimant is handling the record
    Running,
    /// Handling finished successfully
    Completed,
    /// Handling failed
    Failed,
    /// A failed record was re-opened for claiming
    RetryFailed,
    /// An in-flight attempt was canceled from outside
    CanceledRunning,
    /// The processor abandoned its own attempt
    SelfCanceledRunning,
    /// All claims on the stream are halted
    Blocked,
    /// A stream block was lifted
    CanceledBlocked,
    /// Unrecognized value
    #[serde(other)]
    Unknown,
}

impl HandlingStatus {
    /// Statuses from which a record may be claimed
    pub const AVAILABLE: [HandlingStatus; 4] = [
        HandlingStatus::Unclaimed,
        HandlingStatus::RetryFailed,
        HandlingStatus::CanceledRunning,
        HandlingStatus::SelfCanceledRunning,
    ];

    /// Whether a record in this status may be claimed
    pub fn is_available(self) -> bool {
        Self::AVAILABLE.contains(&self)
    }

    /// Whether this status ends an attempt
    pub fn is_terminal_for_attempt(self) -> bool {
        matches!(
            self,
            HandlingStatus::Completed
                | HandlingStatus::Failed
                | HandlingStatus::CanceledRunning
                | HandlingStatus::SelfCanceledRunning
        )
    }

    /// Whether this status belongs to the stream-wide blocking axis
    pub fn is_stream_axis(self) -> bool {
        matches!(self, HandlingStatus::Blocked | HandlingStatus::CanceledBlocked)
    }

    /// Whether the normal cycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: HandlingStatus) -> bool {
        use HandlingStatus::*;
        match (self, next) {
            (from, Requested) => from.is_available(),
            (Requested, Running) => true,
            (Running, Completed | Failed | CanceledRunning | SelfCanceledRunning) => true,
            (Failed, RetryFailed) => true,
            (Unclaimed | CanceledBlocked, Blocked) => true,
            (Blocked, CanceledBlocked) => true,
            _ => false,
        }
    }

    /// Whether the status may be written to the ledger at all
    pub fn is_recordable(self) -> bool {
        !matches!(self, HandlingStatus::Unknown | HandlingStatus::Unclaimed)
    }
}

impl fmt::Display for HandlingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Validate a caller-supplied concern
///
/// # Errors
///
/// Returns `InvalidArgument` if blank or equal to the reserved blocking concern.
pub fn validate_concern(concern: &str) -> StreamResult<()> {
    require_non_blank(concern, "concern")?;
    if concern == BLOCKING_CONCERN {
        return Err(StreamError::invalid_argument(format!(
            "concern '{}' is reserved",
            BLOCKING_CONCERN
        )));
    }
    Ok(())
}

/// An immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlingEntry {
    /// Locator-scoped id assigned by the backing engine
    pub internal_handling_entry_id: u64,
    /// Record the entry is about
    pub internal_record_id: u64,
    /// Unit of work
    pub concern: String,
    /// Status recorded by this entry
    pub status: HandlingStatus,
    /// Entry tags
    pub tags: Vec<Tag>,
    /// Free-text details
    pub details: Option<String>,
    /// When the entry was recorded
    pub timestamp_utc: DateTime<Utc>,
}

/// A ledger entry before the engine assigns its id and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHandlingEntry {
    /// Record the entry is about
    pub internal_record_id: u64,
    /// Unit of work
    pub concern: String,
    /// Status to record
    pub status: HandlingStatus,
    /// Entry tags
    pub tags: Vec<Tag>,
    /// Free-text details
    pub details: Option<String>,
}

impl NewHandlingEntry {
    /// Build and validate an entry
    ///
    /// The reserved blocking concern is accepted here since the coordinator
    /// itself writes through this type.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank concern, a non-recordable status,
    /// an invalid tag, or a `Blocked` entry without details.
    pub fn new(
        internal_record_id: u64,
        concern: impl Into<String>,
        status: HandlingStatus,
        tags: Vec<Tag>,
        details: Option<String>,
    ) -> StreamResult<Self> {
        let concern = concern.into();
        require_non_blank(&concern, "concern")?;
        if !status.is_recordable() {
            return Err(StreamError::invalid_argument(format!(
                "status {} cannot be recorded",
                status
            )));
        }
        validate_tags(&tags)?;
        if status == HandlingStatus::Blocked {
            require_non_blank(details.as_deref().unwrap_or(""), "details for Blocked")?;
        }
        Ok(Self {
            internal_record_id,
            concern,
            status,
            tags,
            details,
        })
    }
}

/// Query predicate over handling entries
///
/// Empty fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlingFilter {
    current_statuses: Vec<HandlingStatus>,
    tags: Vec<Tag>,
}

impl HandlingFilter {
    /// Filter with no constraints
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain the current status
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a status is `Unknown`.
    pub fn with_current_statuses(mut self, statuses: Vec<HandlingStatus>) -> StreamResult<Self> {
        if statuses.contains(&HandlingStatus::Unknown) {
            return Err(StreamError::invalid_argument(
                "handling filter status must not be Unknown",
            ));
        }
        self.current_statuses = statuses;
        Ok(self)
    }

    /// Constrain the tags of the current entry (superset match)
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a tag has a blank name.
    pub fn with_tags(mut self, tags: Vec<Tag>) -> StreamResult<Self> {
        validate_tags(&tags)?;
        self.tags = tags;
        Ok(self)
    }

    /// Status constraint
    pub fn current_statuses(&self) -> &[HandlingStatus] {
        &self.current_statuses
    }

    /// Tag constraint
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

/// Latest entry per `(internal_record_id, concern)`
pub fn latest_entries(entries: &[HandlingEntry]) -> HashMap<(u64, &str), &HandlingEntry> {
    let mut latest: HashMap<(u64, &str), &HandlingEntry> = HashMap::new();
    for entry in entries {
        let key = (entry.internal_record_id, entry.concern.as_str());
        match latest.get(&key) {
            Some(existing)
                if existing.internal_handling_entry_id >= entry.internal_handling_entry_id => {}
            _ => {
                latest.insert(key, entry);
            }
        }
    }
    latest
}

/// Current status of one pair
pub fn current_status(entries: &[HandlingEntry], internal_record_id: u64, concern: &str) -> HandlingStatus {
    entries
        .iter()
        .filter(|e| e.internal_record_id == internal_record_id && e.concern == concern)
        .max_by_key(|e| e.internal_handling_entry_id)
        .map(|e| e.status)
        .unwrap_or(HandlingStatus::Unclaimed)
}

/// Whether the stream axis is currently `Blocked`
pub fn is_stream_blocked(entries: &[HandlingEntry]) -> bool {
    current_status(entries, BLOCKING_RECORD_ID, BLOCKING_CONCERN) == HandlingStatus::Blocked
}

/// Current status of a record for a concern, with where the record lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHandlingStatus {
    /// Locator holding the record
    pub locator: ResourceLocator,
    /// Record id
    pub internal_record_id: u64,
    /// Concern
    pub concern: String,
    /// Current status
    pub status: HandlingStatus,
}

/// Outcome of a claim attempt
///
/// Exactly one of: a record to process, the stream is blocked, or nothing
/// to do. A record and the blocked flag never appear together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TryHandleResultParts")]
pub struct TryHandleResult {
    record: Option<Box<ClaimedRecord>>,
    is_blocked: bool,
}

/// Wire form of [`TryHandleResult`], checked by [`TryHandleResult::new`]
#[derive(Deserialize)]
struct TryHandleResultParts {
    record: Option<ClaimedRecord>,
    is_blocked: bool,
}

impl TryFrom<TryHandleResultParts> for TryHandleResult {
    type Error = StreamError;

    fn try_from(parts: TryHandleResultParts) -> StreamResult<Self> {
        Self::new(parts.record, parts.is_blocked)
    }
}

/// A record handed to a claimant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimedRecord {
    /// Locator holding the record
    pub locator: ResourceLocator,
    /// The record to process
    pub record: StreamRecord,
}

impl TryHandleResult {
    /// Build a result from its parts
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when a record is present and `is_blocked` is set.
    pub fn new(record: Option<ClaimedRecord>, is_blocked: bool) -> StreamResult<Self> {
        if record.is_some() && is_blocked {
            return Err(StreamError::invalid_argument(
                "a claim result cannot carry a record while blocked",
            ));
        }
        Ok(Self {
            record: record.map(Box::new),
            is_blocked,
        })
    }

    /// A successful claim
    pub fn claimed(locator: ResourceLocator, record: StreamRecord) -> Self {
        Self {
            record: Some(Box::new(ClaimedRecord { locator, record })),
            is_blocked: false,
        }
    }

    /// The stream is blocked
    pub fn blocked() -> Self {
        Self {
            record: None,
            is_blocked: true,
        }
    }

    /// Nothing eligible
    pub fn nothing_to_handle() -> Self {
        Self {
            record: None,
            is_blocked: false,
        }
    }

    /// Claimed record, if any
    pub fn record(&self) -> Option<&ClaimedRecord> {
        self.record.as_deref()
    }

    /// Take the claimed record
    pub fn into_record(self) -> Option<ClaimedRecord> {
        self.record.map(|r| *r)
    }

    /// Whether the stream was blocked
    pub fn is_blocked(&self) -> bool {
        self.is_blocked
    }
}
