//! Core types and traits for rstream
//!
//! This crate defines the backend-agnostic pieces of a record stream:
//! - Identity: TypeRepresentation, VersionedType, StringSerializedIdentifier, ResourceLocator
//! - Records: StreamRecord, StreamRecordMetadata, DescribedSerialization
//! - Strategies: every caller-selected policy enum, with `Unknown` sentinels
//! - Filter engine: RecordFilter matching, pre-selection and ordering
//! - Handling model: HandlingStatus, HandlingEntry, the transition table
//! - Protocol: StandardOp, StandardOutput, StandardStreamEngine, DistributedMutex
//! - Serializers: JSON and MessagePack payload codecs
//! - Error: StreamError

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod filter;
pub mod handling;
pub mod identity;
pub mod object;
pub mod protocol;
pub mod record;
pub mod serializer;
pub mod strategy;
pub mod tags;
pub mod timestamp;

pub use error::{require_non_blank, StreamError, StreamResult};
pub use filter::{
    filter_records, handling_matches, order_records, record_matches, select_records_to_filter,
    FilterCandidate, RecordFilter, RecordFilterBuilder, RecordsToFilterCriteria,
};
pub use handling::{
    current_status, is_stream_blocked, latest_entries, validate_concern, ClaimedRecord, HandlingEntry,
    HandlingFilter, HandlingStatus, NewHandlingEntry, RecordHandlingStatus, TryHandleResult, BLOCKING_CONCERN,
    BLOCKING_RECORD_ID,
};
pub use identity::{ResourceLocator, StreamType, StringSerializedIdentifier, TypeRepresentation, VersionedType};
pub use object::StreamObject;
pub use protocol::{
    lock, plan_put, DistributedMutex, MutexGuard, MutexScope, MutexToken, NoopMutex, PutPlan,
    PutRecordResult, StandardOp, StandardOutput, StandardStreamEngine,
};
pub use record::{
    DescribedSerialization, LocatedMetadata, LocatedRecord, SerializationFormat, SerializationKind,
    SerializedPayload, SerializerRepresentation, StreamRecord, StreamRecordMetadata,
};
pub use serializer::{deserialize_id, serialize_id, PayloadSerializer};
pub use strategy::{
    ExistingRecordStrategy, ExistingStreamEncounteredStrategy, ExistingStreamNotEncounteredStrategy,
    OrderRecordsBy, RecordNotFoundStrategy, RecordsToFilterSelectionStrategy, TagMatchStrategy,
    TypeSelectionStrategy, VersionMatchStrategy,
};
pub use tags::{collect_tags, tags_match, validate_tags, Tag};
pub use timestamp::{parse_utc, require_utc};
