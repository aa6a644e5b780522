//! Stream records
//!
//! A `StreamRecord` is immutable once written. The serializer descriptor is
//! carried on both the metadata and the payload so that metadata-only and
//! payload-only read paths can each interpret what they return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StreamResult;
use crate::identity::{ResourceLocator, StringSerializedIdentifier, VersionedType};
use crate::tags::{validate_tags, Tag};

/// Codec family used for a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializationKind {
    /// JSON text via serde_json
    Json,
    /// MessagePack bytes via rmp-serde
    MessagePack,
}

/// Whether a payload is text or bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializationFormat {
    /// UTF-8 text
    String,
    /// Raw bytes
    Binary,
}

/// Descriptor identifying how a payload was serialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializerRepresentation {
    /// Codec family
    pub kind: SerializationKind,
    /// Text or bytes
    pub format: SerializationFormat,
}

impl SerializerRepresentation {
    /// JSON text
    pub const JSON: SerializerRepresentation = SerializerRepresentation {
        kind: SerializationKind::Json,
        format: SerializationFormat::String,
    };

    /// MessagePack bytes
    pub const MESSAGE_PACK: SerializerRepresentation = SerializerRepresentation {
        kind: SerializationKind::MessagePack,
        format: SerializationFormat::Binary,
    };
}

/// Opaque serialized bytes or text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SerializedPayload {
    /// Text payload
    String(String),
    /// Binary payload
    Binary(Vec<u8>),
}

impl SerializedPayload {
    /// Size of the payload in bytes
    pub fn len(&self) -> usize {
        match self {
            SerializedPayload::String(s) => s.len(),
            SerializedPayload::Binary(b) => b.len(),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A payload together with its type and serializer descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribedSerialization {
    /// Type of the serialized object
    pub payload_type: VersionedType,
    /// Serializer that produced the payload
    pub serializer: SerializerRepresentation,
    /// Serialized object
    pub payload: SerializedPayload,
}

/// Everything about a record except its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecordMetadata {
    /// Business identifier, if the object has one
    pub string_serialized_id: Option<StringSerializedIdentifier>,
    /// Type of the stored object
    pub object_type: VersionedType,
    /// Tags attached at write time
    pub tags: Vec<Tag>,
    /// Serializer that produced the payload
    pub serializer: SerializerRepresentation,
    /// When the record was written
    pub timestamp_utc: DateTime<Utc>,
    /// Object-native timestamp, if the object has one
    pub object_timestamp_utc: Option<DateTime<Utc>>,
}

impl StreamRecordMetadata {
    /// Build metadata, validating tags
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a tag has a blank name.
    pub fn new(
        string_serialized_id: Option<StringSerializedIdentifier>,
        object_type: VersionedType,
        tags: Vec<Tag>,
        serializer: SerializerRepresentation,
        timestamp_utc: DateTime<Utc>,
        object_timestamp_utc: Option<DateTime<Utc>>,
    ) -> StreamResult<Self> {
        validate_tags(&tags)?;
        Ok(Self {
            string_serialized_id,
            object_type,
            tags,
            serializer,
            timestamp_utc,
            object_timestamp_utc,
        })
    }
}

/// An immutable stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Locator-scoped id assigned by the backing engine
    pub internal_record_id: u64,
    /// Record metadata
    pub metadata: StreamRecordMetadata,
    /// Record payload
    pub payload: DescribedSerialization,
}

/// A record's metadata together with where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedMetadata {
    /// Locator holding the record
    pub locator: ResourceLocator,
    /// Locator-scoped id
    pub internal_record_id: u64,
    /// Record metadata
    pub metadata: StreamRecordMetadata,
}

/// A record together with where it lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatedRecord {
    /// Locator holding the record
    pub locator: ResourceLocator,
    /// The record
    pub record: StreamRecord,
}

impl LocatedRecord {
    /// Drop the payload
    pub fn into_metadata(self) -> LocatedMetadata {
        LocatedMetadata {
            locator: self.locator,
            internal_record_id: self.record.internal_record_id,
            metadata: self.record.metadata,
        }
    }
}
