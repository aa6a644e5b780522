//! Payload and identifier serialization
//!
//! Payloads go through the stream's configured codec. Identifiers are
//! always compact JSON so that the same id compares equal regardless of
//! which codec wrote the payload.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StreamError, StreamResult};
use crate::identity::{StringSerializedIdentifier, TypeRepresentation, VersionedType};
use crate::record::{DescribedSerialization, SerializationKind, SerializedPayload, SerializerRepresentation};
use crate::StreamType;

/// Codec for record payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadSerializer {
    representation: SerializerRepresentation,
}

impl PayloadSerializer {
    /// JSON text payloads
    pub const fn json() -> Self {
        Self {
            representation: SerializerRepresentation::JSON,
        }
    }

    /// MessagePack binary payloads
    pub const fn message_pack() -> Self {
        Self {
            representation: SerializerRepresentation::MESSAGE_PACK,
        }
    }

    /// Serializer for a descriptor
    pub fn for_representation(representation: SerializerRepresentation) -> StreamResult<Self> {
        match representation {
            SerializerRepresentation::JSON => Ok(Self::json()),
            SerializerRepresentation::MESSAGE_PACK => Ok(Self::message_pack()),
            other => Err(StreamError::serialization(format!(
                "unsupported serializer {:?}/{:?}",
                other.kind, other.format
            ))),
        }
    }

    /// Descriptor stamped on records written by this serializer
    pub fn representation(&self) -> SerializerRepresentation {
        self.representation
    }

    /// Serialize a value
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the codec rejects the value.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> StreamResult<SerializedPayload> {
        match self.representation.kind {
            SerializationKind::Json => Ok(SerializedPayload::String(serde_json::to_string(value)?)),
            SerializationKind::MessagePack => Ok(SerializedPayload::Binary(rmp_serde::to_vec_named(value)?)),
        }
    }

    /// Serialize a value with its type and this serializer's descriptor
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the codec rejects the value.
    pub fn describe<T: Serialize + ?Sized>(
        &self,
        value: &T,
        payload_type: VersionedType,
    ) -> StreamResult<DescribedSerialization> {
        Ok(DescribedSerialization {
            payload_type,
            serializer: self.representation,
            payload: self.serialize(value)?,
        })
    }

    /// Deserialize a payload written by any supported serializer
    ///
    /// The payload's own descriptor picks the codec, so streams can change
    /// serializer without orphaning older records.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the payload does not decode into `T`.
    pub fn deserialize<T: DeserializeOwned>(described: &DescribedSerialization) -> StreamResult<T> {
        match (&described.serializer.kind, &described.payload) {
            (SerializationKind::Json, SerializedPayload::String(text)) => Ok(serde_json::from_str(text)?),
            (SerializationKind::MessagePack, SerializedPayload::Binary(bytes)) => Ok(rmp_serde::from_slice(bytes)?),
            (kind, _) => Err(StreamError::serialization(format!(
                "payload shape does not match serializer {:?}",
                kind
            ))),
        }
    }
}

impl Default for PayloadSerializer {
    fn default() -> Self {
        Self::json()
    }
}

/// Serialize a business id into its stored form
///
/// # Errors
///
/// Returns `InvalidArgument` for a blank identifier type and
/// `Serialization` if the id cannot be encoded.
pub fn serialize_id<TId: Serialize + StreamType>(id: &TId) -> StreamResult<StringSerializedIdentifier> {
    let identifier_type = id_type::<TId>(id)?;
    Ok(StringSerializedIdentifier::new(
        serde_json::to_string(id)?,
        identifier_type,
    ))
}

/// Decode a stored business id
///
/// # Errors
///
/// Returns `Serialization` if the text does not decode into `TId`.
pub fn deserialize_id<TId: DeserializeOwned>(id: &StringSerializedIdentifier) -> StreamResult<TId> {
    Ok(serde_json::from_str(&id.id)?)
}

fn id_type<TId: StreamType>(id: &TId) -> StreamResult<VersionedType> {
    let repr: TypeRepresentation = id
        .runtime_type_representation()
        .unwrap_or_else(TId::type_representation);
    VersionedType::new(repr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: String,
        amount: u64,
    }

    fn order() -> Order {
        Order {
            id: "o-1".into(),
            amount: 42,
        }
    }

    fn order_type() -> VersionedType {
        VersionedType::new(TypeRepresentation::new("Order", "1")).unwrap()
    }

    #[test]
    fn json_payloads_are_text() {
        let described = PayloadSerializer::json().describe(&order(), order_type()).unwrap();
        assert!(matches!(described.payload, SerializedPayload::String(_)));
        let back: Order = PayloadSerializer::deserialize(&described).unwrap();
        assert_eq!(back, order());
    }

    #[test]
    fn message_pack_payloads_are_binary() {
        let described = PayloadSerializer::message_pack().describe(&order(), order_type()).unwrap();
        assert!(matches!(described.payload, SerializedPayload::Binary(_)));
        assert_eq!(described.serializer, SerializerRepresentation::MESSAGE_PACK);
        let back: Order = PayloadSerializer::deserialize(&described).unwrap();
        assert_eq!(back, order());
    }

    #[test]
    fn mismatched_payload_shape_is_rejected() {
        let described = DescribedSerialization {
            payload_type: order_type(),
            serializer: SerializerRepresentation::JSON,
            payload: SerializedPayload::Binary(vec![1, 2, 3]),
        };
        let err = PayloadSerializer::deserialize::<Order>(&described).unwrap_err();
        assert!(matches!(err, StreamError::Serialization { .. }));
    }

    #[test]
    fn ids_are_compact_json() {
        let id = serialize_id(&"abc".to_string()).unwrap();
        assert_eq!(id.id, "\"abc\"");
        assert_eq!(id.identifier_type.with_version().name, "std::string::String");
        assert_eq!(serialize_id(&7u64).unwrap().id, "7");
        let back: String = deserialize_id(&id).unwrap();
        assert_eq!(back, "abc");
    }
}
