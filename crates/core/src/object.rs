//! Objects written to a stream

use chrono::{DateTime, FixedOffset};

use crate::identity::StreamType;
use crate::tags::Tag;

/// An object that knows how to describe itself to a stream
///
/// Every hook is optional. Objects without an id can only be written with
/// `ExistingRecordStrategy::None`; an object timestamp must carry a UTC
/// offset of zero or the write is rejected.
pub trait StreamObject: StreamType {
    /// Business identifier
    type Id: serde::Serialize + StreamType;

    /// Business identifier of this object
    fn id(&self) -> Option<Self::Id> {
        None
    }

    /// Tags to attach to the record
    fn tags(&self) -> Vec<Tag> {
        Vec::new()
    }

    /// Object-native timestamp
    fn object_timestamp(&self) -> Option<DateTime<FixedOffset>> {
        None
    }
}
