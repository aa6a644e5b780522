//! Identity and type model
//!
//! - `TypeRepresentation`: a named type, optionally carrying a version
//! - `VersionedType`: the same type expressed with and without its version
//! - `StringSerializedIdentifier`: a business id serialized to a string plus its type
//! - `ResourceLocator`: opaque handle for a physical partition of a stream
//! - `StreamType`: how Rust types describe themselves to the stream

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{require_non_blank, StreamError, StreamResult};
use crate::strategy::VersionMatchStrategy;

/// A named type, with an optional version
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeRepresentation {
    /// Fully qualified type name, e.g. `orders::Order`
    pub name: String,
    /// Version of the type, absent in version-erased form
    pub version: Option<String>,
}

impl TypeRepresentation {
    /// Type with an explicit version
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    /// Type with no version information
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Copy of this type with the version erased
    pub fn remove_version(&self) -> Self {
        Self {
            name: self.name.clone(),
            version: None,
        }
    }
}

impl fmt::Display for TypeRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A type expressed both with its version and version-erased
///
/// ## Invariants
///
/// - `with_version` carries a version
/// - `without_version` equals `with_version.remove_version()`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "VersionedTypeParts")]
pub struct VersionedType {
    with_version: TypeRepresentation,
    without_version: TypeRepresentation,
}

/// Wire form of [`VersionedType`], checked by [`VersionedType::from_parts`]
#[derive(Deserialize)]
struct VersionedTypeParts {
    with_version: TypeRepresentation,
    without_version: TypeRepresentation,
}

impl TryFrom<VersionedTypeParts> for VersionedType {
    type Error = StreamError;

    fn try_from(parts: VersionedTypeParts) -> StreamResult<Self> {
        Self::from_parts(parts.with_version, parts.without_version)
    }
}

impl VersionedType {
    /// Build from the exact form, deriving the version-erased form
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is blank or no version is present.
    pub fn new(with_version: TypeRepresentation) -> StreamResult<Self> {
        require_non_blank(&with_version.name, "type name")?;
        match &with_version.version {
            Some(v) if !v.trim().is_empty() => {}
            _ => {
                return Err(StreamError::invalid_argument(format!(
                    "type '{}' does not carry version information",
                    with_version.name
                )))
            }
        }
        let without_version = with_version.remove_version();
        Ok(Self {
            with_version,
            without_version,
        })
    }

    /// Build from both forms supplied independently
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the forms are inconsistent.
    pub fn from_parts(
        with_version: TypeRepresentation,
        without_version: TypeRepresentation,
    ) -> StreamResult<Self> {
        let versioned = Self::new(with_version)?;
        if versioned.without_version != without_version {
            return Err(StreamError::invalid_argument(format!(
                "version-erased type '{}' is inconsistent with '{}'",
                without_version, versioned.with_version
            )));
        }
        Ok(versioned)
    }

    /// Exact form
    pub fn with_version(&self) -> &TypeRepresentation {
        &self.with_version
    }

    /// Version-erased form
    pub fn without_version(&self) -> &TypeRepresentation {
        &self.without_version
    }

    /// Whether this type matches a query type under the strategy
    ///
    /// Under `Any`, a query type may be given with or without a version.
    pub fn matches(
        &self,
        query: &TypeRepresentation,
        strategy: VersionMatchStrategy,
    ) -> StreamResult<bool> {
        match strategy {
            VersionMatchStrategy::Any => Ok(self.without_version.name == query.name),
            VersionMatchStrategy::SpecifiedVersion => Ok(&self.with_version == query),
            VersionMatchStrategy::Unknown => Err(StreamError::invalid_argument(
                "version match strategy must not be Unknown",
            )),
        }
    }
}

impl fmt::Display for VersionedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with_version.fmt(f)
    }
}

/// A business identifier serialized to a string, with the identifier's type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StringSerializedIdentifier {
    /// Serialized identifier
    pub id: String,
    /// Type of the identifier
    pub identifier_type: VersionedType,
}

impl StringSerializedIdentifier {
    /// Pair a serialized id with its type
    pub fn new(id: impl Into<String>, identifier_type: VersionedType) -> Self {
        Self {
            id: id.into(),
            identifier_type,
        }
    }

    /// Whether two identifiers are the same under the strategy
    ///
    /// Identifiers are comparable only when their types match.
    pub fn matches(
        &self,
        other: &StringSerializedIdentifier,
        strategy: VersionMatchStrategy,
    ) -> StreamResult<bool> {
        if self.id != other.id {
            // still validate the strategy so Unknown never slips through
            strategy.validate()?;
            return Ok(false);
        }
        self.identifier_type
            .matches(other.identifier_type.with_version(), strategy)
    }
}

impl fmt::Display for StringSerializedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.identifier_type)
    }
}

/// Opaque handle identifying a physical partition of a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct ResourceLocator(String);

impl ResourceLocator {
    /// Create a locator
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is blank.
    pub fn new(name: impl Into<String>) -> StreamResult<Self> {
        let name = name.into();
        require_non_blank(&name, "resource locator")?;
        Ok(Self(name))
    }

    /// Locator name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceLocator {
    type Error = StreamError;

    fn try_from(name: String) -> StreamResult<Self> {
        Self::new(name)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Types that can be stored in, or identify records of, a stream
///
/// Implementors declare a versioned type. The runtime type defaults to the
/// declared one; dynamically shaped values may report none.
pub trait StreamType {
    /// Declared type
    fn type_representation() -> TypeRepresentation;

    /// Type of this particular value, if it can be determined
    fn runtime_type_representation(&self) -> Option<TypeRepresentation> {
        Some(Self::type_representation())
    }
}

/// Implement [`StreamType`] for a type with a fixed name and version.
///
/// ```
/// use rstream_core::{impl_stream_type, StreamType};
///
/// struct Order;
/// impl_stream_type!(Order, "orders::Order", "1");
/// assert_eq!(Order::type_representation().to_string(), "orders::Order@1");
/// ```
#[macro_export]
macro_rules! impl_stream_type {
    ($ty:ty, $name:expr, $version:expr) => {
        impl $crate::StreamType for $ty {
            fn type_representation() -> $crate::TypeRepresentation {
                $crate::TypeRepresentation::new($name, $version)
            }
        }
    };
}

impl_stream_type!(String, "std::string::String", "1");
impl_stream_type!(u64, "u64", "1");
impl_stream_type!(i64, "i64", "1");
impl_stream_type!(u32, "u32", "1");
impl_stream_type!(i32, "i32", "1");
impl_stream_type!(uuid::Uuid, "uuid::Uuid", "1");

impl StreamType for serde_json::Value {
    fn type_representation() -> TypeRepresentation {
        TypeRepresentation::new("serde_json::Value", "1")
    }

    fn runtime_type_representation(&self) -> Option<TypeRepresentation> {
        None
    }
}
