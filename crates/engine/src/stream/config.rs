//! Stream configuration via `rstream.toml`
//!
//! On first start a default `rstream.toml` can be written next to the
//! application. To change settings, edit the file and restart.

use rstream_core::{require_non_blank, PayloadSerializer, StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "rstream.toml";

fn default_name() -> String {
    "default".to_string()
}

fn default_partitions() -> u32 {
    1
}

fn default_serializer() -> String {
    "json".to_string()
}

fn default_mutex_timeout_ms() -> u64 {
    5000
}

/// Stream configuration loaded from `rstream.toml`.
///
/// # Example
///
/// ```toml
/// name = "orders"
/// partitions = 4
/// serializer = "msgpack"
/// mutex_timeout_ms = 5000
/// claim_lease_ms = 60000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Stream name; also the base of every resource locator name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Number of resource locators records are partitioned across.
    #[serde(default = "default_partitions")]
    pub partitions: u32,
    /// Payload serializer: `"json"` or `"msgpack"`.
    #[serde(default = "default_serializer")]
    pub serializer: String,
    /// How long a claim waits for the distributed mutex.
    #[serde(default = "default_mutex_timeout_ms")]
    pub mutex_timeout_ms: u64,
    /// Age after which a `Running` claim counts as abandoned. Absent
    /// disables lease expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_lease_ms: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            partitions: default_partitions(),
            serializer: default_serializer(),
            mutex_timeout_ms: default_mutex_timeout_ms(),
            claim_lease_ms: None,
        }
    }
}

impl StreamConfig {
    /// Default config for a named stream
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse the serializer string into a `PayloadSerializer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"json"` or `"msgpack"`.
    pub fn payload_serializer(&self) -> StreamResult<PayloadSerializer> {
        match self.serializer.as_str() {
            "json" => Ok(PayloadSerializer::json()),
            "msgpack" => Ok(PayloadSerializer::message_pack()),
            other => Err(StreamError::invalid_argument(format!(
                "Invalid serializer '{}' in {}. Expected \"json\" or \"msgpack\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Mutex acquisition timeout
    pub fn mutex_timeout(&self) -> Duration {
        Duration::from_millis(self.mutex_timeout_ms)
    }

    /// Claim lease, if enabled
    pub fn claim_lease(&self) -> Option<Duration> {
        self.claim_lease_ms.map(Duration::from_millis)
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank name, zero partitions or an
    /// unknown serializer.
    pub fn validate(&self) -> StreamResult<()> {
        require_non_blank(&self.name, "stream name")?;
        if self.partitions == 0 {
            return Err(StreamError::invalid_argument(format!(
                "partitions must be at least 1 in {}",
                CONFIG_FILE_NAME
            )));
        }
        self.payload_serializer()?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# rstream configuration
#
# Stream name (default: "default")
name = "default"

# Number of resource locators records are spread across (default: 1).
# Records with the same business id always land on the same locator.
partitions = 1

# Payload serializer: "json" (default) or "msgpack"
serializer = "json"

# How long a claim waits for the distributed mutex, in milliseconds
mutex_timeout_ms = 5000

# Age after which a Running claim is treated as abandoned and canceled.
# Leave unset to keep abandoned claims Running until canceled explicitly.
# claim_lease_ms = 60000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> StreamResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StreamError::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StreamConfig = toml::from_str(&content).map_err(|e| {
            StreamError::invalid_argument(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StreamResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                StreamError::config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StreamResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| StreamError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            StreamError::config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
