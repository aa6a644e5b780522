//! Stream lifecycle
//!
//! Create and delete apply to every locator of the stream, in resolver
//! order. A `Throw` strategy fails on the first locator that violates it;
//! locators already handled stay as they are.

use rstream_core::{
    ExistingStreamEncounteredStrategy, ExistingStreamNotEncounteredStrategy, StandardOp, StreamResult,
};
use tracing::info;

use crate::stream::Stream;

impl Stream {
    /// Create the stream's storage on every locator
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` and `StreamAlreadyExists`
    /// under `Throw` when storage is already present.
    pub fn create_stream(&self, strategy: ExistingStreamEncounteredStrategy) -> StreamResult<()> {
        strategy.validate()?;
        for locator in self.locators() {
            self.execute(StandardOp::CreateStream {
                locator: locator.clone(),
                strategy,
            })?
            .into_unit("CreateStream")?;
        }
        info!(
            target: "rstream::engine",
            stream = %self.name(),
            locators = self.locators().len(),
            %strategy,
            "Created stream"
        );
        Ok(())
    }

    /// Delete the stream's storage, records and handling entries on every locator
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `Unknown` and `StreamNotFound` under
    /// `Throw` when storage is missing.
    pub fn delete_stream(&self, strategy: ExistingStreamNotEncounteredStrategy) -> StreamResult<()> {
        strategy.validate()?;
        for locator in self.locators() {
            self.execute(StandardOp::DeleteStream {
                locator: locator.clone(),
                strategy,
            })?
            .into_unit("DeleteStream")?;
        }
        info!(
            target: "rstream::engine",
            stream = %self.name(),
            locators = self.locators().len(),
            %strategy,
            "Deleted stream"
        );
        Ok(())
    }

    /// Whether storage exists on every locator
    pub fn stream_exists(&self) -> StreamResult<bool> {
        for locator in self.locators() {
            let exists = self
                .execute(StandardOp::StreamExists {
                    locator: locator.clone(),
                })?
                .into_bool("StreamExists")?;
            if !exists {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines_with(&self, needle: &str) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .filter(|line| line.contains(needle))
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn test_lifecycle_logs_under_engine_target() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_target(true)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let stream = Stream::in_memory("audit").unwrap();
            stream.create_stream(ExistingStreamEncounteredStrategy::Throw).unwrap();
            stream.delete_stream(ExistingStreamNotEncounteredStrategy::Throw).unwrap();
        });

        let lifecycle = logs.lines_with("stream=audit");
        assert_eq!(lifecycle.len(), 2);
        assert!(lifecycle.iter().all(|line| line.contains("rstream::engine")));
        assert!(lifecycle[0].contains("Created stream"));
        assert!(lifecycle[1].contains("Deleted stream"));
    }

    #[test]
    fn test_lifecycle_covers_every_partition() {
        let stream = Stream::builder("orders").partitions(3).build().unwrap();
        assert!(!stream.stream_exists().unwrap());

        stream.create_stream(ExistingStreamEncounteredStrategy::Throw).unwrap();
        assert!(stream.stream_exists().unwrap());
        stream.create_stream(ExistingStreamEncounteredStrategy::Skip).unwrap();
        assert!(stream.create_stream(ExistingStreamEncounteredStrategy::Throw).is_err());

        stream.delete_stream(ExistingStreamNotEncounteredStrategy::Throw).unwrap();
        assert!(!stream.stream_exists().unwrap());
        stream.delete_stream(ExistingStreamNotEncounteredStrategy::Skip).unwrap();
        assert!(stream.delete_stream(ExistingStreamNotEncounteredStrategy::Throw).unwrap_err().is_not_found());
    }

    #[test]
    fn test_unknown_strategies_rejected() {
        let stream = Stream::in_memory("orders").unwrap();
        assert!(stream
            .create_stream(ExistingStreamEncounteredStrategy::Unknown)
            .unwrap_err()
            .is_invalid_argument());
        assert!(stream
            .delete_stream(ExistingStreamNotEncounteredStrategy::Unknown)
            .unwrap_err()
            .is_invalid_argument());
    }
}
