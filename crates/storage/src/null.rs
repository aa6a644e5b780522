//! Reference engine that stores nothing
//!
//! Accepts every valid operation and answers with the policy-correct empty
//! result: reads are empty, writes assign nothing, the stream always
//! reports as absent. Invalid operations fail exactly as they would on a
//! real engine, which makes this engine useful for contract tests and for
//! exercising callers without storage.

use rstream_core::{
    DistributedMutex, NoopMutex, PutRecordResult, StandardOp, StandardOutput, StandardStreamEngine,
    StreamResult,
};
use tracing::trace;

/// No-op [`StandardStreamEngine`]
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStreamEngine {
    mutex: NoopMutex,
}

impl NullStreamEngine {
    /// Create a null engine
    pub fn new() -> Self {
        Self::default()
    }
}

impl StandardStreamEngine for NullStreamEngine {
    fn execute(&self, op: StandardOp) -> StreamResult<StandardOutput> {
        op.validate()?;
        trace!(target: "rstream::engine", op = op.name(), locator = %op.locator(), "Null engine executed");
        let output = match op {
            StandardOp::CreateStream { .. } | StandardOp::DeleteStream { .. } => StandardOutput::Unit,
            StandardOp::StreamExists { .. } => StandardOutput::Bool(false),
            StandardOp::PutRecord { .. } => StandardOutput::Put(PutRecordResult::default()),
            StandardOp::GetRecords { .. } => StandardOutput::Records(Vec::new()),
            StandardOp::GetMetadatas { .. } => StandardOutput::Metadatas(Vec::new()),
            StandardOp::GetLatestRecord { .. } => StandardOutput::MaybeRecord(None),
            StandardOp::GetInternalRecordIds { .. } => StandardOutput::RecordIds(Vec::new()),
            StandardOp::GetDistinctIds { .. } => StandardOutput::Identifiers(Vec::new()),
            StandardOp::PruneBeforeInternalRecordId { .. } => StandardOutput::Count(0),
            StandardOp::GetHandlingEntries { .. } => StandardOutput::HandlingEntries(Vec::new()),
            StandardOp::PutHandlingEntries { .. } => StandardOutput::HandlingEntryIds(Vec::new()),
        };
        Ok(output)
    }

    fn mutex(&self) -> &dyn DistributedMutex {
        &self.mutex
    }

    fn backend_name(&self) -> &'static str {
        "null"
    }
}
