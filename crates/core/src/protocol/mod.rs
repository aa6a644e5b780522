//! Protocol surface between the stream and its backing engine

mod engine;
mod op;
mod output;
mod put;

pub use engine::{lock, DistributedMutex, MutexGuard, MutexScope, MutexToken, NoopMutex, StandardStreamEngine};
pub use op::StandardOp;
pub use output::{PutRecordResult, StandardOutput};
pub use put::{plan_put, PutPlan};
