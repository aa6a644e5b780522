//! Backing engine and distributed mutex traits
//!
//! The record store and handling coordinator talk to storage only through
//! [`StandardStreamEngine::execute`]. Claim serialization goes through the
//! engine's [`DistributedMutex`], which may be process-local or shared
//! across processes depending on the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::error::StreamResult;
use crate::identity::ResourceLocator;

use super::op::StandardOp;
use super::output::StandardOutput;

/// A backing engine for one or more streams
///
/// Implementations must be thread-safe and apply each operation atomically.
/// Validation lives on [`StandardOp::validate`] so every backend rejects the
/// same inputs.
pub trait StandardStreamEngine: Send + Sync {
    /// Execute a single operation
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for malformed operations, `StreamNotFound`
    /// for writes against a missing locator, and `Engine` for backend
    /// failures.
    fn execute(&self, op: StandardOp) -> StreamResult<StandardOutput>;

    /// Mutex used to serialize claims against this engine
    fn mutex(&self) -> &dyn DistributedMutex;

    /// Human-readable backend name for logs
    fn backend_name(&self) -> &'static str {
        "unnamed"
    }
}

/// What a mutex acquisition serializes
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MutexScope {
    /// Stream the scope belongs to, usually its primary locator
    pub stream: String,
    /// Concern being claimed or transitioned
    pub concern: String,
}

impl MutexScope {
    /// Scope for one concern of one stream
    pub fn new(stream: impl Into<String>, concern: impl Into<String>) -> Self {
        Self {
            stream: stream.into(),
            concern: concern.into(),
        }
    }

    /// Scope for a concern on a specific locator
    pub fn for_locator(locator: &ResourceLocator, concern: impl Into<String>) -> Self {
        Self::new(locator.as_str(), concern)
    }
}

impl fmt::Display for MutexScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stream, self.concern)
    }
}

/// Proof of ownership of a held scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutexToken {
    /// Held scope
    pub scope: MutexScope,
    /// Unique owner of this acquisition
    pub owner: Uuid,
}

impl MutexToken {
    /// Token for a fresh acquisition of `scope`
    pub fn new(scope: MutexScope) -> Self {
        Self {
            scope,
            owner: Uuid::new_v4(),
        }
    }
}

/// Mutual exclusion keyed by [`MutexScope`]
pub trait DistributedMutex: Send + Sync {
    /// Acquire `scope`, waiting at most `timeout`
    ///
    /// # Errors
    ///
    /// Returns `MutexTimeout` if the scope is still held when the timeout
    /// elapses.
    fn try_acquire(&self, scope: &MutexScope, timeout: Duration) -> StreamResult<MutexToken>;

    /// Release a held scope
    ///
    /// # Errors
    ///
    /// Returns `Engine` if the token does not own the scope.
    fn release(&self, token: &MutexToken) -> StreamResult<()>;
}

/// Acquire `scope` and return a guard that releases it on drop
///
/// # Errors
///
/// Returns `MutexTimeout` if the scope could not be acquired in time.
pub fn lock<'a>(
    mutex: &'a dyn DistributedMutex,
    scope: &MutexScope,
    timeout: Duration,
) -> StreamResult<MutexGuard<'a>> {
    let token = mutex.try_acquire(scope, timeout)?;
    Ok(MutexGuard {
        mutex,
        token: Some(token),
    })
}

/// RAII guard over a held scope
pub struct MutexGuard<'a> {
    mutex: &'a dyn DistributedMutex,
    token: Option<MutexToken>,
}

impl MutexGuard<'_> {
    /// Scope held by this guard
    pub fn scope(&self) -> Option<&MutexScope> {
        self.token.as_ref().map(|t| &t.scope)
    }

    /// Release now and surface the error instead of logging it
    ///
    /// # Errors
    ///
    /// Returns whatever the mutex reports on release.
    pub fn unlock(mut self) -> StreamResult<()> {
        match self.token.take() {
            Some(token) => self.mutex.release(&token),
            None => Ok(()),
        }
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            if let Err(e) = self.mutex.release(&token) {
                warn!(target: "rstream::mutex", scope = %token.scope, error = %e, "Failed to release mutex");
            }
        }
    }
}

/// A mutex that never contends
///
/// Used by engines that keep no state, where there is nothing to serialize.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMutex;

impl DistributedMutex for NoopMutex {
    fn try_acquire(&self, scope: &MutexScope, _timeout: Duration) -> StreamResult<MutexToken> {
        Ok(MutexToken::new(scope.clone()))
    }

    fn release(&self, _token: &MutexToken) -> StreamResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StreamError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingMutex {
        released: Mutex<Vec<Uuid>>,
        fail_release: bool,
    }

    impl DistributedMutex for CountingMutex {
        fn try_acquire(&self, scope: &MutexScope, _timeout: Duration) -> StreamResult<MutexToken> {
            Ok(MutexToken::new(scope.clone()))
        }

        fn release(&self, token: &MutexToken) -> StreamResult<()> {
            self.released.lock().unwrap().push(token.owner);
            if self.fail_release {
                return Err(StreamError::engine("release failed"));
            }
            Ok(())
        }
    }

    #[test]
    fn guard_releases_on_drop() {
        let mutex = CountingMutex::default();
        {
            let guard = lock(&mutex, &MutexScope::new("orders", "export"), Duration::from_secs(1)).unwrap();
            assert_eq!(guard.scope().unwrap().to_string(), "orders/export");
        }
        assert_eq!(mutex.released.lock().unwrap().len(), 1);
    }

    #[test]
    fn explicit_unlock_releases_once() {
        let mutex = CountingMutex {
            fail_release: true,
            ..Default::default()
        };
        let guard = lock(&mutex, &MutexScope::new("orders", "export"), Duration::from_secs(1)).unwrap();
        assert!(guard.unlock().is_err());
        assert_eq!(mutex.released.lock().unwrap().len(), 1);
    }

    #[test]
    fn tokens_have_distinct_owners() {
        let scope = MutexScope::new("s", "c");
        let a = NoopMutex.try_acquire(&scope, Duration::ZERO).unwrap();
        let b = NoopMutex.try_acquire(&scope, Duration::ZERO).unwrap();
        assert_ne!(a.owner, b.owner);
        assert_eq!(a.scope, b.scope);
    }
}
