//! Process-local claim mutex
//!
//! Serializes claims for a `(stream, concern)` scope within one process.
//! Waiters block on a condition variable until the holder releases or their
//! timeout elapses. Backends shared across processes need their own
//! [`DistributedMutex`] implementation; this one is enough for in-memory
//! engines and tests.
//!
//! ## Ownership
//!
//! Every acquisition gets a fresh token owner. Release checks the owner so
//! a stale token can never free a scope someone else now holds.

use parking_lot::{Condvar, Mutex};
use rstream_core::{DistributedMutex, MutexScope, MutexToken, StreamError, StreamResult};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Counters for observing contention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutexStats {
    /// Successful acquisitions
    pub acquired: u64,
    /// Acquisitions that gave up after their timeout
    pub timed_out: u64,
    /// Successful releases
    pub released: u64,
}

/// In-process [`DistributedMutex`]
pub struct LocalMutex {
    /// Current holder of each held scope
    held: Mutex<FxHashMap<MutexScope, MutexToken>>,
    /// Signalled on every release
    released_signal: Condvar,
    acquired: AtomicU64,
    timed_out: AtomicU64,
    released: AtomicU64,
}

impl LocalMutex {
    /// Create a mutex with no scopes held
    pub fn new() -> Self {
        LocalMutex {
            held: Mutex::new(FxHashMap::default()),
            released_signal: Condvar::new(),
            acquired: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Whether `scope` is currently held
    pub fn is_held(&self, scope: &MutexScope) -> bool {
        self.held.lock().contains_key(scope)
    }

    /// Number of scopes currently held
    pub fn held_count(&self) -> usize {
        self.held.lock().len()
    }

    /// Snapshot of the contention counters
    pub fn stats(&self) -> MutexStats {
        MutexStats {
            acquired: self.acquired.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }
}

impl Default for LocalMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributedMutex for LocalMutex {
    fn try_acquire(&self, scope: &MutexScope, timeout: Duration) -> StreamResult<MutexToken> {
        let deadline = Instant::now() + timeout;
        let mut held = self.held.lock();

        while held.contains_key(scope) {
            if self.released_signal.wait_until(&mut held, deadline).timed_out() && held.contains_key(scope) {
                self.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(
                    target: "rstream::mutex",
                    scope = %scope,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for mutex"
                );
                return Err(StreamError::MutexTimeout {
                    scope: scope.to_string(),
                });
            }
        }

        let token = MutexToken::new(scope.clone());
        held.insert(scope.clone(), token.clone());
        self.acquired.fetch_add(1, Ordering::Relaxed);
        debug!(target: "rstream::mutex", scope = %scope, owner = %token.owner, "Acquired mutex");
        Ok(token)
    }

    fn release(&self, token: &MutexToken) -> StreamResult<()> {
        let mut held = self.held.lock();
        match held.get(&token.scope) {
            Some(current) if current.owner == token.owner => {
                held.remove(&token.scope);
            }
            Some(_) => {
                return Err(StreamError::engine(format!(
                    "mutex {} is held by another owner",
                    token.scope
                )))
            }
            None => {
                return Err(StreamError::engine(format!("mutex {} is not held", token.scope)));
            }
        }
        drop(held);

        self.released.fetch_add(1, Ordering::Relaxed);
        self.released_signal.notify_all();
        debug!(target: "rstream::mutex", scope = %token.scope, owner = %token.owner, "Released mutex");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(concern: &str) -> MutexScope {
        MutexScope::new("orders", concern)
    }

    #[test]
    fn test_acquire_and_release() {
        let mutex = LocalMutex::new();
        let token = mutex.try_acquire(&scope("export"), Duration::from_millis(10)).unwrap();
        assert!(mutex.is_held(&scope("export")));
        mutex.release(&token).unwrap();
        assert!(!mutex.is_held(&scope("export")));
        assert_eq!(
            mutex.stats(),
            MutexStats {
                acquired: 1,
                timed_out: 0,
                released: 1
            }
        );
    }

    #[test]
    fn test_held_scope_times_out() {
        let mutex = LocalMutex::new();
        let _token = mutex.try_acquire(&scope("export"), Duration::ZERO).unwrap();
        let err = mutex.try_acquire(&scope("export"), Duration::from_millis(20)).unwrap_err();
        assert_eq!(
            err,
            StreamError::MutexTimeout {
                scope: "orders/export".into()
            }
        );
        assert_eq!(mutex.stats().timed_out, 1);
    }

    #[test]
    fn test_scopes_are_independent() {
        let mutex = LocalMutex::new();
        let _a = mutex.try_acquire(&scope("export"), Duration::ZERO).unwrap();
        let _b = mutex.try_acquire(&scope("billing"), Duration::ZERO).unwrap();
        assert_eq!(mutex.held_count(), 2);
    }

    #[test]
    fn test_stale_token_cannot_release() {
        let mutex = LocalMutex::new();
        let first = mutex.try_acquire(&scope("export"), Duration::ZERO).unwrap();
        mutex.release(&first).unwrap();
        let _second = mutex.try_acquire(&scope("export"), Duration::ZERO).unwrap();

        assert!(mutex.release(&first).is_err());
        assert!(mutex.is_held(&scope("export")));
    }

    #[test]
    fn test_release_unheld_scope_fails() {
        let mutex = LocalMutex::new();
        let token = MutexToken::new(scope("export"));
        assert!(matches!(mutex.release(&token), Err(StreamError::Engine { .. })));
    }
}
