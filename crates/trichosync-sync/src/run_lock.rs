//! Run lease for the sync engine.
//!
//! At most one sync run may be in flight per process. The lease carries a
//! TTL so a run that died without releasing (process kill mid-await)
//! cannot block sync forever; a later run takes the expired lease over.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

/// Default lease TTL; generous against the per-request timeouts below it.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(300);

/// A non-blocking run lease with TTL takeover.
#[derive(Debug, Clone)]
pub struct RunLock {
    lease: Arc<Mutex<Option<Instant>>>,
    ttl: Duration,
}

impl Default for RunLock {
    fn default() -> Self {
        Self::new(DEFAULT_LEASE_TTL)
    }
}

impl RunLock {
    /// Creates a lock with the given lease TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            lease: Arc::new(Mutex::new(None)),
            ttl,
        }
    }

    /// Attempts to take the lease without blocking.
    ///
    /// Returns `None` when a live lease is held. An expired lease is taken
    /// over with a warning.
    pub fn try_acquire(&self) -> Option<RunGuard> {
        let mut lease = self.lease.lock().unwrap();

        if let Some(expires_at) = *lease {
            if Instant::now() < expires_at {
                return None;
            }
            warn!("taking over an expired sync run lease");
        }

        *lease = Some(Instant::now() + self.ttl);
        Some(RunGuard {
            lease: Arc::clone(&self.lease),
        })
    }

    /// Returns true if a live lease is currently held.
    pub fn is_held(&self) -> bool {
        match *self.lease.lock().unwrap() {
            Some(expires_at) => Instant::now() < expires_at,
            None => false,
        }
    }
}

/// Releases the lease on drop.
#[derive(Debug)]
pub struct RunGuard {
    lease: Arc<Mutex<Option<Instant>>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        *self.lease.lock().unwrap() = None;
    }
}
