use crate::clock::{Clock, SystemClock};
use crate::ratelimit::RateLimitSnapshot;
use log::debug;
use std::sync::{Arc, RwLock};

/// Holds the most relevant rate-limit snapshot seen so far.
///
/// Starts from a placeholder so status lookups made before the first response
/// do not trigger a fetch. Replacement is serialized through the lock; readers
/// get a copy.
pub struct RateLimitTracker {
    current: RwLock<RateLimitSnapshot>,
    clock: Arc<dyn Clock>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let placeholder = RateLimitSnapshot::placeholder_with_clock(clock.as_ref());
        Self {
            current: RwLock::new(placeholder),
            clock,
        }
    }

    pub fn current(&self) -> RateLimitSnapshot {
        *self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Offer a new observation. Keeps whichever describes the later state of the window:
    /// a newer window wins, and within the same window the lower remaining count wins.
    /// Placeholders and expired snapshots are always replaced.
    pub fn observe(&self, snapshot: RateLimitSnapshot) -> bool {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let current = *guard;
        let replace = current.is_placeholder()
            || current.is_expired_with(self.clock.as_ref())
            || snapshot.reset_epoch_seconds() > current.reset_epoch_seconds()
            || (snapshot.reset_epoch_seconds() == current.reset_epoch_seconds()
                && snapshot.remaining() <= current.remaining());
        if replace {
            debug!("rate limit updated: {} (was {})", snapshot, current);
            *guard = snapshot;
        } else {
            debug!("rate limit observation ignored: {} (keeping {})", snapshot, current);
        }
        replace
    }

    /// Whether the held snapshot's window has passed and a fresh observation is due.
    pub fn needs_refresh(&self) -> bool {
        self.current().is_expired_with(self.clock.as_ref())
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}
