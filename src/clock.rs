use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Source of wall-clock time for snapshot construction and expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn epoch_seconds(&self) -> i64 {
        self.now().timestamp()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock. Starts at the given instant and only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Clock pinned to whole epoch seconds; out-of-range values clamp to the epoch.
    pub fn at_epoch(secs: i64) -> Self {
        Self::new(DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = *guard + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
