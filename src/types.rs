use crate::clock::{Clock, SystemClock};
use crate::ratelimit::RateLimitSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rate object as GitHub serializes it (`{"limit","remaining","reset"}`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitRecord {
    pub limit: i32,
    pub remaining: i32,
    pub reset: i64,
}

impl RateLimitRecord {
    pub fn into_snapshot(self, updated_at: Option<&str>) -> RateLimitSnapshot {
        self.into_snapshot_with_clock(updated_at, &SystemClock)
    }

    pub fn into_snapshot_with_clock(
        self,
        updated_at: Option<&str>,
        clock: &dyn Clock,
    ) -> RateLimitSnapshot {
        RateLimitSnapshot::with_clock(self.limit, self.remaining, self.reset, updated_at, clock)
    }
}

// Body of GET /rate_limit. `rate` mirrors resources.core and is kept for older servers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitResponse {
    #[serde(default)]
    pub resources: BTreeMap<String, RateLimitRecord>,
    #[serde(default)]
    pub rate: Option<RateLimitRecord>,
}

/// Serializable view of a snapshot for CLI/JSON output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateReport {
    pub limit: i32,
    pub remaining: i32,
    pub reset_epoch_seconds: i64,
    pub reset_at: String,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skew_seconds: Option<i64>,
}

impl RateReport {
    pub fn from_snapshot(snapshot: &RateLimitSnapshot, clock: &dyn Clock) -> Self {
        Self {
            limit: snapshot.limit(),
            remaining: snapshot.remaining(),
            reset_epoch_seconds: snapshot.reset_epoch_seconds(),
            reset_at: snapshot.reset_date().to_rfc3339(),
            expired: snapshot.is_expired_with(clock),
            skew_seconds: snapshot.clock_skew().map(|d| d.num_seconds()),
        }
    }
}
