//! GitHub API rate-limit snapshots.
//!
//! [`RateLimitSnapshot`] records one observation of the limit, remaining calls
//! and reset epoch, and estimates the real reset instant while compensating
//! for skew between the local clock and the server's `Date` header. The
//! remaining modules are the thin plumbing a client needs around it.

pub mod clock;
pub mod config;
pub mod http;
pub mod ratelimit;
pub mod tracker;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ratelimit::{RateLimitSnapshot, ResetAnchor};
pub use tracker::RateLimitTracker;
