//! Lease duration and expiry arithmetic

use chrono::{DateTime, Duration, Utc};

/// Default lease TTL (10 minutes)
pub const DEFAULT_LEASE_TTL_SECS: i64 = 600;

/// Minimum spacing between client heartbeats
pub const DEFAULT_HEARTBEAT_MIN_INTERVAL_SECS: i64 = 60;

/// Longest accepted lease TTL (one day)
pub const MAX_LEASE_TTL_SECS: i64 = 86_400;

/// Lease timing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeasePolicy {
    /// Fixed lease lifetime, counted from the last acquire or renewal
    pub ttl: Duration,

    /// Heartbeats are rate-limited to one per interval of user activity
    pub heartbeat_min_interval: Duration,
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_LEASE_TTL_SECS),
            heartbeat_min_interval: Duration::seconds(DEFAULT_HEARTBEAT_MIN_INTERVAL_SECS),
        }
    }
}

impl LeasePolicy {
    /// Policy with a custom TTL in seconds.
    ///
    /// TTLs are clamped to `1..=MAX_LEASE_TTL_SECS`.
    pub fn with_ttl_secs(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs.clamp(1, MAX_LEASE_TTL_SECS)),
            ..Default::default()
        }
    }

    /// Deadline for a lease acquired or renewed at `renewed_at`.
    ///
    /// `None` when the deadline falls outside the representable range.
    pub fn expires_at(&self, renewed_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        renewed_at.checked_add_signed(self.ttl)
    }

    /// Whether a heartbeat sent at `now` is too soon after `last_renewal`
    pub fn heartbeat_too_soon(&self, last_renewal: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - last_renewal < self.heartbeat_min_interval
    }
}
