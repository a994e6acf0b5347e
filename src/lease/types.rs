//! Lease record

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::to_epoch_ms;
use crate::RecordId;

/// A time-bounded exclusive claim on a record.
///
/// Reviewers only ever hold a copy; the authoritative lease lives in
/// the store and is mutated by the [`super::LeaseManager`] alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub record_id: RecordId,

    /// Authenticated reviewer identity
    pub owner: String,

    /// First grant of this claim
    pub acquired_at: DateTime<Utc>,

    /// Last acquire or renewal
    pub renewed_at: DateTime<Utc>,

    /// `renewed_at + TTL`
    pub expires_at: DateTime<Utc>,

    /// Monotonic per record, bumped on every acquire and renewal
    pub version: u64,
}

impl Lease {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_held_by(&self, owner: &str) -> bool {
        self.owner == owner
    }

    /// Deadline as epoch milliseconds
    pub fn expires_at_ms(&self) -> i64 {
        to_epoch_ms(self.expires_at)
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.expires_at - now;
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lease_expiring_at(secs: i64) -> Lease {
        let start = Utc.timestamp_opt(0, 0).unwrap();
        Lease {
            record_id: RecordId::from("R1"),
            owner: "alice".into(),
            acquired_at: start,
            renewed_at: start,
            expires_at: Utc.timestamp_opt(secs, 0).unwrap(),
            version: 1,
        }
    }

    #[test]
    fn test_soft_expiry() {
        let lease = lease_expiring_at(600);
        assert!(!lease.is_expired_at(Utc.timestamp_opt(599, 0).unwrap()));
        assert!(lease.is_expired_at(Utc.timestamp_opt(600, 0).unwrap()));
    }

    #[test]
    fn test_expires_at_ms() {
        assert_eq!(lease_expiring_at(1_150).expires_at_ms(), 1_150_000);
    }

    #[test]
    fn test_time_remaining_never_negative() {
        let lease = lease_expiring_at(10);
        assert_eq!(
            lease.time_remaining(Utc.timestamp_opt(20, 0).unwrap()),
            Duration::zero()
        );
    }
}
