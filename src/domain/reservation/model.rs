//! Reservation domain entity

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::parking::SpotCategory;

/// Reservation status. `Released` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Released,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Released => "released",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "released" => Some(Self::Released),
            _ => None,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What moved a reservation from active to released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseReason {
    /// User-initiated cancel
    Cancelled,
    /// Expiry sweep
    Expired,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl fmt::Display for ReleaseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's temporary claim on one spot at one parking location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: String,
    pub user_id: String,
    pub parking_location_id: String,
    pub spot_category: SpotCategory,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    pub release_reason: Option<ReleaseReason>,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
}

impl Reservation {
    /// Active reservation expiring `duration` after `now`.
    pub fn new(
        user_id: impl Into<String>,
        parking_location_id: impl Into<String>,
        spot_category: SpotCategory,
        now: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            parking_location_id: parking_location_id.into(),
            spot_category,
            expires_at: now + duration,
            status: ReservationStatus::Active,
            release_reason: None,
            created_at: now,
            released_at: None,
        }
    }

    /// Transition to `Released`. Returns `false` if it already was.
    pub fn release(&mut self, reason: ReleaseReason, at: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = ReservationStatus::Released;
        self.release_reason = Some(reason);
        self.released_at = Some(at);
        true
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Active and past its expiry instant
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.expires_at <= now
    }

    /// Remaining time, clamped at zero
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.expires_at - now;
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }
}

/// Formats a remaining duration as `"{m}m {s}s"`.
pub fn format_countdown(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{}m {}s", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(now: DateTime<Utc>) -> Reservation {
        Reservation::new("user-1", "P1", SpotCategory::Regular, now, Duration::minutes(10))
    }

    #[test]
    fn new_reservation_is_active() {
        let now = Utc::now();
        let r = sample(now);
        assert!(r.is_active());
        assert_eq!(r.expires_at, now + Duration::minutes(10));
        assert_eq!(r.created_at, now);
        assert!(r.released_at.is_none());
    }

    #[test]
    fn release_happens_once() {
        let now = Utc::now();
        let mut r = sample(now);
        assert!(r.release(ReleaseReason::Cancelled, now));
        assert!(!r.release(ReleaseReason::Expired, now));
        assert_eq!(r.status, ReservationStatus::Released);
        assert_eq!(r.release_reason, Some(ReleaseReason::Cancelled));
    }

    #[test]
    fn due_only_at_or_after_expiry() {
        let now = Utc::now();
        let r = sample(now);
        assert!(!r.is_due(now + Duration::minutes(9)));
        assert!(r.is_due(now + Duration::minutes(10)));
        assert!(r.is_due(now + Duration::minutes(11)));
    }

    #[test]
    fn time_remaining_is_clamped() {
        let now = Utc::now();
        let r = sample(now);
        assert_eq!(r.time_remaining(now + Duration::minutes(4)), Duration::minutes(6));
        assert_eq!(r.time_remaining(now + Duration::hours(1)), Duration::zero());
    }

    #[test]
    fn countdown_format() {
        assert_eq!(format_countdown(Duration::seconds(125)), "2m 5s");
        assert_eq!(format_countdown(Duration::zero()), "0m 0s");
        assert_eq!(format_countdown(Duration::seconds(-3)), "0m 0s");
    }

    #[test]
    fn stored_names_parse() {
        assert_eq!(ReservationStatus::parse("active"), Some(ReservationStatus::Active));
        assert_eq!(ReservationStatus::parse("released"), Some(ReservationStatus::Released));
        assert_eq!(ReservationStatus::parse("deleted"), None);
        assert_eq!(ReleaseReason::parse("expired"), Some(ReleaseReason::Expired));
        assert_eq!(ReleaseReason::parse("?"), None);
    }
}
