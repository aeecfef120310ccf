//! Store contract for the allocator
//!
//! The allocator only needs point lookups, a couple of simple queries and
//! two atomic commits. Each commit must run as one transaction: either both
//! the `available` adjustment and the reservation change land, or neither.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::parking::ParkingLocation;
use super::reservation::{ReleaseReason, Reservation};
use crate::shared::DomainResult;

/// Result of a release commit
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseOutcome {
    /// The reservation was active and now holds no spot
    Released {
        reservation: Reservation,
        location: ParkingLocation,
    },
    /// Somebody else released it first; nothing changed
    AlreadyReleased(Reservation),
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Insert a location if its id is unknown. Returns whether it was inserted.
    async fn seed_location(&self, location: ParkingLocation) -> DomainResult<bool>;

    async fn find_location(&self, id: &str) -> DomainResult<Option<ParkingLocation>>;

    async fn list_locations(&self) -> DomainResult<Vec<ParkingLocation>>;

    async fn find_reservation(&self, id: &str) -> DomainResult<Option<Reservation>>;

    /// The single active reservation for a user, if any
    async fn find_active_for_user(&self, user_id: &str) -> DomainResult<Option<Reservation>>;

    /// Active reservations with `expires_at <= now`, oldest expiry first
    async fn find_expired(&self, now: DateTime<Utc>, limit: usize)
        -> DomainResult<Vec<Reservation>>;

    /// Atomically claim one unit of `available` and insert `reservation`.
    ///
    /// The capacity check and the decrement happen in the same write, so
    /// the caller never carries a stale read into the commit. Fails with
    /// `NotFound` if the location is missing, `NoCapacity` if nothing is
    /// left and `AlreadyReserved` if the user already holds an active
    /// reservation. `Conflict` means the store itself was contended (for
    /// example a locked database) and the commit may be retried. Returns
    /// the location as committed, with `version` bumped.
    async fn commit_reserve(&self, reservation: &Reservation) -> DomainResult<ParkingLocation>;

    /// Atomically mark a reservation released and give its unit back.
    ///
    /// Idempotent: an already released reservation yields
    /// `ReleaseOutcome::AlreadyReleased` and leaves `available` untouched.
    async fn commit_release(
        &self,
        reservation_id: &str,
        released_at: DateTime<Utc>,
        reason: ReleaseReason,
    ) -> DomainResult<ReleaseOutcome>;
}
