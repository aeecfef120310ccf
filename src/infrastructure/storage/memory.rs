//! In-memory store for development and testing
//!
//! Lock order is always location -> user index -> reservation, so commits on
//! different locations never block each other and never deadlock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::debug;

use crate::domain::{
    DomainError, DomainResult, ParkingLocation, ReleaseOutcome, ReleaseReason, Reservation,
    ReservationStore,
};

#[derive(Default)]
pub struct InMemoryReservationStore {
    locations: DashMap<String, ParkingLocation>,
    /// user id -> id of that user's active reservation. Doubles as the
    /// active-only index the expiry sweep walks.
    active_by_user: DashMap<String, String>,
    /// Every reservation ever made, released ones included
    reservations: DashMap<String, Reservation>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn seed_location(&self, location: ParkingLocation) -> DomainResult<bool> {
        location.validate()?;
        match self.locations.entry(location.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(location);
                Ok(true)
            }
        }
    }

    async fn find_location(&self, id: &str) -> DomainResult<Option<ParkingLocation>> {
        Ok(self.locations.get(id).map(|l| l.clone()))
    }

    async fn list_locations(&self) -> DomainResult<Vec<ParkingLocation>> {
        Ok(self.locations.iter().map(|e| e.value().clone()).collect())
    }

    async fn find_reservation(&self, id: &str) -> DomainResult<Option<Reservation>> {
        Ok(self.reservations.get(id).map(|r| r.clone()))
    }

    async fn find_active_for_user(&self, user_id: &str) -> DomainResult<Option<Reservation>> {
        let Some(reservation_id) = self.active_by_user.get(user_id).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self
            .reservations
            .get(&reservation_id)
            .filter(|r| r.is_active())
            .map(|r| r.clone()))
    }

    async fn find_expired(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DomainResult<Vec<Reservation>> {
        let active_ids: Vec<String> = self
            .active_by_user
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut due: Vec<Reservation> = active_ids
            .iter()
            .filter_map(|id| self.reservations.get(id).map(|r| r.clone()))
            .filter(|r| r.is_due(now))
            .collect();
        due.sort_by_key(|r| r.expires_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn commit_reserve(&self, reservation: &Reservation) -> DomainResult<ParkingLocation> {
        let mut location = self
            .locations
            .get_mut(&reservation.parking_location_id)
            .ok_or_else(|| DomainError::location_not_found(&reservation.parking_location_id))?;

        if location.available <= 0 {
            return Err(DomainError::NoCapacity(location.id.clone()));
        }

        match self.active_by_user.entry(reservation.user_id.clone()) {
            Entry::Occupied(_) => Err(DomainError::AlreadyReserved(reservation.user_id.clone())),
            Entry::Vacant(slot) => {
                location.available -= 1;
                location.version += 1;
                location.updated_at = reservation.created_at;
                self.reservations
                    .insert(reservation.id.clone(), reservation.clone());
                slot.insert(reservation.id.clone());
                debug!(
                    "Reserved {} at {} (available now {})",
                    reservation.id, location.id, location.available
                );
                Ok(location.clone())
            }
        }
    }

    async fn commit_release(
        &self,
        reservation_id: &str,
        released_at: DateTime<Utc>,
        reason: ReleaseReason,
    ) -> DomainResult<ReleaseOutcome> {
        // Snapshot only to learn which location and user to lock; the status
        // check that matters happens again under the locks.
        let snapshot = self
            .reservations
            .get(reservation_id)
            .map(|r| r.clone())
            .ok_or_else(|| DomainError::reservation_not_found(reservation_id))?;
        if !snapshot.is_active() {
            return Ok(ReleaseOutcome::AlreadyReleased(snapshot));
        }

        let mut location = self
            .locations
            .get_mut(&snapshot.parking_location_id)
            .ok_or_else(|| DomainError::location_not_found(&snapshot.parking_location_id))?;

        let user_slot = self.active_by_user.entry(snapshot.user_id.clone());

        let mut reservation = self
            .reservations
            .get_mut(reservation_id)
            .ok_or_else(|| DomainError::reservation_not_found(reservation_id))?;
        if !reservation.release(reason, released_at) {
            return Ok(ReleaseOutcome::AlreadyReleased(reservation.clone()));
        }

        if let Entry::Occupied(slot) = user_slot {
            if slot.get() == reservation_id {
                slot.remove();
            }
        }

        if location.available < location.capacity {
            location.available += 1;
        }
        location.version += 1;
        location.updated_at = released_at;

        debug!(
            "Released {} at {} ({}, available now {})",
            reservation_id, location.id, reason, location.available
        );

        Ok(ReleaseOutcome::Released {
            reservation: reservation.clone(),
            location: location.clone(),
        })
    }
}
