//! Read-side projection for the client UI.
//!
//! Nothing here writes; every value is read from the store at call time so
//! `available` and the countdown reflect the latest committed state.

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::domain::{
    format_countdown, DomainError, DomainResult, ParkingLocation, Reservation, ReservationStore,
    SpotCategory,
};
use crate::shared::Clock;

/// A user's active reservation with the fields the home screen renders.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveReservationView {
    pub reservation: Reservation,
    /// `None` if the location row disappeared after the reservation was made
    pub location_name: Option<String>,
    #[serde(skip)]
    pub time_remaining: Duration,
    pub seconds_remaining: i64,
    /// "{m}m {s}s"
    pub countdown: String,
}

pub struct ParkingQueries {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
}

impl ParkingQueries {
    pub fn new(store: Arc<dyn ReservationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// All locations sorted by name, optionally only those offering `category`.
    pub async fn list_locations(
        &self,
        category: Option<SpotCategory>,
    ) -> DomainResult<Vec<ParkingLocation>> {
        let mut locations = self.store.list_locations().await?;
        if let Some(category) = category {
            locations.retain(|l| l.offers(category));
        }
        locations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(locations)
    }

    pub async fn get_location(&self, id: &str) -> DomainResult<ParkingLocation> {
        self.store
            .find_location(id)
            .await?
            .ok_or_else(|| DomainError::location_not_found(id))
    }

    pub async fn get_reservation(&self, id: &str) -> DomainResult<Reservation> {
        self.store
            .find_reservation(id)
            .await?
            .ok_or_else(|| DomainError::reservation_not_found(id))
    }

    pub async fn active_reservation(
        &self,
        user_id: &str,
    ) -> DomainResult<Option<ActiveReservationView>> {
        let Some(reservation) = self.store.find_active_for_user(user_id).await? else {
            return Ok(None);
        };

        let location_name = self
            .store
            .find_location(&reservation.parking_location_id)
            .await?
            .map(|l| l.name);
        let time_remaining = reservation.time_remaining(self.clock.now());

        Ok(Some(ActiveReservationView {
            location_name,
            seconds_remaining: time_remaining.num_seconds(),
            countdown: format_countdown(time_remaining),
            time_remaining,
            reservation,
        }))
    }
}
