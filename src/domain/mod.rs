//! Domain layer: entities and the store contract

pub mod parking;
pub mod repositories;
pub mod reservation;

pub use parking::{Coordinates, ParkingLocation, SpotCategory};
pub use repositories::{ReleaseOutcome, ReservationStore};
pub use reservation::{format_countdown, ReleaseReason, Reservation, ReservationStatus};

pub use crate::shared::errors::{DomainError, DomainResult};
