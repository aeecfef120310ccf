//! Reservation aggregate

pub mod model;

pub use model::{format_countdown, ReleaseReason, Reservation, ReservationStatus};
