//! Parking location aggregate

pub mod model;

pub use model::{Coordinates, ParkingLocation, SpotCategory};
