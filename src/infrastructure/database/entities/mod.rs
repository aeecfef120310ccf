//! SeaORM entities

pub mod parking_location;
pub mod reservation;
