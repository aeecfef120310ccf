//! Application layer: the allocator, its expiry task and the read projection.

pub mod queries;
pub mod services;

pub use queries::{ActiveReservationView, ParkingQueries};
pub use services::{
    AllocatorConfig, ExpiryConfig, ExpiryScheduler, ReservationAllocator, ReserveRequest,
};
