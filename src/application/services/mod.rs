pub mod allocator;
pub mod expiry;

pub use allocator::{AllocatorConfig, ReservationAllocator, ReserveRequest};
pub use expiry::{ExpiryConfig, ExpiryScheduler};
