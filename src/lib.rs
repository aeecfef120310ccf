//! # Parkiraj reservation service
//!
//! Parking spot reservations with an exact per-location capacity counter.
//! A user claims one spot for a bounded time; the claim ends when they
//! cancel it or when it expires, and the spot goes back into the pool.
//!
//! ## Architecture
//!
//! - **domain**: locations, reservations and the transactional store contract
//! - **application**: the allocator, the expiry scheduler and the read projection
//! - **infrastructure**: in-memory and SeaORM/SQLite stores, migrations, seeding
//! - **interfaces**: REST API with Swagger docs and a WebSocket event stream
//! - **notifications**: events published after each committed change
//! - **shared**: errors, retry, clock and shutdown plumbing

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod notifications;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::{ExpiryScheduler, ParkingQueries, ReservationAllocator, ReserveRequest};
pub use infrastructure::{init_database, DatabaseConfig, InMemoryReservationStore, SeaOrmReservationStore};
pub use interfaces::http::create_api_router;
pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
