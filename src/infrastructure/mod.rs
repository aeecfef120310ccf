//! Infrastructure layer - external concerns

pub mod database;
pub mod seed;
pub mod storage;

pub use database::{init_database, DatabaseConfig, SeaOrmReservationStore};
pub use storage::InMemoryReservationStore;
