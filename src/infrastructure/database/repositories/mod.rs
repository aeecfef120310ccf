//! SeaORM-backed store implementations

mod reservation_store;

pub use reservation_store::SeaOrmReservationStore;
