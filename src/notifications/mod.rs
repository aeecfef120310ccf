//! Real-time notifications for UI clients

pub mod event_bus;
pub mod events;

pub use event_bus::{create_event_bus, EventBus, SharedEventBus, Subscription};
pub use events::{Event, EventMessage, ReservationCreatedEvent, ReservationReleasedEvent};
