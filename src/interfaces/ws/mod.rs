//! WebSocket interfaces

pub mod notifications;

pub use notifications::{ws_events_handler, EventFilter, NotificationState};
