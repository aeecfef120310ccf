//! Notification events
//!
//! Published after a reservation commit so UI clients can refresh without
//! polling. Delivery is best effort and never part of the commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ReleaseReason, SpotCategory};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A spot was claimed
    ReservationCreated(ReservationCreatedEvent),
    /// A reservation was cancelled or expired and its spot returned
    ReservationReleased(ReservationReleasedEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ReservationCreated(_) => "reservation_created",
            Event::ReservationReleased(_) => "reservation_released",
        }
    }

    pub fn location_id(&self) -> &str {
        match self {
            Event::ReservationCreated(e) => &e.location_id,
            Event::ReservationReleased(e) => &e.location_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCreatedEvent {
    pub reservation_id: String,
    pub user_id: String,
    pub location_id: String,
    pub spot_category: SpotCategory,
    pub expires_at: DateTime<Utc>,
    /// Spots left at the location after this claim
    pub available: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationReleasedEvent {
    pub reservation_id: String,
    pub user_id: String,
    pub location_id: String,
    pub reason: ReleaseReason,
    pub available: i32,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
