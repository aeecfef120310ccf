//! Fan-out of reservation events to `/ws/events` clients
//!
//! A thin wrapper over a tokio broadcast channel. Publishing never blocks the
//! allocator; a slow client loses the oldest events instead.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::broadcast;

use super::events::{Event, EventMessage};

/// Events buffered per subscriber before it starts losing them
const BUFFERED_EVENTS: usize = 256;

pub struct EventBus {
    sender: broadcast::Sender<EventMessage>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUFFERED_EVENTS);
        Self { sender }
    }

    /// Stamp and broadcast an event. Returns how many subscribers got it.
    pub fn publish(&self, event: Event) -> usize {
        let message = EventMessage::new(event);
        let event_type = message.event.event_type();
        let reached = self.sender.send(message).unwrap_or(0);
        debug!("Published {} to {} subscriber(s)", event_type, reached);
        reached
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<EventMessage>,
}

impl Subscription {
    /// Next event, skipping past any this subscriber fell behind on.
    /// `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<EventMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("Event subscriber fell behind, {} events dropped", missed);
                    metrics::counter!("notification_events_dropped_total").increment(missed);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

pub type SharedEventBus = Arc<EventBus>;

pub fn create_event_bus() -> SharedEventBus {
    Arc::new(EventBus::new())
}
