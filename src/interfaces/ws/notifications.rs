//! Live reservation events for UI clients
//!
//! `GET /ws/events?location_id=P1&event_types=reservation_created` upgrades to
//! a WebSocket that receives every matching [`EventMessage`] as JSON text.
//! Map and list views use it to refresh `available` without polling.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::select;
use tracing::{debug, info, warn};

use crate::notifications::{EventMessage, SharedEventBus};

/// Query parameters narrowing the stream
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    pub location_id: Option<String>,
    /// Comma-separated event types
    pub event_types: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, message: &EventMessage) -> bool {
        if let Some(location_id) = &self.location_id {
            if message.event.location_id() != location_id.as_str() {
                return false;
            }
        }

        match &self.event_types {
            Some(types) => types
                .split(',')
                .map(str::trim)
                .any(|t| t == message.event.event_type()),
            None => true,
        }
    }
}

#[derive(Clone)]
pub struct NotificationState {
    pub event_bus: SharedEventBus,
}

pub async fn ws_events_handler(
    ws: WebSocketUpgrade,
    State(state): State<NotificationState>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    debug!(
        location_id = ?filter.location_id,
        event_types = ?filter.event_types,
        "Event stream upgrade requested"
    );
    ws.on_upgrade(move |socket| stream_events(socket, state, filter))
}

async fn stream_events(socket: WebSocket, state: NotificationState, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscriber = state.event_bus.subscribe();

    let hello = serde_json::json!({
        "type": "connected",
        "filter": {
            "location_id": filter.location_id,
            "event_types": filter.event_types,
        }
    });
    if sender
        .send(Message::Text(hello.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    info!("Event stream client connected");

    loop {
        select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    warn!(error = %e, "Event stream socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },

            event = subscriber.recv() => {
                let Some(message) = event else {
                    warn!("Event bus closed");
                    break;
                };
                if !filter.matches(&message) {
                    continue;
                }
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize event"),
                }
            }
        }
    }

    info!("Event stream client disconnected");
}
