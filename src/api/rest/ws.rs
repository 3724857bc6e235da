use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::event::DispatchEvent;
use crate::state::AppState;

/// `?delivery_id=` narrows the stream to events touching one delivery, which
/// is what a tracking page subscribes with.
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    pub delivery_id: Option<Uuid>,
}

impl EventFilter {
    fn accepts(&self, event: &DispatchEvent) -> bool {
        self.delivery_id.is_none_or(|id| event.involves(id))
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state, filter))
}

async fn stream_events(socket: WebSocket, state: Arc<AppState>, filter: EventFilter) {
    let (mut sink, mut inbound) = socket.split();
    let mut events = state.events_tx.subscribe();

    info!(delivery_id = ?filter.delivery_id, "event subscriber connected");

    let mut forward = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagging; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !filter.accepts(&event) {
                continue;
            }

            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "failed to encode dispatch event");
                    continue;
                }
            };
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are ignored; the loop only notices the client leaving.
    let mut drain = tokio::spawn(async move {
        while let Some(Ok(message)) = inbound.next().await {
            if let Message::Close(_) = message {
                break;
            }
            debug!("ignoring inbound websocket frame");
        }
    });

    tokio::select! {
        _ = &mut forward => drain.abort(),
        _ = &mut drain => forward.abort(),
    }

    info!("event subscriber disconnected");
}
