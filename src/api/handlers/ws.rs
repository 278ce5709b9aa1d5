//! Websocket endpoint for realtime reminder events.
//!
//! Protocol:
//! ← Server sends: {"type":"connected","data":{"user_id":7},"timestamp":"..."}
//! ← Server sends: {"type":"meeting_reminder","data":{...},"timestamp":"..."}
//! Client messages other than close are ignored.

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::api::doc::REALTIME_TAG;
use crate::error::{AppError, AppResult};
use crate::services::notifications::{RealtimeEvent, RealtimeHub};
use crate::state::AppState;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

pub fn ws_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(ws_handler))
}

/// GET /ws/{user_id} - Upgrade to a websocket receiving the user's events
#[utoipa::path(
    get,
    path = "/ws/{user_id}",
    tag = REALTIME_TAG,
    params(
        ("user_id" = i32, Path, description = "User whose events are streamed")
    ),
    responses(
        (status = 101, description = "Switching protocols; frames carry RealtimeEvent JSON", body = RealtimeEvent),
        (status = 404, description = "Unknown or inactive user")
    )
)]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> AppResult<Response> {
    match state.repos.users.find_by_id(user_id).await? {
        Some(user) if user.is_active => {}
        _ => {
            return Err(AppError::NotFound {
                entity: "user".to_string(),
                field: "id".to_string(),
                value: user_id.to_string(),
            });
        }
    }

    let hub = state.realtime.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, user_id)))
}

async fn handle_socket(socket: WebSocket, hub: RealtimeHub, user_id: i32) {
    let subscription = hub.subscribe(user_id);
    let connection_id = subscription.id;
    tracing::info!(user_id, connection_id, "Websocket client connected");

    let (outgoing, incoming) = socket.split();
    pump(outgoing, incoming, subscription.events, user_id).await;

    hub.unsubscribe(user_id, connection_id);
    tracing::info!(user_id, connection_id, "Websocket client disconnected");
}

/// Forwards hub events as JSON text frames until either side closes.
async fn pump<O, I, E>(
    mut outgoing: O,
    mut incoming: I,
    mut events: UnboundedReceiver<RealtimeEvent>,
    user_id: i32,
) where
    O: Sink<Message> + Unpin,
    I: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let hello = RealtimeEvent::new("connected", serde_json::json!({ "user_id": user_id }));
    if send_event(&mut outgoing, &hello).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if send_event(&mut outgoing, &event).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            frame = incoming.next() => match frame {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(user_id, error = %e, "Websocket read failed");
                    break;
                }
            },
        }
    }
}

async fn send_event<O>(outgoing: &mut O, event: &RealtimeEvent) -> Result<(), ()>
where
    O: Sink<Message> + Unpin,
{
    let json = serde_json::to_string(event).map_err(|e| {
        tracing::warn!(error = %e, "Failed to serialize realtime event");
    })?;
    outgoing.send(Message::Text(json.into())).await.map_err(|_| ())
}
