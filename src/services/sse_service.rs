use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc, watch,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dao::{
        document_store::{Document, DocumentStore, live_query},
        models::MessageEntity,
        storage::StorageError,
    },
    dto::sse::{Handshake, MessagesEvent, ServerEvent, SubscriptionErrorEvent, SystemStatus},
    error::ServiceError,
    services::{chat_service, game_state_service, room_service, store_access},
    state::{SharedState, game_state::GameState},
};

/// SSE event carrying the room's game-state document (or `null`).
pub const GAME_STATE_EVENT: &str = "game_state";
/// SSE event carrying the latest chat window.
pub const MESSAGES_EVENT: &str = "messages";

const FEED_CAPACITY: usize = 16;

/// Live event stream of a room: handshake, game state, chat, table events
/// and degraded-mode changes.
pub async fn room_events(
    state: &SharedState,
    room_id: &str,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + use<>>, ServiceError> {
    let feed = room_feed(state, room_id).await?;
    info!(room_id, "room SSE stream connected");
    Ok(to_sse_stream(feed))
}

/// Spawn the forwarder feeding one SSE connection of `room_id`.
async fn room_feed(
    state: &SharedState,
    room_id: &str,
) -> Result<mpsc::Receiver<ServerEvent>, ServiceError> {
    room_service::get_room(state, room_id).await?;
    let store = state.require_store().await?;

    let handshake = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            room_id: room_id.to_string(),
            message: "room stream connected".to_string(),
            degraded: state.is_degraded().await,
        },
    )
    .ok();

    let (tx, rx) = mpsc::channel(FEED_CAPACITY);
    tokio::spawn(forward_room_events(
        state.clone(),
        room_id.to_string(),
        store,
        state.rooms().hub(room_id).subscribe(),
        state.degraded_watcher(),
        handshake,
        tx,
    ));
    Ok(rx)
}

async fn forward_room_events(
    state: SharedState,
    room_id: String,
    store: Arc<dyn DocumentStore>,
    mut hub: broadcast::Receiver<ServerEvent>,
    mut degraded: watch::Receiver<bool>,
    handshake: Option<ServerEvent>,
    tx: mpsc::Sender<ServerEvent>,
) {
    let game_states = live_query(
        store.clone(),
        game_state_service::room_filter(&room_id).limit(1),
        format!("{GAME_STATE_EVENT}:{room_id}"),
    );
    let messages = live_query(
        store,
        chat_service::messages_filter(&room_id, chat_service::DEFAULT_WINDOW),
        format!("{MESSAGES_EVENT}:{room_id}"),
    );
    tokio::pin!(game_states);
    tokio::pin!(messages);

    if let Some(handshake) = handshake {
        if tx.send(handshake).await.is_err() {
            return;
        }
    }

    loop {
        let event = tokio::select! {
            _ = tx.closed() => break,
            update = game_states.next() => match update {
                Some(Ok(documents)) => game_state_event(&documents),
                Some(Err(err)) => subscription_error(&state, GAME_STATE_EVENT, "update the game state", err).await,
                None => break,
            },
            update = messages.next() => match update {
                Some(Ok(documents)) => messages_event(&documents),
                Some(Err(err)) => subscription_error(&state, MESSAGES_EVENT, "sync chat", err).await,
                None => break,
            },
            received = hub.recv() => match received {
                Ok(event) => Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    // Table snapshots supersede each other; dropping some is fine.
                    debug!(room_id = %room_id, skipped, "room stream lagged");
                    None
                }
                Err(RecvError::Closed) => break,
            },
            changed = degraded.changed() => match changed {
                Ok(()) => {
                    let degraded = *degraded.borrow_and_update();
                    ServerEvent::json(Some("system_status".to_string()), &SystemStatus { degraded }).ok()
                }
                Err(_) => break,
            },
        };

        if let Some(event) = event {
            if tx.send(event).await.is_err() {
                break;
            }
        }
    }

    info!(room_id = %room_id, "room SSE stream disconnected");
}

fn game_state_event(documents: &[Document]) -> Option<ServerEvent> {
    let current = match documents.first().map(Document::decode::<GameState>).transpose() {
        Ok(current) => current,
        Err(err) => {
            return subscription_event(GAME_STATE_EVENT, err.to_string());
        }
    };
    ServerEvent::json(Some(GAME_STATE_EVENT.to_string()), &current).ok()
}

fn messages_event(documents: &[Document]) -> Option<ServerEvent> {
    let messages = match documents
        .iter()
        .map(Document::decode::<MessageEntity>)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(messages) => messages,
        Err(err) => return subscription_event(MESSAGES_EVENT, err.to_string()),
    };
    ServerEvent::json(Some(MESSAGES_EVENT.to_string()), &MessagesEvent(messages)).ok()
}

async fn subscription_error(
    state: &SharedState,
    source: &str,
    context: &str,
    err: StorageError,
) -> Option<ServerEvent> {
    let err = store_access::classify(state, context, err).await;
    subscription_event(source, err.to_string())
}

fn subscription_event(source: &str, message: String) -> Option<ServerEvent> {
    ServerEvent::json(
        Some("subscription_error".to_string()),
        &SubscriptionErrorEvent {
            source: source.to_string(),
            message,
        },
    )
    .ok()
}

/// Convert a feed into an SSE response. Dropping the response closes the
/// feed, which stops the forwarder.
pub fn to_sse_stream(
    feed: mpsc::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(feed).map(|payload| {
        let mut event = Event::default().data(payload.data);
        if let Some(name) = payload.event {
            event = event.event(name);
        }
        Ok::<_, Infallible>(event)
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
