//! Room chat: posting, listing and housekeeping.

use tracing::{debug, info};

use crate::{
    dao::{
        document_store::{Direction, Filter, WriteOp},
        models::{MESSAGES, MessageEntity, now_millis, timestamped_id},
    },
    error::ServiceError,
    services::store_access,
    state::AppState,
};

const QUERY_CONTEXT: &str = "sync chat";
const WRITE_CONTEXT: &str = "send chat";
/// Messages returned when no window size is given.
pub const DEFAULT_WINDOW: usize = 50;
/// Messages kept by [`truncate_old_messages`] when no size is given.
pub const DEFAULT_KEEP: usize = 50;
const TRUNCATE_SLACK: usize = 10;
const PURGE_BATCH: usize = 200;

/// Query of the room's messages, oldest first.
pub fn messages_filter(room_id: &str, limit: usize) -> Filter {
    Filter::collection(MESSAGES)
        .where_eq("roomId", room_id)
        .order_by("createdAt", Direction::Asc)
        .limit(limit)
}

/// Post `text` to the room. Blank text is a no-op and yields `None`.
pub async fn send_message(
    state: &AppState,
    room_id: &str,
    sender_id: &str,
    text: &str,
) -> Result<Option<MessageEntity>, ServiceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let message = MessageEntity {
        id: timestamped_id("msg"),
        room_id: room_id.to_string(),
        sender_id: sender_id.to_string(),
        text: trimmed.to_string(),
        created_at: now_millis(),
        expires_at: None,
    };
    store_access::write(state, WRITE_CONTEXT, vec![store_access::put(&message)?]).await?;
    debug!(room_id, message_id = %message.id, "chat message sent");
    Ok(Some(message))
}

/// Up to `limit` messages of the room, oldest first.
pub async fn list_messages(
    state: &AppState,
    room_id: &str,
    limit: usize,
) -> Result<Vec<MessageEntity>, ServiceError> {
    store_access::query(state, QUERY_CONTEXT, messages_filter(room_id, limit)).await
}

/// Delete the oldest messages so that at most `keep` remain in the scanned window.
///
/// Only the oldest `keep + 10` messages are looked at, so a very long backlog
/// shrinks over several calls.
pub async fn truncate_old_messages(
    state: &AppState,
    room_id: &str,
    keep: usize,
) -> Result<usize, ServiceError> {
    let messages = list_messages(state, room_id, keep + TRUNCATE_SLACK).await?;
    if messages.len() <= keep {
        return Ok(0);
    }

    let excess = messages.len() - keep;
    let ops: Vec<WriteOp> = messages
        .into_iter()
        .take(excess)
        .map(|message| WriteOp::delete(MESSAGES, message.id))
        .collect();
    store_access::write(state, WRITE_CONTEXT, ops).await?;
    info!(room_id, removed = excess, "old chat messages truncated");
    Ok(excess)
}

/// Deletes for up to 200 messages of the room.
pub(crate) async fn purge_ops(state: &AppState, room_id: &str) -> Result<Vec<WriteOp>, ServiceError> {
    let messages: Vec<MessageEntity> = store_access::query(
        state,
        QUERY_CONTEXT,
        Filter::collection(MESSAGES)
            .where_eq("roomId", room_id)
            .limit(PURGE_BATCH),
    )
    .await?;
    Ok(messages
        .into_iter()
        .map(|message| WriteOp::delete(MESSAGES, message.id))
        .collect())
}

/// Delete up to 200 messages of the room.
pub async fn purge_room_messages(state: &AppState, room_id: &str) -> Result<usize, ServiceError> {
    let ops = purge_ops(state, room_id).await?;
    let removed = ops.len();
    store_access::write(state, WRITE_CONTEXT, ops).await?;
    if removed > 0 {
        info!(room_id, removed, "chat purged");
    }
    Ok(removed)
}
