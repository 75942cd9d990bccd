use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_valid::Valid;

use crate::{
    dao::models::MessageEntity,
    dto::chat::{MessagesQuery, RemovedMessages, SendMessageRequest},
    error::AppError,
    routes::identity::CurrentUser,
    services::{chat_service, room_service},
    state::SharedState,
};

/// Routes of the room chat.
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/rooms/{id}/messages",
        get(list_messages).post(send_message).delete(purge_messages),
    )
}

#[utoipa::path(
    get,
    path = "/rooms/{id}/messages",
    tag = "chat",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id"),
        ("limit" = Option<usize>, Query, description = "Window size, 50 by default")
    ),
    responses(
        (status = 200, description = "Latest messages, oldest first", body = [MessageEntity]),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Latest chat window, oldest first.
pub async fn list_messages(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
    Valid(Query(query)): Valid<Query<MessagesQuery>>,
) -> Result<Json<Vec<MessageEntity>>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "read the chat").await?;
    let limit = query.limit.unwrap_or(chat_service::DEFAULT_WINDOW);
    Ok(Json(
        chat_service::list_messages(&state, &room_id, limit).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/rooms/{id}/messages",
    tag = "chat",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = MessageEntity),
        (status = 204, description = "Blank message, nothing stored"),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Post a message; blank text answers `204` without writing anything.
pub async fn send_message(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<SendMessageRequest>>,
) -> Result<Response, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "chat here").await?;
    match chat_service::send_message(&state, &room_id, &user_id, &payload.text).await? {
        Some(message) => Ok((StatusCode::CREATED, Json(message)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/rooms/{id}/messages",
    tag = "chat",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Messages removed by this call", body = RemovedMessages),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Delete a batch of the room's messages.
pub async fn purge_messages(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<RemovedMessages>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "clear the chat").await?;
    let removed = chat_service::purge_room_messages(&state, &room_id).await?;
    Ok(Json(RemovedMessages { removed }))
}
