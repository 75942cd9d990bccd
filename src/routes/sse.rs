use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;

use crate::{
    error::AppError,
    routes::identity::CurrentUser,
    services::{room_service, sse_service},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/rooms/{id}/events",
    tag = "sse",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room SSE stream", content_type = "text/event-stream", body = String),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Stream a room's game state, chat and table events.
pub async fn room_stream(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "follow the room").await?;
    tracing::info!(room_id = %room_id, user_id = %user_id, "new room SSE connection");
    Ok(sse_service::room_events(&state, &room_id).await?)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{id}/events", get(room_stream))
}
