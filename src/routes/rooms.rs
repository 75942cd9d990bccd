use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;
use tracing::warn;

use crate::{
    dao::models::RoomEntity,
    dto::room::{CreateRoomRequest, RoomView},
    error::AppError,
    routes::identity::CurrentUser,
    services::{chat_service, room_service},
    state::SharedState,
};

/// Routes handling rooms and their membership.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{id}", get(get_room).delete(end_room))
        .route("/rooms/{id}/join", post(join_room))
}

async fn view(state: &SharedState, room: RoomEntity) -> Result<RoomView, AppError> {
    let roster = room_service::room_roster(state, &room).await?;
    Ok(RoomView { room, roster })
}

#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomView),
        (status = 400, description = "Invalid room settings")
    )
)]
/// Open a room owned by the caller.
pub async fn create_room(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomView>), AppError> {
    let room = room_service::create_room(&state, &user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(view(&state, room).await?)))
}

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    responses(
        (status = 200, description = "Rooms of the caller, newest first", body = [RoomEntity])
    )
)]
/// Rooms the caller belongs to, newest first.
pub async fn list_rooms(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<RoomEntity>>, AppError> {
    Ok(Json(room_service::list_rooms_for(&state, &user_id).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room with its roster", body = RoomView),
        (status = 404, description = "Unknown room")
    )
)]
/// Room with its seated roster.
pub async fn get_room(
    State(state): State<SharedState>,
    CurrentUser(_caller): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::get_room(&state, &room_id).await?;
    Ok(Json(view(&state, room).await?))
}

#[utoipa::path(
    post,
    path = "/rooms/{id}/join",
    tag = "rooms",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room joined", body = RoomView),
        (status = 404, description = "Unknown room"),
        (status = 409, description = "Room is full")
    )
)]
/// Join a room, then trim its chat backlog.
pub async fn join_room(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<RoomView>, AppError> {
    let room = room_service::join_room(&state, &user_id, &room_id).await?;
    if let Err(err) =
        chat_service::truncate_old_messages(&state, &room_id, chat_service::DEFAULT_KEEP).await
    {
        warn!(room_id = %room_id, error = %err, "failed to truncate chat on join");
    }
    Ok(Json(view(&state, room).await?))
}

#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "rooms",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 204, description = "Room ended"),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// End the room for everybody.
pub async fn end_room(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<StatusCode, AppError> {
    room_service::end_room(&state, &user_id, &room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
