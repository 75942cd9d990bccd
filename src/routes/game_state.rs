use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::game_state::GameStatePatchRequest,
    error::AppError,
    routes::identity::CurrentUser,
    services::{game_state_service, room_service},
    state::{SharedState, game_state::GameState},
};

/// Routes reading and patching the shared game state.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/rooms/{id}/game-state",
            get(current_game_state).patch(update_game_state),
        )
        .route("/rooms/{id}/game-state/start", post(start_game))
        .route("/rooms/{id}/game-state/end", post(end_game))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}/game-state",
    tag = "game-state",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Current game state, null when none was written yet", body = GameState),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Current game state, or `null` when none was written yet.
pub async fn current_game_state(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<Option<GameState>>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "see the game").await?;
    Ok(Json(
        game_state_service::current_game_state(&state, &room_id).await?,
    ))
}

#[utoipa::path(
    patch,
    path = "/rooms/{id}/game-state",
    tag = "game-state",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    request_body = GameStatePatchRequest,
    responses(
        (status = 200, description = "Merged game state", body = GameState),
        (status = 400, description = "Invalid patch"),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Merge a partial update; the last writer wins.
pub async fn update_game_state(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<GameStatePatchRequest>>,
) -> Result<Json<GameState>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "change the game").await?;
    Ok(Json(
        game_state_service::update_game_state(&state, &room_id, payload.into()).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/rooms/{id}/game-state/start",
    tag = "game-state",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room is playing", body = GameState),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Mark the room as playing.
pub async fn start_game(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<GameState>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "start a game").await?;
    Ok(Json(game_state_service::start_game(&state, &room_id).await?))
}

#[utoipa::path(
    post,
    path = "/rooms/{id}/game-state/end",
    tag = "game-state",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Room is idle again", body = GameState),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Back to idle.
pub async fn end_game(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<GameState>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "end a game").await?;
    Ok(Json(game_state_service::end_game(&state, &room_id).await?))
}
