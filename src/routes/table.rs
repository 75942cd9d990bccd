use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::table::{StartTableRequest, TableCommandRequest, TableView},
    error::AppError,
    routes::identity::CurrentUser,
    services::{room_service, table_service},
    state::SharedState,
};

/// Routes driving the mini-game table of a room.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/rooms/{id}/table",
            post(start_table).get(current_table).delete(stop_table),
        )
        .route("/rooms/{id}/table/commands", post(send_command))
}

#[utoipa::path(
    post,
    path = "/rooms/{id}/table",
    tag = "tables",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    request_body = StartTableRequest,
    responses(
        (status = 201, description = "Table started", body = TableView),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room")
    )
)]
/// Start a mini-game, replacing the running one.
pub async fn start_table(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
    Valid(Json(payload)): Valid<Json<StartTableRequest>>,
) -> Result<(StatusCode, Json<TableView>), AppError> {
    let view = table_service::start_table(&state, &room_id, &user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}/table",
    tag = "tables",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 200, description = "Running table", body = TableView),
        (status = 401, description = "Caller is not a member of the room"),
        (status = 404, description = "Unknown room or no running table")
    )
)]
/// Running table and its latest snapshot.
pub async fn current_table(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<Json<TableView>, AppError> {
    room_service::member_room(&state, &room_id, &user_id, "watch the table").await?;
    Ok(Json(table_service::table(&state, &room_id)?))
}

#[utoipa::path(
    post,
    path = "/rooms/{id}/table/commands",
    tag = "tables",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    request_body = TableCommandRequest,
    responses(
        (status = 200, description = "Snapshot after the command", body = TableView),
        (status = 401, description = "Caller is not seated at the table"),
        (status = 404, description = "No running table"),
        (status = 409, description = "Command does not fit the running game")
    )
)]
/// Send one input to the running table.
pub async fn send_command(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
    Json(payload): Json<TableCommandRequest>,
) -> Result<Json<TableView>, AppError> {
    let view = table_service::send_command(&state, &room_id, &user_id, payload.into()).await?;
    Ok(Json(view))
}

#[utoipa::path(
    delete,
    path = "/rooms/{id}/table",
    tag = "tables",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Room id")
    ),
    responses(
        (status = 204, description = "Table closed"),
        (status = 401, description = "Caller is not seated at the table"),
        (status = 404, description = "No running table")
    )
)]
/// Close the running table.
pub async fn stop_table(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(room_id): Path<String>,
) -> Result<StatusCode, AppError> {
    table_service::stop_table(&state, &room_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
