use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dao::models::{FriendRequestEntity, UserEntity},
    dto::user::{FriendRequestInput, IncomingRequests},
    error::AppError,
    routes::identity::CurrentUser,
    services::friend_service,
    state::SharedState,
};

/// Routes handling the friend graph.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/friends", get(list_friends))
        .route("/friends/requests", post(send_request))
        .route("/friends/requests/incoming", get(incoming))
        .route("/friends/requests/{id}/accept", post(accept))
        .route("/friends/requests/{id}/decline", post(decline))
}

#[utoipa::path(
    post,
    path = "/friends/requests",
    tag = "friends",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    request_body = FriendRequestInput,
    responses(
        (status = 201, description = "Request sent", body = FriendRequestEntity),
        (status = 400, description = "Request to oneself")
    )
)]
/// Ask another user to be friends.
pub async fn send_request(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Valid(Json(payload)): Valid<Json<FriendRequestInput>>,
) -> Result<(StatusCode, Json<FriendRequestEntity>), AppError> {
    let request =
        friend_service::send_friend_request(&state, &user_id, payload.to_user_id.trim()).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/friends/requests/{id}/accept",
    tag = "friends",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Friend request id")
    ),
    responses(
        (status = 200, description = "Request accepted", body = FriendRequestEntity),
        (status = 401, description = "Caller is not the recipient"),
        (status = 404, description = "Unknown request")
    )
)]
/// Accept a request addressed to the caller.
pub async fn accept(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(request_id): Path<String>,
) -> Result<Json<FriendRequestEntity>, AppError> {
    Ok(Json(
        friend_service::accept_friend_request(&state, &user_id, &request_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/friends/requests/{id}/decline",
    tag = "friends",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id"),
        ("id" = String, Path, description = "Friend request id")
    ),
    responses(
        (status = 200, description = "Request declined", body = FriendRequestEntity),
        (status = 401, description = "Caller is not the recipient"),
        (status = 404, description = "Unknown request")
    )
)]
/// Decline a request addressed to the caller.
pub async fn decline(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Path(request_id): Path<String>,
) -> Result<Json<FriendRequestEntity>, AppError> {
    Ok(Json(
        friend_service::decline_friend_request(&state, &user_id, &request_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/friends",
    tag = "friends",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    responses(
        (status = 200, description = "Caller's friends", body = [UserEntity])
    )
)]
/// Caller's friends.
pub async fn list_friends(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<UserEntity>>, AppError> {
    Ok(Json(friend_service::list_friends(&state, &user_id).await?))
}

#[utoipa::path(
    get,
    path = "/friends/requests/incoming",
    tag = "friends",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    responses(
        (status = 200, description = "Pending requests with their senders", body = IncomingRequests)
    )
)]
/// Pending requests addressed to the caller, with their senders.
pub async fn incoming(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<IncomingRequests>, AppError> {
    Ok(Json(
        friend_service::incoming_requests(&state, &user_id).await?,
    ))
}
