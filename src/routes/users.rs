use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, put},
};
use axum_valid::Valid;

use crate::{
    dao::models::UserEntity,
    dto::user::{
        LeaderboardEntry, LeaderboardQuery, MeQuery, NicknameRequest, NicknameSuggestion,
        SearchQuery,
    },
    error::AppError,
    routes::identity::CurrentUser,
    services::user_service,
    state::SharedState,
};

const MAX_LEADERBOARD_SIZE: usize = 100;

/// Routes handling profiles and nicknames.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users/me", get(me))
        .route("/users/me/nickname", put(set_nickname))
        .route("/users/search", get(search))
        .route("/users/suggest-nickname", get(suggest_nickname))
        .route("/users/leaderboard", get(leaderboard))
}

#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    responses(
        (status = 200, description = "Caller's profile", body = UserEntity),
        (status = 400, description = "No profile and no nickname given")
    )
)]
/// Caller's profile, created on first use when `nickname` is given.
pub async fn me(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<MeQuery>,
) -> Result<Json<UserEntity>, AppError> {
    let user =
        user_service::get_or_create_user(&state, &user_id, query.nickname.as_deref()).await?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/users/me/nickname",
    tag = "users",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    request_body = NicknameRequest,
    responses(
        (status = 200, description = "Nickname claimed", body = UserEntity),
        (status = 400, description = "Invalid nickname or email"),
        (status = 409, description = "Nickname already taken")
    )
)]
/// Claim a nickname nobody else uses.
pub async fn set_nickname(
    State(state): State<SharedState>,
    CurrentUser(user_id): CurrentUser,
    Valid(Json(payload)): Valid<Json<NicknameRequest>>,
) -> Result<Json<UserEntity>, AppError> {
    let user =
        user_service::set_nickname_unique(&state, &user_id, &payload.nickname, payload.email)
            .await?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/users/search",
    tag = "users",
    params(
        ("x-user-id" = String, Header, description = "Caller's user id")
    ),
    responses(
        (status = 200, description = "Matching profiles", body = [UserEntity])
    )
)]
/// Profiles whose nickname matches `q`, ignoring case.
pub async fn search(
    State(state): State<SharedState>,
    CurrentUser(_caller): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserEntity>>, AppError> {
    Ok(Json(
        user_service::search_users_by_nickname(&state, &query.q).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/users/suggest-nickname",
    tag = "users",
    responses(
        (status = 200, description = "Random nickname", body = NicknameSuggestion)
    )
)]
/// Random nickname idea.
pub async fn suggest_nickname() -> Json<NicknameSuggestion> {
    Json(NicknameSuggestion {
        nickname: user_service::generate_username(&mut rand::rng()),
    })
}

#[utoipa::path(
    get,
    path = "/users/leaderboard",
    tag = "users",
    responses(
        (status = 200, description = "Top players by points", body = [LeaderboardEntry])
    )
)]
/// Top players by points.
pub async fn leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let limit = query
        .limit
        .unwrap_or(user_service::DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    Ok(Json(user_service::leaderboard(&state, limit).await?))
}
