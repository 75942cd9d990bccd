use axum::{Json, Router, extract::State, routing::get};

use crate::{games::categories::Category, state::SharedState};

#[utoipa::path(
    get,
    path = "/config/categories",
    tag = "config",
    responses(
        (status = 200, description = "Category deck", body = [Category])
    )
)]
/// Category deck used by the categories game.
pub async fn categories(State(state): State<SharedState>) -> Json<Vec<Category>> {
    Json(state.config().categories().to_vec())
}

#[utoipa::path(
    get,
    path = "/config/prompts",
    tag = "config",
    responses(
        (status = 200, description = "Prompt deck", body = [String])
    )
)]
/// Prompt deck used by the spin table.
pub async fn prompts(State(state): State<SharedState>) -> Json<Vec<String>> {
    Json(state.config().prompts().to_vec())
}

/// Read-only game content.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/config/categories", get(categories))
        .route("/config/prompts", get(prompts))
}
