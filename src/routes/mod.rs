use axum::Router;

use crate::state::SharedState;

pub mod config;
pub mod docs;
pub mod friends;
pub mod game_state;
pub mod health;
pub mod identity;
pub mod messages;
pub mod rooms;
pub mod sse;
pub mod table;
pub mod users;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(config::router())
        .merge(users::router())
        .merge(friends::router())
        .merge(rooms::router())
        .merge(game_state::router())
        .merge(messages::router())
        .merge(table::router())
        .merge(sse::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
