//! Shared per-room game-state document.
//!
//! Writes are read-merge-write without any version check: the last writer
//! wins and concurrent patches may overwrite each other's fields.

use tracing::{debug, info};

use crate::{
    dao::{
        document_store::{Filter, WriteOp},
        models::{GAME_STATES, now_millis},
    },
    error::ServiceError,
    services::store_access,
    state::{
        AppState,
        game_state::{GamePayload, GamePhase, GameState, GameStatePatch},
    },
};

const CONTEXT: &str = "update the game state";

/// Query matching the room's game-state documents.
pub fn room_filter(room_id: &str) -> Filter {
    Filter::collection(GAME_STATES).where_eq("roomId", room_id)
}

/// First game-state document of the room, if any was written.
pub async fn current_game_state(
    state: &AppState,
    room_id: &str,
) -> Result<Option<GameState>, ServiceError> {
    store_access::first(state, CONTEXT, room_filter(room_id)).await
}

/// Merge `patch` into the room's game state and write the full document.
pub async fn update_game_state(
    state: &AppState,
    room_id: &str,
    patch: GameStatePatch,
) -> Result<GameState, ServiceError> {
    let now = now_millis();
    let existing = current_game_state(state, room_id).await?;
    let base = existing.unwrap_or_else(|| GameState::fresh(room_id, now));
    let next = base.merged(patch, now);

    store_access::write(state, CONTEXT, vec![store_access::put(&next)?]).await?;
    debug!(room_id, phase = ?next.phase, "game state updated");
    Ok(next)
}

/// Mark the room as playing.
pub async fn start_game(state: &AppState, room_id: &str) -> Result<GameState, ServiceError> {
    info!(room_id, "game started");
    update_game_state(state, room_id, GameStatePatch::phase(GamePhase::Playing)).await
}

/// Back to idle; turn, category and payload are removed.
pub async fn end_game(state: &AppState, room_id: &str) -> Result<GameState, ServiceError> {
    info!(room_id, "game ended");
    update_game_state(state, room_id, GameStatePatch::reset()).await
}

/// Hand the turn to `user_id`.
pub async fn set_turn(
    state: &AppState,
    room_id: &str,
    user_id: &str,
) -> Result<GameState, ServiceError> {
    update_game_state(state, room_id, GameStatePatch::turn(user_id)).await
}

/// Change the current category.
pub async fn set_category(
    state: &AppState,
    room_id: &str,
    category: &str,
) -> Result<GameState, ServiceError> {
    update_game_state(state, room_id, GameStatePatch::category(category)).await
}

/// Replace the game-specific payload.
pub async fn set_payload(
    state: &AppState,
    room_id: &str,
    payload: GamePayload,
) -> Result<GameState, ServiceError> {
    update_game_state(state, room_id, GameStatePatch::default().with_payload(payload)).await
}

/// Deletes for every game-state document of the room.
pub(crate) async fn delete_ops(state: &AppState, room_id: &str) -> Result<Vec<WriteOp>, ServiceError> {
    let documents: Vec<GameState> = store_access::query(state, CONTEXT, room_filter(room_id)).await?;
    Ok(documents
        .into_iter()
        .map(|doc| WriteOp::delete(GAME_STATES, doc.id))
        .collect())
}
