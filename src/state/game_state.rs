//! Shared per-room game-state document and its merge rules.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::games::{hot_seat::Verdict, trap::TrapSkin};

/// Coarse phase of the room's game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    /// No mini-game is running.
    #[default]
    Idle,
    /// A mini-game is running.
    Playing,
}

/// Game-specific extra state, tagged by the mini-game that wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum GamePayload {
    /// Outcome of the last bottle spin.
    #[serde(rename_all = "camelCase")]
    Spin {
        /// Player the bottle pointed at.
        player_id: String,
        /// Prompt drawn for that player.
        prompt: Option<String>,
    },
    /// Hot-seat turn info.
    #[serde(rename_all = "camelCase")]
    HotSeat {
        /// Player currently in the seat.
        player_id: String,
        /// Verdict on the previous player, if any.
        last_verdict: Option<Verdict>,
    },
    /// Trap grid progress.
    #[serde(rename_all = "camelCase")]
    Trap {
        /// Which skin of the trap game is on the table.
        skin: TrapSkin,
        /// Pads revealed as safe so far.
        safe_pads: Vec<usize>,
        /// Player who hit the trap, once the round is over.
        loser: Option<String>,
    },
    /// Categories round.
    #[serde(rename_all = "camelCase")]
    Categories {
        /// Selected category title.
        category: String,
        /// Rolled letter, once the roll settled.
        #[schema(value_type = Option<String>)]
        letter: Option<char>,
    },
}

/// Shared game-state document; one per room by convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Document id, `game_<roomId>` for synthesized documents.
    pub id: String,
    /// Owning room.
    pub room_id: String,
    /// Coarse phase.
    #[serde(default)]
    pub phase: GamePhase,
    /// Whose turn it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_user: Option<String>,
    /// Current category or topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Game-specific extra state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<GamePayload>,
    /// Unix millis of the last write.
    pub updated_at: u64,
}

/// Id used when a room has no game-state document yet.
pub fn default_game_state_id(room_id: &str) -> String {
    format!("game_{room_id}")
}

impl GameState {
    /// Default document for a room that never wrote one.
    pub fn fresh(room_id: &str, now: u64) -> Self {
        Self {
            id: default_game_state_id(room_id),
            room_id: room_id.to_string(),
            phase: GamePhase::Idle,
            turn_user: None,
            category: None,
            payload: None,
            updated_at: now,
        }
    }

    /// Shallow-merge `patch` over this document.
    ///
    /// `id` and `room_id` never change, unspecified fields are kept, and
    /// `updated_at` is stamped with `now`.
    pub fn merged(mut self, patch: GameStatePatch, now: u64) -> Self {
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        patch.turn_user.apply(&mut self.turn_user);
        patch.category.apply(&mut self.category);
        patch.payload.apply(&mut self.payload);
        self.updated_at = now;
        self
    }
}

/// Change to a single optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldPatch<T> {
    /// Leave the field alone.
    #[default]
    Keep,
    /// Overwrite the field.
    Set(T),
    /// Remove the field.
    Clear,
}

impl<T> FieldPatch<T> {
    fn apply(self, slot: &mut Option<T>) {
        match self {
            FieldPatch::Keep => {}
            FieldPatch::Set(value) => *slot = Some(value),
            FieldPatch::Clear => *slot = None,
        }
    }
}

impl<T> From<Option<T>> for FieldPatch<T> {
    /// `Some` overwrites, `None` clears.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => FieldPatch::Set(value),
            None => FieldPatch::Clear,
        }
    }
}

/// Partial update of a [`GameState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameStatePatch {
    /// New phase, if any.
    pub phase: Option<GamePhase>,
    /// Turn holder change.
    pub turn_user: FieldPatch<String>,
    /// Category change.
    pub category: FieldPatch<String>,
    /// Payload change.
    pub payload: FieldPatch<GamePayload>,
}

impl GameStatePatch {
    /// Only move the turn.
    pub fn turn(user_id: impl Into<String>) -> Self {
        Self {
            turn_user: FieldPatch::Set(user_id.into()),
            ..Self::default()
        }
    }

    /// Only change the category.
    pub fn category(category: impl Into<String>) -> Self {
        Self {
            category: FieldPatch::Set(category.into()),
            ..Self::default()
        }
    }

    /// Only change the phase.
    pub fn phase(phase: GamePhase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Back to idle with every game-specific field removed.
    pub fn reset() -> Self {
        Self {
            phase: Some(GamePhase::Idle),
            turn_user: FieldPatch::Clear,
            category: FieldPatch::Clear,
            payload: FieldPatch::Clear,
        }
    }

    /// Also overwrite the payload.
    pub fn with_payload(mut self, payload: GamePayload) -> Self {
        self.payload = FieldPatch::Set(payload);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_doc() -> GameState {
        GameState {
            id: "game_r1".into(),
            room_id: "r1".into(),
            phase: GamePhase::Playing,
            turn_user: Some("u1".into()),
            category: Some("Animals".into()),
            payload: None,
            updated_at: 10,
        }
    }

    #[test]
    fn merge_only_touches_patched_fields() {
        let merged = playing_doc().merged(GameStatePatch::turn("u2"), 99);
        assert_eq!(
            merged,
            GameState {
                turn_user: Some("u2".into()),
                updated_at: 99,
                ..playing_doc()
            }
        );
    }

    #[test]
    fn reset_patch_clears_game_fields() {
        let merged = playing_doc()
            .merged(GameStatePatch::category("Movies").with_payload(GamePayload::Categories {
                category: "Movies".into(),
                letter: Some('Q'),
            }), 20)
            .merged(GameStatePatch::reset(), 30);
        assert_eq!(merged.phase, GamePhase::Idle);
        assert_eq!(merged.turn_user, None);
        assert_eq!(merged.category, None);
        assert_eq!(merged.payload, None);
        assert_eq!(merged.id, "game_r1");
    }

    #[test]
    fn fresh_document_defaults_to_idle() {
        let doc = GameState::fresh("r9", 5).merged(GameStatePatch::category("Animals"), 6);
        assert_eq!(doc.id, "game_r9");
        assert_eq!(doc.phase, GamePhase::Idle);
        assert_eq!(doc.category.as_deref(), Some("Animals"));
    }

    #[test]
    fn payload_is_tagged_by_game() {
        let payload = GamePayload::Spin {
            player_id: "u3".into(),
            prompt: Some("Wildcard: everybody drinks!".into()),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["game"], "spin");
        assert_eq!(value["playerId"], "u3");
        let back: GamePayload = serde_json::from_value(value).unwrap();
        assert_eq!(back, payload);
    }
}
