use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::game_state::{FieldPatch, GamePayload, GamePhase, GameStatePatch};

/// Tells a missing field (`None`) apart from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn field_patch<T>(value: Option<Option<T>>) -> FieldPatch<T> {
    match value {
        None => FieldPatch::Keep,
        Some(value) => value.into(),
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Body of `PATCH /rooms/{id}/game-state`.
///
/// Missing fields are kept, `null` removes them.
pub struct GameStatePatchRequest {
    /// New phase.
    #[serde(default)]
    pub phase: Option<GamePhase>,
    /// Turn holder.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    #[validate(length(min = 1, max = 128))]
    pub turn_user: Option<Option<String>>,
    /// Current category.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    #[validate(length(min = 1, max = 120))]
    pub category: Option<Option<String>>,
    /// Game-specific payload.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<GamePayload>)]
    pub payload: Option<Option<GamePayload>>,
}

impl From<GameStatePatchRequest> for GameStatePatch {
    fn from(value: GameStatePatchRequest) -> Self {
        GameStatePatch {
            phase: value.phase,
            turn_user: field_patch(value.turn_user),
            category: field_patch(value.category),
            payload: field_patch(value.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_clears_and_missing_keeps() {
        let request: GameStatePatchRequest =
            serde_json::from_value(serde_json::json!({"turnUser": "u2", "category": null}))
                .unwrap();
        assert!(request.validate().is_ok());

        let patch = GameStatePatch::from(request);
        assert_eq!(patch.phase, None);
        assert_eq!(patch.turn_user, FieldPatch::Set("u2".to_string()));
        assert_eq!(patch.category, FieldPatch::Clear);
        assert_eq!(patch.payload, FieldPatch::Keep);
    }

    #[test]
    fn blank_turn_holders_are_rejected() {
        let request: GameStatePatchRequest =
            serde_json::from_value(serde_json::json!({"turnUser": ""})).unwrap();
        assert!(request.validate().is_err());
    }
}
