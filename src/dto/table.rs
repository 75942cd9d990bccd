use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::validation::validate_names,
    games::{
        categories::CategoriesCommand,
        hot_seat::{HotSeatCommand, Verdict},
        session::GroupMode,
        spin::SpinCommand,
        trap::{TrapCommand, TrapSkin},
    },
    state::tables::{TableCommand, TableInfo, TableKind, TableSnapshot},
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload used to start a mini-game in a room.
pub struct StartTableRequest {
    /// Game to run.
    pub kind: TableKind,
    /// Trap flavour; the configured default when missing.
    #[serde(default)]
    pub skin: Option<TrapSkin>,
    /// How the group was assembled.
    #[serde(default)]
    pub mode: Option<GroupMode>,
    /// Extra guests seated after the room's players.
    #[serde(default)]
    #[validate(custom(function = "validate_names"), length(max = 16))]
    pub guests: Vec<String>,
    /// Mirror turns and categories into the room's game state.
    #[serde(default = "default_sync")]
    pub sync: bool,
}

fn default_sync() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
/// Spin table input.
pub enum SpinAction {
    /// Spin the bottle.
    Spin,
    /// Close the prompt card.
    Dismiss,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
/// Hot-seat table input.
pub enum HotSeatAction {
    /// Pick the next player at random.
    Roll,
    /// Start the round timer.
    StartTimer,
    /// Put the timer back to full.
    ResetTimer,
    /// Judge the player in the seat.
    Resolve {
        /// Outcome.
        verdict: Verdict,
    },
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
/// Trap table input.
pub enum TrapAction {
    /// Reveal a pad.
    Tap {
        /// Pad index, row major.
        pad: usize,
    },
    /// New round with a new trap.
    ResetRound,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
/// Categories table input.
pub enum CategoriesAction {
    /// Pick a category and roll a letter.
    Select {
        /// Index in the category deck.
        index: usize,
    },
    /// Pause or resume the countdown.
    ToggleTimer,
    /// Back to the category picker.
    NextRound,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(tag = "game", content = "command", rename_all = "snake_case")]
/// Command posted to `POST /rooms/{id}/table/commands`.
pub enum TableCommandRequest {
    /// Spin table input.
    Spin(SpinAction),
    /// Hot-seat table input.
    HotSeat(HotSeatAction),
    /// Trap table input.
    Trap(TrapAction),
    /// Categories table input.
    Categories(CategoriesAction),
}

impl From<TableCommandRequest> for TableCommand {
    fn from(value: TableCommandRequest) -> Self {
        match value {
            TableCommandRequest::Spin(action) => TableCommand::Spin(match action {
                SpinAction::Spin => SpinCommand::Spin,
                SpinAction::Dismiss => SpinCommand::Dismiss,
            }),
            TableCommandRequest::HotSeat(action) => TableCommand::HotSeat(match action {
                HotSeatAction::Roll => HotSeatCommand::Roll,
                HotSeatAction::StartTimer => HotSeatCommand::StartTimer,
                HotSeatAction::ResetTimer => HotSeatCommand::ResetTimer,
                HotSeatAction::Resolve { verdict } => HotSeatCommand::Resolve(verdict),
            }),
            TableCommandRequest::Trap(action) => TableCommand::Trap(match action {
                TrapAction::Tap { pad } => TrapCommand::Tap(pad),
                TrapAction::ResetRound => TrapCommand::ResetRound,
            }),
            TableCommandRequest::Categories(action) => TableCommand::Categories(match action {
                CategoriesAction::Select { index } => CategoriesCommand::Select(index),
                CategoriesAction::ToggleTimer => CategoriesCommand::ToggleTimer,
                CategoriesAction::NextRound => CategoriesCommand::NextRound,
            }),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Table description with its latest snapshot.
pub struct TableView {
    /// Who plays what.
    pub table: TableInfo,
    /// Live game state, tagged by `game`.
    #[schema(value_type = Object)]
    pub snapshot: TableSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// SSE payload of the `table` event.
pub struct TableEvent {
    /// Table instance that produced the snapshot.
    pub table_id: Uuid,
    /// Live game state, tagged by `game`.
    #[schema(value_type = Object)]
    pub snapshot: TableSnapshot,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// SSE payload of the `table_closed` event.
pub struct TableClosedEvent {
    /// Table instance that went away.
    pub table_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_tagged_by_game_and_action() {
        let request: TableCommandRequest = serde_json::from_value(serde_json::json!({
            "game": "hot_seat",
            "command": {"action": "resolve", "verdict": "drink"}
        }))
        .unwrap();
        assert_eq!(
            TableCommand::from(request),
            TableCommand::HotSeat(HotSeatCommand::Resolve(Verdict::Drink))
        );

        let request: TableCommandRequest = serde_json::from_value(serde_json::json!({
            "game": "trap",
            "command": {"action": "tap", "pad": 4}
        }))
        .unwrap();
        assert_eq!(TableCommand::from(request), TableCommand::Trap(TrapCommand::Tap(4)));
    }

    #[test]
    fn start_request_defaults_to_syncing() {
        let request: StartTableRequest =
            serde_json::from_value(serde_json::json!({"kind": "categories"})).unwrap();
        assert!(request.sync);
        assert!(request.guests.is_empty());
        assert!(request.validate().is_ok());
    }
}
