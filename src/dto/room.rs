use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{RoomEntity, RoomStatus},
    dto::validation::validate_names,
    games::roster::Player,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload used to open a new room.
pub struct CreateRoomRequest {
    /// Display name; a default name is picked when blank.
    #[serde(default)]
    #[validate(length(max = 80))]
    pub name: Option<String>,
    /// Extra members besides the creator.
    #[serde(default)]
    #[validate(length(max = 32))]
    pub member_ids: Vec<String>,
    /// Guests seated on the creator's device.
    #[serde(default)]
    #[validate(custom(function = "validate_names"), length(max = 16))]
    pub local_players: Option<Vec<String>>,
    /// List the room on the public dashboard.
    #[serde(default)]
    pub is_public: Option<bool>,
    /// Seat limit for members.
    #[serde(default)]
    #[validate(range(min = 1, max = 32))]
    pub max_players: Option<u32>,
    /// Initial lifecycle label.
    #[serde(default)]
    pub status: Option<RoomStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Room together with its resolved seats.
pub struct RoomView {
    /// Stored room.
    #[serde(flatten)]
    pub room: RoomEntity,
    /// Members first, then local guests, in turn order.
    pub roster: Vec<Player>,
}
