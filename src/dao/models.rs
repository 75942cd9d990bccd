use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utoipa::ToSchema;

use crate::state::game_state::GameState;

/// Collection of room documents.
pub const ROOMS: &str = "rooms";
/// Collection of game-state documents.
pub const GAME_STATES: &str = "game_states";
/// Collection of chat messages.
pub const MESSAGES: &str = "messages";
/// Collection of user profiles.
pub const USERS: &str = "users";
/// Collection of friend requests.
pub const FRIEND_REQUESTS: &str = "friend_requests";

/// A typed document living in a fixed collection.
pub trait Entity: Serialize + DeserializeOwned + Send + 'static {
    /// Collection holding this kind of document.
    const COLLECTION: &'static str;

    /// Document id.
    fn id(&self) -> &str;
}

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Id of the form `<prefix>_<millis>_<0..=1e6>`.
pub fn timestamped_id(prefix: &str) -> String {
    let salt = rand::rng().random_range(0..=1_000_000u32);
    format!("{prefix}_{}_{salt}", now_millis())
}

/// Lifecycle label of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RoomStatus {
    /// Accepting players.
    Open,
    /// A game is running.
    InProgress,
    /// Over.
    Finished,
}

/// Guest seated in a room without an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LocalPlayerEntity {
    /// Display name.
    pub name: String,
}

/// Shared room document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomEntity {
    /// `room_<millis>_<rand>`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// User who created the room; always a member.
    pub created_by: String,
    /// Member user ids, without duplicates.
    pub members: Vec<String>,
    /// Guests playing on a member's device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_players: Option<Vec<LocalPlayerEntity>>,
    /// Unix millis.
    pub created_at: u64,
    /// Listed on the public dashboard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    /// Lifecycle label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoomStatus>,
    /// Seat limit for members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_players: Option<u32>,
}

impl Entity for RoomEntity {
    const COLLECTION: &'static str = ROOMS;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageEntity {
    /// `msg_<millis>_<rand>`.
    pub id: String,
    /// Room the message was posted in.
    pub room_id: String,
    /// Author.
    pub sender_id: String,
    /// Trimmed, non-empty text.
    pub text: String,
    /// Unix millis.
    pub created_at: u64,
    /// Optional expiry, unix millis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Entity for MessageEntity {
    const COLLECTION: &'static str = MESSAGES;

    fn id(&self) -> &str {
        &self.id
    }
}

/// User profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// Identity provider id.
    pub id: String,
    /// Email, for magic-code accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// E.164 phone, for OTP accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Public nickname, unique ignoring case.
    pub nickname: String,
    /// Lowercase mirror of `nickname` used for lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname_lower: Option<String>,
    /// Unix millis.
    pub created_at: u64,
    /// Leaderboard counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games_played: Option<u32>,
    /// Leaderboard counter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games_won: Option<u32>,
    /// Leaderboard score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<i64>,
}

impl Entity for UserEntity {
    const COLLECTION: &'static str = USERS;

    fn id(&self) -> &str {
        &self.id
    }
}

/// State of a friend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    /// Waiting for the recipient.
    Pending,
    /// Both users are friends.
    Accepted,
    /// Declined by the recipient.
    Rejected,
}

impl FriendRequestStatus {
    /// Stored string value.
    pub fn as_str(self) -> &'static str {
        match self {
            FriendRequestStatus::Pending => "pending",
            FriendRequestStatus::Accepted => "accepted",
            FriendRequestStatus::Rejected => "rejected",
        }
    }
}

/// Friend request between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestEntity {
    /// `fr_<millis>_<rand>`.
    pub id: String,
    /// Sender.
    pub from_user: String,
    /// Recipient.
    pub to_user: String,
    /// Current state.
    pub status: FriendRequestStatus,
    /// Unix millis.
    pub created_at: u64,
}

impl Entity for FriendRequestEntity {
    const COLLECTION: &'static str = FRIEND_REQUESTS;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for GameState {
    const COLLECTION: &'static str = GAME_STATES;

    fn id(&self) -> &str {
        &self.id
    }
}
