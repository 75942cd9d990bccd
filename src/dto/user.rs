use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::{FriendRequestEntity, UserEntity},
    dto::validation::validate_not_blank,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload used to claim a nickname.
pub struct NicknameRequest {
    /// Wanted nickname; surrounding whitespace is dropped.
    #[validate(length(max = 40))]
    pub nickname: String,
    /// Email of a magic-code account.
    #[serde(default)]
    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
/// Query of `GET /users/me`.
pub struct MeQuery {
    /// Nickname to claim when the profile does not exist yet.
    #[serde(default)]
    pub nickname: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Query of `GET /users/search`.
pub struct SearchQuery {
    /// Nickname to look up, matched ignoring case.
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
/// Query of `GET /users/leaderboard`.
pub struct LeaderboardQuery {
    /// Number of entries, 20 by default.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
/// A generated nickname suggestion.
pub struct NicknameSuggestion {
    /// Suggested nickname.
    pub nickname: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Leaderboard row.
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: usize,
    /// User id.
    pub user_id: String,
    /// Nickname.
    pub nickname: String,
    /// Score.
    pub total_points: i64,
    /// Wins.
    pub games_won: u32,
    /// Games played.
    pub games_played: u32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload used to send a friend request.
pub struct FriendRequestInput {
    /// Recipient.
    #[validate(custom(function = "validate_not_blank"))]
    pub to_user_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Pending requests addressed to the caller with their senders' profiles.
pub struct IncomingRequests {
    /// Requests, oldest first.
    pub requests: Vec<FriendRequestEntity>,
    /// Sender profiles keyed by user id.
    pub requestors: std::collections::HashMap<String, UserEntity>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friend_request_needs_a_recipient() {
        let input = FriendRequestInput {
            to_user_id: " ".into(),
        };
        assert!(input.validate().is_err());
    }
}
