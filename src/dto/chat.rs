use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
/// Payload used to post a chat message.
pub struct SendMessageRequest {
    /// Message text; blank messages are dropped silently.
    #[validate(length(max = 2000))]
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
/// Query of `GET /rooms/{id}/messages`.
pub struct MessagesQuery {
    /// Window size, 50 by default.
    #[serde(default)]
    #[validate(range(min = 1, max = 200))]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Result of a chat purge.
pub struct RemovedMessages {
    /// Messages deleted by this call.
    pub removed: usize,
}
