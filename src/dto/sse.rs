use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::MessageEntity;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// SSE event name.
    pub event: Option<String>,
    /// Serialized payload.
    pub data: String,
}

impl ServerEvent {
    /// Event carrying a raw data field.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Room the stream is bound to.
    pub room_id: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the backend is running without a storage backend connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Current degraded flag.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
/// Latest chat window of the room.
pub struct MessagesEvent(pub Vec<MessageEntity>);

#[derive(Debug, Serialize, ToSchema)]
/// Emitted when a store subscription fails; the stream keeps going.
pub struct SubscriptionErrorEvent {
    /// Subscription that failed.
    pub source: String,
    /// User-facing description.
    pub message: String,
}
