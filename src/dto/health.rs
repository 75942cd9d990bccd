use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, PartialEq, Eq, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok", "degraded" or "offline").
    pub status: String,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
        }
    }

    /// The store answers but the network probe says we are cut off.
    pub fn offline() -> Self {
        Self {
            status: "offline".to_string(),
        }
    }
}
