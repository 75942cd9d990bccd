use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the document store and the network probe, then summarise.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "document store health check failed");
            }
        }
        None => warn!("document store unavailable (degraded mode)"),
    }

    if state.is_degraded().await {
        return HealthResponse::degraded();
    }
    if state.connectivity().is_reachable().await == Some(false) {
        return HealthResponse::offline();
    }
    HealthResponse::ok()
}
