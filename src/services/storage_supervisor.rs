use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{document_store::DocumentStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the document store and keep the shared state in degraded mode while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn DocumentStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_store(store.clone()).await;
                info!("document store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                if !watch_store(&state, store.as_ref()).await {
                    warn!("exhausted document store reconnect attempts; staying in degraded mode");
                    state.clear_store().await;
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "document store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it fails for good. Returns `false` once the
/// reconnect attempts are exhausted.
async fn watch_store(state: &SharedState, store: &dyn DocumentStore) -> bool {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("document store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "document store health check failed");
                if !reconnect(state, store).await {
                    return false;
                }
                state.update_degraded(false).await;
                sleep(HEALTH_POLL_INTERVAL).await;
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn DocumentStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "document store reconnected after health check failure");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %err,
                        "document store reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "document store reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}
