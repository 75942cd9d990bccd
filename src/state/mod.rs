pub mod game_state;
mod sse;
pub mod tables;

use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    config::AppConfig,
    dao::{connectivity::Connectivity, document_store::DocumentStore},
    error::ServiceError,
};

pub use self::sse::{RoomHubs, SseHub};
use self::tables::TableRegistry;

/// Shared application state handle.
pub type SharedState = Arc<AppState>;

const ROOM_SSE_CAPACITY: usize = 64;

/// Central application state storing the store handle, SSE hubs and running tables.
pub struct AppState {
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    connectivity: Arc<dyn Connectivity>,
    rooms: RoomHubs,
    tables: TableRegistry,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig, connectivity: Arc<dyn Connectivity>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            config,
            connectivity,
            rooms: RoomHubs::new(ROOM_SSE_CAPACITY),
            tables: TableRegistry::new(),
        })
    }

    /// Obtain a handle to the current document store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current document store, or [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new document store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current document store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Game content configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Network reachability source.
    pub fn connectivity(&self) -> &Arc<dyn Connectivity> {
        &self.connectivity
    }

    /// Per-room SSE hubs.
    pub fn rooms(&self) -> &RoomHubs {
        &self.rooms
    }

    /// Running mini-games.
    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::{
        config::AppConfig,
        dao::{connectivity::FixedConnectivity, document_store::memory::MemoryStore},
    };

    use super::{AppState, SharedState};

    /// State backed by a fresh in-memory store and an online probe.
    pub(crate) async fn memory_state() -> (SharedState, MemoryStore) {
        let store = MemoryStore::new();
        let state = AppState::new(AppConfig::default(), Arc::new(FixedConnectivity::online()));
        state.set_store(Arc::new(store.clone())).await;
        (state, store)
    }
}
