//! Typed, connectivity-aware access to the shared document store.
//!
//! Every failing store call is checked once against the connectivity probe:
//! a network-looking failure while the network is known to be down becomes
//! [`ServiceError::Offline`] with a message naming what the user tried to do.
//! Nothing is retried.

use std::future::Future;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{
    dao::{
        connectivity::looks_like_network_error,
        document_store::{Document, Filter, WriteOp},
        models::Entity,
        storage::{StorageError, StorageResult},
    },
    error::ServiceError,
    state::AppState,
};

/// Run a store operation, rewriting offline failures for `context`.
pub async fn guarded<T, F>(state: &AppState, context: &str, operation: F) -> Result<T, ServiceError>
where
    F: Future<Output = StorageResult<T>>,
{
    match operation.await {
        Ok(value) => Ok(value),
        Err(err) => Err(classify(state, context, err).await),
    }
}

/// Map a failed store call to the error shown to the user.
pub(crate) async fn classify(state: &AppState, context: &str, err: StorageError) -> ServiceError {
    if looks_like_network_error(&err.chain_message())
        && state.connectivity().is_reachable().await == Some(false)
    {
        warn!(context, error = %err, "store call failed while offline");
        return ServiceError::Offline(format!("Need an internet connection to {context}."));
    }
    warn!(context, error = %err, "store call failed");
    err.into()
}

/// Every document matching `filter`, decoded as `T`.
pub async fn query<T: DeserializeOwned>(
    state: &AppState,
    context: &str,
    filter: Filter,
) -> Result<Vec<T>, ServiceError> {
    let store = state.require_store().await?;
    let documents = guarded(state, context, store.query_once(filter)).await?;
    documents
        .iter()
        .map(|document| document.decode().map_err(ServiceError::from))
        .collect()
}

/// First document matching `filter`.
pub async fn first<T: DeserializeOwned>(
    state: &AppState,
    context: &str,
    filter: Filter,
) -> Result<Option<T>, ServiceError> {
    Ok(query(state, context, filter.limit(1))
        .await?
        .into_iter()
        .next())
}

/// Entity with the given id.
pub async fn find<T: Entity>(
    state: &AppState,
    context: &str,
    id: &str,
) -> Result<Option<T>, ServiceError> {
    first(state, context, Filter::collection(T::COLLECTION).where_eq("id", id)).await
}

/// Apply `ops` as one batch.
pub async fn write(state: &AppState, context: &str, ops: Vec<WriteOp>) -> Result<(), ServiceError> {
    if ops.is_empty() {
        return Ok(());
    }
    let store = state.require_store().await?;
    guarded(state, context, store.transact(ops)).await
}

/// Full-replacement write of `entity`.
pub fn put<T: Entity>(entity: &T) -> Result<WriteOp, ServiceError> {
    Ok(WriteOp::Put(Document::encode(
        T::COLLECTION,
        entity.id(),
        entity,
    )?))
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{test_support::FailingStore, *};
    use crate::{
        config::AppConfig,
        dao::{
            connectivity::FixedConnectivity,
            models::{ROOMS, RoomEntity},
        },
        state::SharedState,
    };

    async fn failing_state(message: &'static str, reachable: Option<bool>) -> SharedState {
        let state = AppState::new(AppConfig::default(), Arc::new(FixedConnectivity(reachable)));
        state.set_store(Arc::new(FailingStore::new(message))).await;
        state
    }

    #[tokio::test]
    async fn network_failure_while_offline_names_the_action() {
        let state = failing_state("connect ECONNREFUSED 10.0.0.1:5984", Some(false)).await;
        let err = query::<RoomEntity>(&state, "load Loopy rooms", Filter::collection(ROOMS))
            .await
            .unwrap_err();
        match err {
            ServiceError::Offline(message) => {
                assert_eq!(message, "Need an internet connection to load Loopy rooms.")
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_pass_through_unless_known_offline() {
        let online = failing_state("request timed out", Some(true)).await;
        assert!(matches!(
            write(&online, "send chat", vec![WriteOp::delete(ROOMS, "r1")]).await,
            Err(ServiceError::Unavailable(_))
        ));

        let unknown = failing_state("request timed out", None).await;
        assert!(matches!(
            find::<RoomEntity>(&unknown, "load Loopy rooms", "r1").await,
            Err(ServiceError::Unavailable(_))
        ));

        let offline_but_unrelated = failing_state("permission denied", Some(false)).await;
        assert!(matches!(
            find::<RoomEntity>(&offline_but_unrelated, "load Loopy rooms", "r1").await,
            Err(ServiceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn empty_batches_skip_the_store() {
        let state = failing_state("offline", Some(false)).await;
        assert!(write(&state, "update Loopy rooms", Vec::new()).await.is_ok());
    }
}
