use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::broadcast;

use crate::dao::{
    document_store::{CHANGE_FEED_CAPACITY, Change, Document, DocumentStore, Filter, WriteOp},
    storage::StorageResult,
};

type Key = (String, String);

/// Process-local document store.
///
/// Used when no CouchDB is configured and by tests. Transactions and reads
/// share one gate: a read sees a batch either fully applied or not at all,
/// and the feed carries changes in commit order.
#[derive(Clone)]
pub struct MemoryStore {
    documents: Arc<DashMap<Key, Document>>,
    write_gate: Arc<Mutex<()>>,
    changes: broadcast::Sender<Change>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            documents: Arc::new(DashMap::new()),
            write_gate: Arc::new(Mutex::new(())),
            changes,
        }
    }

    /// Number of stored documents across collections.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, ops: Vec<WriteOp>) {
        let _gate = self.gate();
        let mut committed = Vec::with_capacity(ops.len());
        for op in ops {
            match &op {
                WriteOp::Put(document) => {
                    self.documents.insert(
                        (document.collection.clone(), document.id.clone()),
                        document.clone(),
                    );
                }
                WriteOp::Delete { collection, id } => {
                    if self
                        .documents
                        .remove(&(collection.clone(), id.clone()))
                        .is_none()
                    {
                        continue;
                    }
                }
            }
            committed.push(Change::from(op));
        }
        for change in committed {
            // No subscriber is not an error.
            let _ = self.changes.send(change);
        }
    }
}

impl DocumentStore for MemoryStore {
    fn query_once(&self, filter: Filter) -> BoxFuture<'static, StorageResult<Vec<Document>>> {
        let store = self.clone();
        Box::pin(async move {
            let candidates: Vec<Document> = {
                let _gate = store.gate();
                store
                    .documents
                    .iter()
                    .filter(|entry| entry.key().0 == filter.collection)
                    .map(|entry| entry.value().clone())
                    .collect()
            };
            Ok(filter.apply(candidates))
        })
    }

    fn transact(&self, ops: Vec<WriteOp>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.apply(ops);
            Ok(())
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::document_store::{Direction, live_query};
    use futures::StreamExt;
    use serde_json::json;

    fn message(id: &str, room: &str, at: u64) -> Document {
        Document {
            collection: "messages".into(),
            id: id.into(),
            body: json!({"id": id, "roomId": room, "createdAt": at}),
        }
    }

    #[tokio::test]
    async fn transact_replaces_whole_documents() {
        let store = MemoryStore::new();
        store
            .transact(vec![WriteOp::Put(Document {
                collection: "rooms".into(),
                id: "r1".into(),
                body: json!({"name": "a", "status": "open"}),
            })])
            .await
            .unwrap();
        store
            .transact(vec![WriteOp::Put(Document {
                collection: "rooms".into(),
                id: "r1".into(),
                body: json!({"name": "b"}),
            })])
            .await
            .unwrap();
        let rooms = store.query_once(Filter::collection("rooms")).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].body, json!({"name": "b"}));
    }

    #[tokio::test]
    async fn feed_reports_committed_changes_only() {
        let store = MemoryStore::new();
        let mut feed = store.subscribe();
        store
            .transact(vec![
                WriteOp::Put(message("m1", "r1", 1)),
                WriteOp::delete("messages", "ghost"),
                WriteOp::delete("messages", "m1"),
            ])
            .await
            .unwrap();
        assert!(matches!(feed.recv().await.unwrap(), Change::Upserted(doc) if doc.id == "m1"));
        assert!(matches!(feed.recv().await.unwrap(), Change::Deleted { id, .. } if id == "m1"));
        assert!(feed.try_recv().is_err());
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reads_never_see_half_a_batch() {
        fn pair(round: u64) -> Vec<WriteOp> {
            ["a", "b"]
                .into_iter()
                .map(|id| {
                    WriteOp::Put(Document {
                        collection: "pairs".into(),
                        id: id.into(),
                        body: json!({ "round": round }),
                    })
                })
                .collect()
        }

        let store = MemoryStore::new();
        store.transact(pair(0)).await.unwrap();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for round in 1..=500 {
                    store.transact(pair(round)).await.unwrap();
                }
            })
        };
        for _ in 0..500 {
            let pairs = store.query_once(Filter::collection("pairs")).await.unwrap();
            assert_eq!(pairs.len(), 2);
            assert_eq!(pairs[0].body["round"], pairs[1].body["round"]);
        }
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn live_query_refreshes_on_matching_collection() {
        let store = Arc::new(MemoryStore::new());
        store
            .transact(vec![WriteOp::Put(message("m1", "r1", 1))])
            .await
            .unwrap();

        let filter = Filter::collection("messages")
            .where_eq("roomId", "r1")
            .order_by("createdAt", Direction::Asc);
        let mut live = Box::pin(live_query(store.clone(), filter, "test".into()));

        let first = live.next().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);

        // Other room: re-queried but unchanged, so nothing is yielded for it.
        store
            .transact(vec![WriteOp::Put(message("m2", "r2", 2))])
            .await
            .unwrap();
        store
            .transact(vec![WriteOp::Put(message("m3", "r1", 3))])
            .await
            .unwrap();

        let second = live.next().await.unwrap().unwrap();
        let ids: Vec<_> = second.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m3"]);
    }
}
