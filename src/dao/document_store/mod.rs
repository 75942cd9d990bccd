//! Shared document store contract.
//!
//! Documents are schemaless JSON objects grouped in collections and
//! addressed by a stable id. Every write replaces a whole document (or
//! deletes it); there is no field-level patching, so callers merge against
//! a fresh read before writing.

#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use std::{cmp::Ordering, sync::Arc};

use futures::{Stream, future::BoxFuture};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::dao::storage::{StorageError, StorageResult};

/// Capacity of the change feed shared by every subscriber.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// One stored document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Collection the document belongs to.
    pub collection: String,
    /// Stable id inside the collection.
    pub id: String,
    /// JSON object holding the fields.
    pub body: Value,
}

impl Document {
    /// Serialize a typed value into a document.
    pub fn encode<T: Serialize>(
        collection: impl Into<String>,
        id: impl Into<String>,
        value: &T,
    ) -> StorageResult<Self> {
        let collection = collection.into();
        let id = id.into();
        let body = serde_json::to_value(value)
            .map_err(|source| StorageError::corrupt(collection.clone(), id.clone(), source))?;
        Ok(Self {
            collection,
            id,
            body,
        })
    }

    /// Deserialize the body into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> StorageResult<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|source| StorageError::corrupt(self.collection.clone(), self.id.clone(), source))
    }

    /// Field of the body, if present.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.body.get(name)
    }
}

/// Predicate over document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value.
    Eq(String, Value),
    /// Field equals one of the values.
    In(String, Vec<Value>),
    /// Array field contains the value.
    Contains(String, Value),
    /// Every nested condition holds.
    All(Vec<Condition>),
    /// At least one nested condition holds.
    Any(Vec<Condition>),
}

impl Condition {
    /// `field == value`.
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Condition::Eq(field.to_string(), value.into())
    }

    /// `field ∈ values`.
    pub fn is_in<V: Into<Value>>(field: &str, values: impl IntoIterator<Item = V>) -> Self {
        Condition::In(field.to_string(), values.into_iter().map(Into::into).collect())
    }

    /// `value ∈ field`.
    pub fn contains(field: &str, value: impl Into<Value>) -> Self {
        Condition::Contains(field.to_string(), value.into())
    }

    /// Whether the condition holds for `document`.
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Condition::Eq(field, value) => document.field(field) == Some(value),
            Condition::In(field, values) => document
                .field(field)
                .is_some_and(|found| values.contains(found)),
            Condition::Contains(field, value) => document
                .field(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
            Condition::All(conditions) => conditions.iter().all(|c| c.matches(document)),
            Condition::Any(conditions) => conditions.iter().any(|c| c.matches(document)),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// Query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Collection to read.
    pub collection: String,
    /// Conditions, all of which must hold.
    pub conditions: Vec<Condition>,
    /// Sort key and direction.
    pub order_by: Option<(String, Direction)>,
    /// Maximum number of documents returned.
    pub limit: Option<usize>,
}

impl Filter {
    /// Every document of `collection`.
    pub fn collection(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            conditions: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Add a condition.
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Shorthand for an equality condition.
    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.when(Condition::eq(field, value))
    }

    /// Sort the result.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    /// Cap the result size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `document` belongs to the result set, ignoring order and limit.
    pub fn matches(&self, document: &Document) -> bool {
        document.collection == self.collection
            && self.conditions.iter().all(|c| c.matches(document))
    }

    /// Filter, sort and truncate candidate documents.
    pub fn apply(&self, documents: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|document| self.matches(document))
            .collect();

        match &self.order_by {
            Some((field, direction)) => selected.sort_by(|a, b| {
                let ordering = compare_values(a.field(field), b.field(field))
                    .then_with(|| a.id.cmp(&b.id));
                match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                }
            }),
            // Stable output for unordered queries.
            None => selected.sort_by(|a, b| a.id.cmp(&b.id)),
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Missing values sort first, numbers before strings before anything else.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// One write inside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or fully replace a document.
    Put(Document),
    /// Remove a document; missing documents are ignored.
    Delete {
        /// Collection of the document.
        collection: String,
        /// Document id.
        id: String,
    },
}

impl WriteOp {
    /// Delete `collection/id`.
    pub fn delete(collection: &str, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection: collection.to_string(),
            id: id.into(),
        }
    }

    /// Collection touched by the write.
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Put(document) => &document.collection,
            WriteOp::Delete { collection, .. } => collection,
        }
    }
}

/// Committed change pushed to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Document created or replaced.
    Upserted(Document),
    /// Document removed.
    Deleted {
        /// Collection of the document.
        collection: String,
        /// Document id.
        id: String,
    },
}

impl Change {
    /// Collection touched by the change.
    pub fn collection(&self) -> &str {
        match self {
            Change::Upserted(document) => &document.collection,
            Change::Deleted { collection, .. } => collection,
        }
    }
}

impl From<WriteOp> for Change {
    fn from(op: WriteOp) -> Self {
        match op {
            WriteOp::Put(document) => Change::Upserted(document),
            WriteOp::Delete { collection, id } => Change::Deleted { collection, id },
        }
    }
}

/// Abstraction over the shared real-time document store.
pub trait DocumentStore: Send + Sync {
    /// Read the documents matching `filter` once.
    fn query_once(&self, filter: Filter) -> BoxFuture<'static, StorageResult<Vec<Document>>>;
    /// Apply every write as one batch.
    ///
    /// Backends without multi-document transactions may commit part of a
    /// failed batch; the committed part still reaches [`subscribe`](Self::subscribe).
    fn transact(&self, ops: Vec<WriteOp>) -> BoxFuture<'static, StorageResult<()>>;
    /// Feed of committed changes, in commit order.
    fn subscribe(&self) -> broadcast::Receiver<Change>;
    /// Cheap liveness probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failure.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Live result set of `filter`: the current documents, then a fresh result
/// every time a change touches the filtered collection.
///
/// Lagging behind the change feed only triggers an extra re-query; a failed
/// query is yielded and the stream keeps watching.
pub fn live_query(
    store: Arc<dyn DocumentStore>,
    filter: Filter,
    source: String,
) -> impl Stream<Item = StorageResult<Vec<Document>>> + Send + 'static {
    async_stream::stream! {
        let mut changes = store.subscribe();
        info!(source = %source, collection = %filter.collection, "subscription started");

        let mut last: Option<Vec<Document>> = None;
        loop {
            match store.query_once(filter.clone()).await {
                Ok(documents) => {
                    if last.as_ref() != Some(&documents) {
                        debug!(source = %source, count = documents.len(), "subscription data");
                        last = Some(documents.clone());
                        yield Ok(documents);
                    }
                }
                Err(err) => {
                    warn!(source = %source, error = %err, "subscription error");
                    yield Err(err);
                }
            }

            loop {
                match changes.recv().await {
                    Ok(change) if change.collection() == filter.collection => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(source = %source, skipped, "subscription lagged; re-querying");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!(source = %source, "subscription closed");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, body: Value) -> Document {
        Document {
            collection: "rooms".into(),
            id: id.into(),
            body,
        }
    }

    #[test]
    fn conditions_cover_membership_and_alternatives() {
        let room = doc("r1", json!({"members": ["a", "b"], "status": "open", "createdAt": 3}));
        assert!(Condition::contains("members", "b").matches(&room));
        assert!(!Condition::contains("members", "c").matches(&room));
        assert!(Condition::is_in("status", ["finished", "open"]).matches(&room));
        assert!(
            Condition::Any(vec![
                Condition::eq("status", "finished"),
                Condition::All(vec![
                    Condition::eq("createdAt", 3),
                    Condition::contains("members", "a"),
                ]),
            ])
            .matches(&room)
        );
        assert!(!Condition::eq("missing", "x").matches(&room));
    }

    #[test]
    fn apply_sorts_and_limits() {
        let docs = vec![
            doc("a", json!({"createdAt": 5})),
            doc("b", json!({"createdAt": 9})),
            doc("c", json!({"createdAt": 1})),
            Document {
                collection: "messages".into(),
                id: "m".into(),
                body: json!({"createdAt": 100}),
            },
        ];
        let filter = Filter::collection("rooms")
            .order_by("createdAt", Direction::Desc)
            .limit(2);
        let ids: Vec<_> = filter.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn missing_sort_keys_come_first() {
        let docs = vec![doc("a", json!({"n": 2})), doc("b", json!({}))];
        let filter = Filter::collection("rooms").order_by("n", Direction::Asc);
        let ids: Vec<_> = filter.apply(docs).into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
