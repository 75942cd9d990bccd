use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde_json::from_value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::{
    config::CouchSettings,
    dao::{
        document_store::{CHANGE_FEED_CAPACITY, Change, Document, DocumentStore, Filter, WriteOp},
        storage::StorageResult,
    },
};

use super::{
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, BulkDocsRequest, BulkDocsResult, CouchDocument, END_SUFFIX, KeysRequest,
        collection_prefix, doc_id,
    },
};

const ALL_DOCS: &str = "_all_docs";
const BULK_DOCS: &str = "_bulk_docs";
/// Extra `_bulk_docs` rounds for writes that lost a revision race.
const CONFLICT_RETRIES: usize = 1;

/// Document store backed by a single CouchDB database.
///
/// Every collection lives in the same database under `<collection>::<id>`
/// document ids. Writes overwrite whatever revision is current, so the last
/// writer wins: a write that loses a revision race is retried once against
/// the fresh revision.
///
/// `_bulk_docs` is not atomic. When one write of a batch is refused, the
/// others may already be committed; those are still reported on the change
/// feed and `transact` returns the refusal. The change feed only reports
/// writes made through this process.
#[derive(Clone)]
pub struct CouchStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    changes: broadcast::Sender<Change>,
}

impl CouchStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(settings: &CouchSettings) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(settings.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(settings.database.as_str());
        let auth = settings
            .credentials()
            .map(|(user, pass)| (Arc::<str>::from(user), Arc::<str>::from(pass)));
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        let store = Self {
            client,
            base_url,
            database,
            auth,
            changes,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authed(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authed(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn read_all_docs(&self, builder: reqwest::RequestBuilder) -> CouchResult<AllDocsResponse> {
        let response = builder
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<AllDocsResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            })
    }

    async fn list_collection(&self, collection: &str) -> StorageResult<Vec<Document>> {
        let prefix = collection_prefix(collection);
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let payload = self
            .read_all_docs(self.request(Method::GET, ALL_DOCS).query(&query))
            .await?;

        let mut documents = Vec::new();
        for row in payload.rows {
            let Some(doc) = row.doc else {
                continue;
            };
            let parsed: CouchDocument = from_value(doc).map_err(|source| {
                crate::dao::storage::StorageError::corrupt(collection, row.key.clone(), source)
            })?;
            if let Some(document) = parsed.into_document() {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    /// Current revision of every live document among `doc_ids`.
    async fn current_revs(&self, doc_ids: &[String]) -> CouchResult<HashMap<String, String>> {
        if doc_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let payload = self
            .read_all_docs(
                self.request(Method::POST, ALL_DOCS)
                    .json(&KeysRequest { keys: doc_ids }),
            )
            .await?;

        Ok(payload
            .rows
            .into_iter()
            .filter_map(|row| {
                let value = row.value?;
                (!value.deleted).then_some((row.key, value.rev))
            })
            .collect())
    }

    /// Write `ops`, retrying revision conflicts once.
    async fn bulk_write(&self, ops: &[WriteOp]) -> BulkWrite {
        let mut written = BulkWrite::default();
        let mut pending: Vec<usize> = (0..ops.len()).collect();

        for attempt in 0..=CONFLICT_RETRIES {
            let outcome = match self.bulk_round(ops, &pending).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    written.failure = Some(err);
                    break;
                }
            };
            written.committed.extend(outcome.committed);

            let mut conflicts = Vec::new();
            for (index, result) in outcome.rejected {
                if result.is_conflict() && attempt < CONFLICT_RETRIES {
                    conflicts.push(index);
                } else if written.failure.is_none() {
                    written.failure = Some(result.into_error());
                }
            }
            if conflicts.is_empty() {
                break;
            }
            debug!(conflicts = conflicts.len(), "retrying CouchDB writes against fresh revisions");
            pending = conflicts;
        }

        written
    }

    /// One `_bulk_docs` round over `ops[pending]`.
    async fn bulk_round(&self, ops: &[WriteOp], pending: &[usize]) -> CouchResult<BulkOutcome> {
        let targets: Vec<(usize, &WriteOp)> = pending
            .iter()
            .filter_map(|&index| ops.get(index).map(|op| (index, op)))
            .collect();
        let ids: Vec<String> = targets.iter().map(|(_, op)| couch_id(op)).collect();
        let mut revs = self.current_revs(&ids).await?;

        let mut outcome = BulkOutcome::default();
        let mut sent = Vec::with_capacity(targets.len());
        let mut docs = Vec::with_capacity(targets.len());
        for ((index, op), id) in targets.into_iter().zip(ids) {
            match op {
                WriteOp::Put(document) => {
                    let rev = revs.remove(&id);
                    docs.push(CouchDocument::from_document(document.clone(), rev));
                    sent.push(index);
                }
                WriteOp::Delete { .. } => match revs.remove(&id) {
                    Some(rev) => {
                        docs.push(CouchDocument::tombstone(id, rev));
                        sent.push(index);
                    }
                    // Already gone.
                    None => outcome.committed.push(index),
                },
            }
        }
        if docs.is_empty() {
            return Ok(outcome);
        }

        let response = self
            .request(Method::POST, BULK_DOCS)
            .json(&BulkDocsRequest { docs })
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: BULK_DOCS.to_string(),
                status: response.status(),
            });
        }

        let results = response
            .json::<Vec<BulkDocsResult>>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: BULK_DOCS.to_string(),
                source,
            })?;

        let settled = settle(&sent, results);
        outcome.committed.extend(settled.committed);
        outcome.rejected = settled.rejected;
        Ok(outcome)
    }
}

fn couch_id(op: &WriteOp) -> String {
    match op {
        WriteOp::Put(document) => doc_id(&document.collection, &document.id),
        WriteOp::Delete { collection, id } => doc_id(collection, id),
    }
}

/// Per-op result of one `_bulk_docs` round, by index into the batch.
#[derive(Debug, Default)]
struct BulkOutcome {
    committed: Vec<usize>,
    rejected: Vec<(usize, BulkDocsResult)>,
}

/// Everything a batch managed to write, and the first reason it stopped.
#[derive(Debug, Default)]
struct BulkWrite {
    committed: Vec<usize>,
    failure: Option<CouchDaoError>,
}

/// Pair `_bulk_docs` results, returned in request order, with the ops sent.
fn settle(sent: &[usize], results: Vec<BulkDocsResult>) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let mut results = results.into_iter();
    for &index in sent {
        match results.next() {
            Some(result) if result.error.is_none() => outcome.committed.push(index),
            Some(result) => outcome.rejected.push((index, result)),
            None => outcome.rejected.push((index, BulkDocsResult::missing())),
        }
    }
    outcome
}

impl DocumentStore for CouchStore {
    fn query_once(&self, filter: Filter) -> BoxFuture<'static, StorageResult<Vec<Document>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents = store.list_collection(&filter.collection).await?;
            Ok(filter.apply(documents))
        })
    }

    fn transact(&self, ops: Vec<WriteOp>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut written = store.bulk_write(&ops).await;
            written.committed.sort_unstable();
            let committed = written.committed.len();
            for index in written.committed {
                if let Some(op) = ops.get(index) {
                    let _ = store.changes.send(Change::from(op.clone()));
                }
            }

            match written.failure {
                Some(err) => {
                    warn!(error = %err, ops = ops.len(), committed, "CouchDB batch failed");
                    Err(err.into())
                }
                None => Ok(()),
            }
        })
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authed(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Mutex};

    use axum::{
        Json, Router,
        extract::State,
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;

    /// Minimal in-process CouchDB speaking `_all_docs` and `_bulk_docs`.
    #[derive(Default)]
    struct FakeCouch {
        docs: HashMap<String, (u32, Value)>,
        /// Ids another writer updates right before our next write lands.
        raced: HashSet<String>,
        /// Ids refused with `forbidden`.
        forbidden: HashSet<String>,
        bulk_calls: usize,
    }

    type Fake = Arc<Mutex<FakeCouch>>;

    fn rev_of(fake: &FakeCouch, id: &str) -> Option<String> {
        fake.docs.get(id).map(|(rev, _)| format!("{rev}-fake"))
    }

    async fn all_docs(State(fake): State<Fake>, Json(body): Json<Value>) -> Json<Value> {
        let fake = fake.lock().unwrap();
        let rows: Vec<Value> = body["keys"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(|key| match rev_of(&fake, key) {
                Some(rev) => json!({"key": key, "id": key, "value": {"rev": rev}}),
                None => json!({"key": key, "error": "not_found"}),
            })
            .collect();
        Json(json!({ "rows": rows }))
    }

    async fn bulk_docs(State(fake): State<Fake>, Json(body): Json<Value>) -> Json<Value> {
        let mut fake = fake.lock().unwrap();
        fake.bulk_calls += 1;
        let mut results = Vec::new();
        for doc in body["docs"].as_array().into_iter().flatten() {
            let id = doc["_id"].as_str().unwrap_or_default().to_string();
            if fake.forbidden.contains(&id) {
                results.push(json!({"id": id, "error": "forbidden", "reason": "read only"}));
                continue;
            }
            if fake.raced.remove(&id) {
                let rev = fake.docs.get(&id).map_or(0, |(rev, _)| *rev) + 1;
                fake.docs.insert(id.clone(), (rev, json!({"writer": "other"})));
            }
            if doc["_rev"].as_str().map(String::from) != rev_of(&fake, &id) {
                results.push(json!({"id": id, "error": "conflict", "reason": "Document update conflict."}));
                continue;
            }
            if doc["_deleted"].as_bool() == Some(true) {
                fake.docs.remove(&id);
                results.push(json!({"id": id, "ok": true}));
            } else {
                let rev = fake.docs.get(&id).map_or(0, |(rev, _)| *rev) + 1;
                fake.docs.insert(id.clone(), (rev, doc.clone()));
                results.push(json!({"id": id, "ok": true, "rev": format!("{rev}-fake")}));
            }
        }
        Json(Value::Array(results))
    }

    async fn fake_store(fake: FakeCouch) -> (CouchStore, Fake) {
        let fake = Arc::new(Mutex::new(fake));
        let app = Router::new()
            .route("/loopy", get(|| async { Json(json!({"db_name": "loopy"})) }))
            .route("/loopy/_all_docs", post(all_docs))
            .route("/loopy/_bulk_docs", post(bulk_docs))
            .with_state(fake.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let settings = CouchSettings::new(format!("http://{addr}"), "loopy");
        (CouchStore::connect(&settings).await.unwrap(), fake)
    }

    fn room(id: &str, name: &str) -> Document {
        Document {
            collection: "rooms".into(),
            id: id.into(),
            body: json!({"id": id, "name": name}),
        }
    }

    #[tokio::test]
    async fn revision_races_are_retried_and_the_last_writer_wins() {
        let (store, fake) = fake_store(FakeCouch {
            raced: HashSet::from(["rooms::r1".to_string()]),
            ..FakeCouch::default()
        })
        .await;
        let mut changes = store.subscribe();

        store
            .transact(vec![WriteOp::Put(room("r1", "Den"))])
            .await
            .unwrap();
        assert_eq!(changes.recv().await.unwrap(), Change::Upserted(room("r1", "Den")));

        let fake = fake.lock().unwrap();
        assert_eq!(fake.bulk_calls, 2);
        assert_eq!(fake.docs["rooms::r1"].0, 2);
        assert_eq!(fake.docs["rooms::r1"].1["name"], "Den");
    }

    #[tokio::test]
    async fn committed_writes_are_reported_when_the_batch_fails() {
        let (store, fake) = fake_store(FakeCouch {
            forbidden: HashSet::from(["rooms::locked".to_string()]),
            ..FakeCouch::default()
        })
        .await;
        let mut changes = store.subscribe();

        let result = store
            .transact(vec![
                WriteOp::Put(room("r1", "Den")),
                WriteOp::Put(room("locked", "Vault")),
                WriteOp::delete("rooms", "gone"),
            ])
            .await;
        assert!(result.is_err());

        assert_eq!(changes.recv().await.unwrap(), Change::Upserted(room("r1", "Den")));
        assert_eq!(
            changes.recv().await.unwrap(),
            Change::Deleted {
                collection: "rooms".into(),
                id: "gone".into()
            }
        );
        assert!(changes.try_recv().is_err());

        let fake = fake.lock().unwrap();
        assert_eq!(fake.bulk_calls, 1);
        assert!(fake.docs.contains_key("rooms::r1"));
        assert!(!fake.docs.contains_key("rooms::locked"));
    }

    #[test]
    fn unanswered_writes_count_as_rejected() {
        let results = vec![
            BulkDocsResult {
                id: "rooms::a".into(),
                error: None,
                reason: None,
            },
            BulkDocsResult {
                id: "rooms::b".into(),
                error: Some("conflict".into()),
                reason: None,
            },
        ];
        let outcome = settle(&[0, 2, 3], results);
        assert_eq!(outcome.committed, vec![0]);
        let rejected: Vec<_> = outcome
            .rejected
            .iter()
            .map(|(index, result)| (*index, result.is_conflict()))
            .collect();
        assert_eq!(rejected, vec![(2, true), (3, false)]);
    }
}
