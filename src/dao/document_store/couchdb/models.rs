use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::document_store::Document;

use super::error::CouchDaoError;

pub const ID_SEPARATOR: &str = "::";
pub const END_SUFFIX: &str = "\u{ffff}";

pub fn doc_id(collection: &str, id: &str) -> String {
    format!("{collection}{ID_SEPARATOR}{id}")
}

pub fn collection_prefix(collection: &str) -> String {
    format!("{collection}{ID_SEPARATOR}")
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    pub key: String,
    #[serde(default)]
    pub value: Option<RowValue>,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct RowValue {
    pub rev: String,
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct KeysRequest<'a> {
    pub keys: &'a [String],
}

/// Stored shape: application fields flattened next to the CouchDB metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(rename = "_deleted", default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl CouchDocument {
    pub fn from_document(document: Document, rev: Option<String>) -> Self {
        let body = match document.body {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            id: doc_id(&document.collection, &document.id),
            rev,
            deleted: false,
            body,
        }
    }

    pub fn tombstone(doc_id: String, rev: String) -> Self {
        Self {
            id: doc_id,
            rev: Some(rev),
            deleted: true,
            body: Map::new(),
        }
    }

    /// Strip CouchDB metadata; `None` for design documents or foreign ids.
    pub fn into_document(self) -> Option<Document> {
        let (collection, id) = self.id.split_once(ID_SEPARATOR)?;
        let body = self
            .body
            .into_iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .collect();
        Some(Document {
            collection: collection.to_string(),
            id: id.to_string(),
            body: Value::Object(body),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BulkDocsRequest {
    pub docs: Vec<CouchDocument>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDocsResult {
    pub id: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl BulkDocsResult {
    /// Placeholder for an op CouchDB did not answer.
    pub fn missing() -> Self {
        Self {
            id: String::new(),
            error: Some("missing_result".to_string()),
            reason: Some("no result returned for this document".to_string()),
        }
    }

    /// The write lost a revision race.
    pub fn is_conflict(&self) -> bool {
        self.error.as_deref() == Some("conflict")
    }

    pub fn into_error(self) -> CouchDaoError {
        CouchDaoError::BulkRejected {
            doc_id: self.id,
            error: self.error.unwrap_or_default(),
            reason: self.reason.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn documents_round_trip_through_couch_shape() {
        let document = Document {
            collection: "rooms".into(),
            id: "room_1_2".into(),
            body: json!({"name": "Friday", "members": ["u1"]}),
        };
        let couch = CouchDocument::from_document(document.clone(), Some("1-abc".into()));
        let stored = serde_json::to_value(&couch).unwrap();
        assert_eq!(stored["_id"], "rooms::room_1_2");
        assert_eq!(stored["_rev"], "1-abc");
        assert!(stored.get("_deleted").is_none());

        let back: CouchDocument = serde_json::from_value(stored).unwrap();
        assert_eq!(back.into_document(), Some(document));
    }

    #[test]
    fn design_documents_are_skipped() {
        let design: CouchDocument =
            serde_json::from_value(json!({"_id": "_design/app", "_rev": "1-x"})).unwrap();
        assert_eq!(design.into_document(), None);
    }
}
