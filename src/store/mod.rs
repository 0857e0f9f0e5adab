//! Document storage.
//!
//! Every record lives as a JSON document inside a named collection. The
//! envelope (`id`, `created_at`, `updated_at`) is owned by the store; record
//! bodies never carry those keys on disk and can never override them.

pub mod memory;
pub mod sql;

use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use sql::SqlStore;

const ENVELOPE_KEYS: [&str; 3] = ["id", "created_at", "updated_at"];

/// A stored document and its envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: Uuid,
    pub collection: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(collection: impl Into<String>, id: Uuid, data: Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            collection: collection.into(),
            data: strip_envelope(data),
            created_at: now,
            updated_at: now,
        }
    }

    /// Deserializes the body into a record, with the envelope fields injected.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        let mut body = match &self.data {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(ServiceError::SerializationError(format!(
                    "document {}/{} is not a JSON object",
                    self.collection, self.id
                )))
            }
        };
        body.insert("id".into(), Value::String(self.id.to_string()));
        body.insert(
            "created_at".into(),
            serde_json::to_value(self.created_at)?,
        );
        body.insert(
            "updated_at".into(),
            serde_json::to_value(self.updated_at)?,
        );
        Ok(serde_json::from_value(Value::Object(body))?)
    }
}

/// Removes envelope keys from a record body.
pub fn strip_envelope(mut data: Value) -> Value {
    if let Value::Object(map) = &mut data {
        for key in ENVELOPE_KEYS {
            map.remove(key);
        }
    }
    data
}

/// Schemaless per-record storage.
///
/// Writes are last-write-wins; there are no multi-document transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, ServiceError>;

    /// All documents of a collection, newest first
    async fn list(&self, collection: &str) -> Result<Vec<Document>, ServiceError>;

    /// Stores a new document; fails with `Conflict` when the id is taken.
    async fn insert(&self, document: Document) -> Result<Document, ServiceError>;

    /// Replaces the body of an existing document and bumps `updated_at`.
    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        data: Value,
    ) -> Result<Document, ServiceError>;

    /// Returns whether a document was removed
    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, ServiceError>;

    async fn ping(&self) -> Result<(), ServiceError>;
}

pub type SharedStore = Arc<dyn DocumentStore>;

/// A typed record bound to a collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;
}

/// Typed access to one collection.
pub struct Repository<T> {
    store: SharedStore,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Record> Repository<T> {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    fn observe(&self, operation: &'static str) {
        crate::metrics::record_store_operation(T::COLLECTION, operation);
    }

    /// Every record, newest first
    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn list(&self) -> Result<Vec<T>, ServiceError> {
        self.observe("list");
        let mut documents = self.store.list(T::COLLECTION).await?;
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        documents.iter().map(Document::decode).collect()
    }

    pub async fn find_by<P>(&self, predicate: P) -> Result<Vec<T>, ServiceError>
    where
        P: Fn(&T) -> bool,
    {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|record| predicate(record))
            .collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<T>, ServiceError> {
        self.observe("get");
        match self.store.get(T::COLLECTION, id).await? {
            Some(document) => document.decode().map(Some),
            None => Ok(None),
        }
    }

    /// Like `find`, but a missing record is `NotFound`
    pub async fn get(&self, id: Uuid) -> Result<T, ServiceError> {
        self.find(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(T::COLLECTION, id))
    }

    #[instrument(skip(self, record), fields(collection = T::COLLECTION, id = %record.id()))]
    pub async fn insert(&self, record: &T) -> Result<T, ServiceError> {
        self.observe("insert");
        let document = Document::new(T::COLLECTION, record.id(), serde_json::to_value(record)?);
        let stored = self.store.insert(document).await?;
        debug!("document inserted");
        stored.decode()
    }

    #[instrument(skip(self, record), fields(collection = T::COLLECTION, id = %record.id()))]
    pub async fn save(&self, record: &T) -> Result<T, ServiceError> {
        self.observe("replace");
        let body = strip_envelope(serde_json::to_value(record)?);
        let stored = self.store.replace(T::COLLECTION, record.id(), body).await?;
        stored.decode()
    }

    #[instrument(skip(self), fields(collection = T::COLLECTION))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.observe("delete");
        if self.store.delete(T::COLLECTION, id).await? {
            Ok(())
        } else {
            Err(ServiceError::not_found(T::COLLECTION, id))
        }
    }
}

/// Case-insensitive substring match used by the list filters.
pub fn matches_search(needle: Option<&str>, haystacks: &[Option<&str>]) -> bool {
    let needle = match needle.map(str::trim).filter(|s| !s.is_empty()) {
        Some(n) => n.to_lowercase(),
        None => return true,
    };
    haystacks
        .iter()
        .flatten()
        .any(|h| h.to_lowercase().contains(&needle))
}
