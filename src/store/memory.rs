use super::{Document, DocumentStore};
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Process-local store. Contents are lost on shutdown.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: DashMap<String, HashMap<Uuid, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, ServiceError> {
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(&id).cloned()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, ServiceError> {
        let mut documents: Vec<Document> = self
            .collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default();
        documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(documents)
    }

    async fn insert(&self, document: Document) -> Result<Document, ServiceError> {
        let mut docs = self
            .collections
            .entry(document.collection.clone())
            .or_default();
        if docs.contains_key(&document.id) {
            return Err(ServiceError::Conflict(format!(
                "{}/{} already exists",
                document.collection, document.id
            )));
        }
        docs.insert(document.id, document.clone());
        Ok(document)
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        data: Value,
    ) -> Result<Document, ServiceError> {
        let mut docs = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| ServiceError::not_found(collection, id))?;
        let existing = docs
            .get_mut(&id)
            .ok_or_else(|| ServiceError::not_found(collection, id))?;
        existing.data = super::strip_envelope(data);
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, ServiceError> {
        Ok(self
            .collections
            .get_mut(collection)
            .map(|mut docs| docs.remove(&id).is_some())
            .unwrap_or(false))
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[tokio::test]
    async fn collections_are_isolated() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .insert(Document::new("a", id, json!({"x": 1})))
            .await
            .unwrap();

        assert!(store.get("a", id).await.unwrap().is_some());
        assert!(store.get("b", id).await.unwrap().is_none());
        assert!(store.list("b").await.unwrap().is_empty());
        assert!(!store.delete("b", id).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        let doc = Document::new("a", Uuid::new_v4(), json!({}));
        store.insert(doc.clone()).await.unwrap();
        assert_matches!(store.insert(doc).await, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn replace_is_last_write_wins() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();
        store
            .insert(Document::new("a", id, json!({"v": 1})))
            .await
            .unwrap();
        store.replace("a", id, json!({"v": 2})).await.unwrap();
        let latest = store.replace("a", id, json!({"v": 3})).await.unwrap();
        assert_eq!(latest.data, json!({"v": 3}));
        assert_eq!(store.get("a", id).await.unwrap().unwrap().data, json!({"v": 3}));
    }
}
