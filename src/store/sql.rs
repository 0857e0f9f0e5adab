use super::{Document, DocumentStore};
use crate::db::DbPool;
use crate::entities::document::{self, Entity as DocumentEntity};
use crate::errors::ServiceError;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, Set,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// Document store on top of the `documents` table.
#[derive(Debug, Clone)]
pub struct SqlStore {
    db: Arc<DbPool>,
}

impl SqlStore {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }
}

fn to_document(model: document::Model) -> Result<Document, ServiceError> {
    let data = serde_json::from_str(&model.data).map_err(|e| {
        error!(id = %model.id, collection = %model.collection, "corrupt document body: {}", e);
        ServiceError::SerializationError(e.to_string())
    })?;
    Ok(Document {
        id: model.id,
        collection: model.collection,
        data,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

#[async_trait]
impl DocumentStore for SqlStore {
    fn backend(&self) -> &'static str {
        "sql"
    }

    async fn get(&self, collection: &str, id: Uuid) -> Result<Option<Document>, ServiceError> {
        DocumentEntity::find_by_id(id)
            .filter(document::Column::Collection.eq(collection))
            .one(&*self.db)
            .await?
            .map(to_document)
            .transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, ServiceError> {
        DocumentEntity::find()
            .filter(document::Column::Collection.eq(collection))
            .order_by_desc(document::Column::CreatedAt)
            .all(&*self.db)
            .await?
            .into_iter()
            .map(to_document)
            .collect()
    }

    async fn insert(&self, doc: Document) -> Result<Document, ServiceError> {
        if DocumentEntity::find_by_id(doc.id)
            .one(&*self.db)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict(format!(
                "{}/{} already exists",
                doc.collection, doc.id
            )));
        }

        let active = document::ActiveModel {
            id: Set(doc.id),
            collection: Set(doc.collection.clone()),
            data: Set(serde_json::to_string(&doc.data)?),
            created_at: Set(doc.created_at),
            updated_at: Set(doc.updated_at),
        };
        let model = active.insert(&*self.db).await?;
        to_document(model)
    }

    async fn replace(
        &self,
        collection: &str,
        id: Uuid,
        data: Value,
    ) -> Result<Document, ServiceError> {
        let existing = DocumentEntity::find_by_id(id)
            .filter(document::Column::Collection.eq(collection))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found(collection, id))?;

        let mut active = existing.into_active_model();
        active.data = Set(serde_json::to_string(&super::strip_envelope(data))?);
        active.updated_at = Set(Utc::now());
        let model = active.update(&*self.db).await?;
        to_document(model)
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<bool, ServiceError> {
        let result = DocumentEntity::delete_many()
            .filter(document::Column::Id.eq(id))
            .filter(document::Column::Collection.eq(collection))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        crate::db::check_connection(&self.db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn file_store() -> (tempfile::TempDir, SqlStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("docs.db").display());
        let pool = crate::db::establish_connection(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();
        (dir, SqlStore::new(Arc::new(pool)))
    }

    #[tokio::test]
    async fn sqlite_store_crud() {
        let (_dir, store) = file_store().await;
        let id = Uuid::new_v4();

        store
            .insert(Document::new("customers", id, json!({"name": "Ana"})))
            .await
            .unwrap();
        let fetched = store.get("customers", id).await.unwrap().unwrap();
        assert_eq!(fetched.data, json!({"name": "Ana"}));
        assert!(store.get("products", id).await.unwrap().is_none());

        let replaced = store
            .replace("customers", id, json!({"name": "Ana Maria", "id": "x"}))
            .await
            .unwrap();
        assert_eq!(replaced.data, json!({"name": "Ana Maria"}));

        assert_eq!(store.list("customers").await.unwrap().len(), 1);
        assert!(store.delete("customers", id).await.unwrap());
        assert!(!store.delete("customers", id).await.unwrap());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn replace_missing_is_not_found() {
        let (_dir, store) = file_store().await;
        let err = store
            .replace("customers", Uuid::new_v4(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
