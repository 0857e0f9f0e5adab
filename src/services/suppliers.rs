use super::clean;
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{Address, Supplier, SupplierStatus},
    store::{matches_search, Record, Repository, SharedStore},
    validation::{normalize_address, validate_tax_id, TaxId},
};
use chrono::Utc;
use serde::Deserialize;
use slog::Logger;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SupplierInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub trade_name: Option<String>,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(custom = "validate_tax_id")]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub address: Address,
    pub status: Option<SupplierStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SupplierFilter {
    /// Matches name, trade name, contact, email or tax id
    pub search: Option<String>,
    pub status: Option<SupplierStatus>,
}

/// Service for managing suppliers
#[derive(Clone)]
pub struct SupplierService {
    suppliers: Repository<Supplier>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl SupplierService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            suppliers: Repository::new(store),
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &SupplierFilter) -> Result<Vec<Supplier>, ServiceError> {
        let search = filter.search.as_deref();
        self.suppliers
            .find_by(|s| {
                filter.status.map_or(true, |status| s.status == status)
                    && matches_search(
                        search,
                        &[
                            Some(s.name.as_str()),
                            s.trade_name.as_deref(),
                            s.contact_name.as_deref(),
                            s.email.as_deref(),
                            s.tax_id.as_deref(),
                        ],
                    )
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Supplier, ServiceError> {
        self.suppliers.get(id).await
    }

    fn apply(supplier: &mut Supplier, input: SupplierInput) -> Result<(), ServiceError> {
        input.validate()?;
        supplier.tax_id = match clean(input.tax_id) {
            Some(raw) => Some(TaxId::parse(&raw)?.digits().to_string()),
            None => None,
        };
        supplier.address = normalize_address(input.address)?;
        supplier.name = input.name.trim().to_string();
        supplier.trade_name = clean(input.trade_name);
        supplier.contact_name = clean(input.contact_name);
        supplier.email = clean(input.email).map(|e| e.to_lowercase());
        supplier.phone = clean(input.phone);
        supplier.status = input.status.unwrap_or(supplier.status);
        supplier.notes = clean(input.notes);
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: SupplierInput) -> Result<Supplier, ServiceError> {
        let now = Utc::now();
        let mut supplier = Supplier {
            id: Uuid::new_v4(),
            name: String::new(),
            trade_name: None,
            contact_name: None,
            email: None,
            phone: None,
            tax_id: None,
            address: Address::default(),
            status: SupplierStatus::default(),
            notes: None,
            created_at: now,
            updated_at: now,
        };
        Self::apply(&mut supplier, input)?;

        let saved = self.suppliers.insert(&supplier).await?;
        self.event_sender
            .send_or_log(Event::created(Supplier::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "supplier created"; "supplier_id" => %saved.id);
        info!(supplier_id = %saved.id, "Supplier created");
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: SupplierInput) -> Result<Supplier, ServiceError> {
        input.validate()?;
        let mut supplier = self.suppliers.get(id).await?;
        Self::apply(&mut supplier, input)?;

        let saved = self.suppliers.save(&supplier).await?;
        self.event_sender
            .send_or_log(Event::updated(Supplier::COLLECTION, id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.suppliers.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Supplier::COLLECTION, id))
            .await;
        slog::info!(self.logger, "supplier deleted"; "supplier_id" => %id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::services;
    use assert_matches::assert_matches;

    fn input() -> SupplierInput {
        SupplierInput {
            name: " Acme Distribuidora ".into(),
            trade_name: Some("Acme".into()),
            contact_name: None,
            email: None,
            phone: None,
            tax_id: Some("11.222.333/0001-81".into()),
            address: Address::default(),
            status: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_and_update() {
        let svc = services().suppliers;
        let supplier = svc.create(input()).await.unwrap();
        assert_eq!(supplier.name, "Acme Distribuidora");
        assert_eq!(supplier.tax_id.as_deref(), Some("11222333000181"));

        let mut edit = input();
        edit.status = Some(SupplierStatus::Blocked);
        let updated = svc.update(supplier.id, edit).await.unwrap();
        assert_eq!(updated.status, SupplierStatus::Blocked);
        assert_eq!(updated.created_at, supplier.created_at);
    }

    #[tokio::test]
    async fn invalid_cnpj_is_rejected() {
        let svc = services().suppliers;
        let mut bad = input();
        bad.tax_id = Some("11.222.333/0001-82".into());
        assert_matches!(svc.create(bad).await, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let svc = services().suppliers;
        assert_matches!(
            svc.update(Uuid::new_v4(), input()).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
