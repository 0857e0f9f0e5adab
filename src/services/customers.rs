use super::clean;
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{Address, Customer, CustomerStatus},
    store::{matches_search, Record, Repository, SharedStore},
    validation::{
        normalize_address, normalize_postal_code, validate_tax_id, PostalCodeLookup, TaxId,
    },
};
use chrono::Utc;
use serde::Deserialize;
use slog::Logger;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Create/replace payload for a customer
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CustomerInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(custom = "validate_tax_id")]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub address: Address,
    pub status: Option<CustomerStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CustomerFilter {
    /// Matches name, email, phone or tax id
    pub search: Option<String>,
    pub status: Option<CustomerStatus>,
}

#[derive(Clone)]
pub struct CustomerService {
    customers: Repository<Customer>,
    postal_lookup: Arc<dyn PostalCodeLookup>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl CustomerService {
    pub fn new(
        store: SharedStore,
        event_sender: Arc<EventSender>,
        postal_lookup: Arc<dyn PostalCodeLookup>,
        logger: Logger,
    ) -> Self {
        Self {
            customers: Repository::new(store),
            postal_lookup,
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, ServiceError> {
        let search = filter.search.as_deref();
        self.customers
            .find_by(|c| {
                filter.status.map_or(true, |s| c.status == s)
                    && matches_search(
                        search,
                        &[
                            Some(c.name.as_str()),
                            c.email.as_deref(),
                            c.phone.as_deref(),
                            c.tax_id.as_deref(),
                        ],
                    )
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Customer, ServiceError> {
        self.customers.get(id).await
    }

    /// Validates, normalizes and checks tax id uniqueness
    async fn prepare(
        &self,
        input: CustomerInput,
        existing_id: Option<Uuid>,
    ) -> Result<CustomerInput, ServiceError> {
        input.validate()?;

        let tax_id = match clean(input.tax_id) {
            Some(raw) => Some(TaxId::parse(&raw)?.digits().to_string()),
            None => None,
        };
        if let Some(tax_id) = &tax_id {
            let taken = self
                .customers
                .find_by(|c| c.tax_id.as_ref() == Some(tax_id) && Some(c.id) != existing_id)
                .await?;
            if !taken.is_empty() {
                return Err(ServiceError::Conflict(format!(
                    "a customer with tax id {} already exists",
                    tax_id
                )));
            }
        }

        Ok(CustomerInput {
            name: input.name.trim().to_string(),
            email: clean(input.email).map(|e| e.to_lowercase()),
            phone: clean(input.phone),
            tax_id,
            address: normalize_address(input.address)?,
            status: input.status,
            notes: clean(input.notes),
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CustomerInput) -> Result<Customer, ServiceError> {
        let input = self.prepare(input, None).await?;
        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4(),
            name: input.name,
            email: input.email,
            phone: input.phone,
            tax_id: input.tax_id,
            address: input.address,
            status: input.status.unwrap_or_default(),
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        let saved = self.customers.insert(&customer).await?;
        self.event_sender
            .send_or_log(Event::created(Customer::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "customer created"; "customer_id" => %saved.id);
        info!(customer_id = %saved.id, "Customer created");
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: CustomerInput) -> Result<Customer, ServiceError> {
        let input = self.prepare(input, Some(id)).await?;
        let mut customer = self.customers.get(id).await?;

        customer.name = input.name;
        customer.email = input.email;
        customer.phone = input.phone;
        customer.tax_id = input.tax_id;
        customer.address = input.address;
        customer.status = input.status.unwrap_or(customer.status);
        customer.notes = input.notes;

        let saved = self.customers.save(&customer).await?;
        self.event_sender
            .send_or_log(Event::updated(Customer::COLLECTION, id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.customers.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Customer::COLLECTION, id))
            .await;
        slog::info!(self.logger, "customer deleted"; "customer_id" => %id);
        Ok(())
    }

    /// Address suggestion for the customer form
    #[instrument(skip(self))]
    pub async fn lookup_postal_code(&self, postal_code: &str) -> Result<Address, ServiceError> {
        let postal_code = normalize_postal_code(postal_code)?;
        self.postal_lookup.lookup(&postal_code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::discard_logger;
    use crate::store::MemoryStore;
    use crate::validation::DisabledLookup;
    use crate::events::process_events;
    use assert_matches::assert_matches;
    use tokio::sync::mpsc;

    fn service() -> CustomerService {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(process_events(rx, None));
        CustomerService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(EventSender::new(tx)),
            Arc::new(DisabledLookup),
            discard_logger(),
        )
    }

    fn input(name: &str) -> CustomerInput {
        CustomerInput {
            name: name.into(),
            email: Some("Ana@Example.com".into()),
            phone: None,
            tax_id: Some("529.982.247-25".into()),
            address: Address {
                postal_code: Some("01001000".into()),
                ..Default::default()
            },
            status: None,
            notes: Some("  ".into()),
        }
    }

    #[tokio::test]
    async fn create_normalizes_fields() {
        let svc = service();
        let customer = svc.create(input("Ana")).await.unwrap();
        assert_eq!(customer.email.as_deref(), Some("ana@example.com"));
        assert_eq!(customer.tax_id.as_deref(), Some("52998224725"));
        assert_eq!(customer.address.postal_code.as_deref(), Some("01001-000"));
        assert_eq!(customer.notes, None);
        assert_eq!(customer.status, CustomerStatus::Active);
    }

    #[tokio::test]
    async fn required_name_and_valid_tax_id() {
        let svc = service();
        assert_matches!(
            svc.create(input("")).await,
            Err(ServiceError::ValidationError(_))
        );

        let mut bad = input("Ana");
        bad.tax_id = Some("123.456.789-00".into());
        assert_matches!(svc.create(bad).await, Err(ServiceError::ValidationError(_)));

        let mut bad_cep = input("Ana");
        bad_cep.address.postal_code = Some("123".into());
        assert_matches!(
            svc.create(bad_cep).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn tax_id_is_unique() {
        let svc = service();
        let first = svc.create(input("Ana")).await.unwrap();
        assert_matches!(
            svc.create(input("Ana again")).await,
            Err(ServiceError::Conflict(_))
        );
        // updating the owner keeps its own tax id
        assert!(svc.update(first.id, input("Ana Maria")).await.is_ok());
    }

    #[tokio::test]
    async fn list_filters_by_search_and_status() {
        let svc = service();
        svc.create(input("Ana")).await.unwrap();
        let mut lead = input("Bruno");
        lead.tax_id = None;
        lead.email = None;
        lead.status = Some(CustomerStatus::Lead);
        svc.create(lead).await.unwrap();

        let leads = svc
            .list(&CustomerFilter {
                status: Some(CustomerStatus::Lead),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].name, "Bruno");

        let found = svc
            .list(&CustomerFilter {
                search: Some("5299822".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Ana");
    }

    #[tokio::test]
    async fn lookup_without_service_is_external_error() {
        assert_matches!(
            service().lookup_postal_code("01001-000").await,
            Err(ServiceError::ExternalServiceError(_))
        );
    }

    #[tokio::test]
    async fn malformed_code_fails_before_the_lookup() {
        assert_matches!(
            service().lookup_postal_code("١٢٣٤٥٦٧٨").await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
