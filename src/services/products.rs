use super::{clean, resolve};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{check_amount_limit, Product, ProductStatus, Supplier},
    store::{matches_search, Record, Repository, SharedStore},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use slog::Logger;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    pub sku: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub cost: Decimal,
    /// Opening balance; ignored on update (use stock movements)
    #[serde(default)]
    pub stock_quantity: Decimal,
    #[serde(default)]
    pub min_stock: Decimal,
    pub supplier_id: Option<Uuid>,
    pub status: Option<ProductStatus>,
}

impl ProductInput {
    fn check_amounts(&self) -> Result<(), ServiceError> {
        let fields = [
            ("price", self.price),
            ("cost", self.cost),
            ("stock_quantity", self.stock_quantity),
            ("min_stock", self.min_stock),
        ];
        for (field, value) in fields {
            if value < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "{} cannot be negative",
                    field
                )));
            }
            check_amount_limit(field, value)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProductFilter {
    /// Matches name, SKU or category
    pub search: Option<String>,
    pub status: Option<ProductStatus>,
    pub supplier_id: Option<Uuid>,
    pub category: Option<String>,
    /// Only products at or below their minimum stock
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Clone)]
pub struct ProductService {
    products: Repository<Product>,
    suppliers: Repository<Supplier>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl ProductService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            products: Repository::new(store.clone()),
            suppliers: Repository::new(store),
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>, ServiceError> {
        let search = filter.search.as_deref();
        self.products
            .find_by(|p| {
                filter.status.map_or(true, |s| p.status == s)
                    && filter.supplier_id.map_or(true, |id| p.supplier_id == Some(id))
                    && filter.category.as_deref().map_or(true, |c| {
                        p.category
                            .as_deref()
                            .map_or(false, |pc| pc.eq_ignore_ascii_case(c))
                    })
                    && (!filter.low_stock || p.is_low_stock())
                    && matches_search(
                        search,
                        &[
                            Some(p.name.as_str()),
                            Some(p.sku.as_str()),
                            p.category.as_deref(),
                        ],
                    )
            })
            .await
    }

    /// Active products whose stock is at or below the minimum
    pub async fn low_stock(&self) -> Result<Vec<Product>, ServiceError> {
        let mut products = self
            .products
            .find_by(|p| p.status == ProductStatus::Active && p.is_low_stock())
            .await?;
        products.sort_by(|a, b| a.stock_quantity
                .saturating_sub(a.min_stock)
                .cmp(&b.stock_quantity.saturating_sub(b.min_stock)));
        Ok(products)
    }

    pub async fn get(&self, id: Uuid) -> Result<Product, ServiceError> {
        self.products.get(id).await
    }

    async fn ensure_unique_sku(&self, sku: &str, existing_id: Option<Uuid>) -> Result<(), ServiceError> {
        let clash = self
            .products
            .find_by(|p| p.sku.eq_ignore_ascii_case(sku) && Some(p.id) != existing_id)
            .await?;
        if clash.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Conflict(format!("SKU {} is already in use", sku)))
        }
    }

    async fn supplier_name(&self, supplier_id: Option<Uuid>) -> Result<Option<String>, ServiceError> {
        match supplier_id {
            Some(id) => Ok(Some(resolve(&self.suppliers, id, "supplier").await?.name)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: ProductInput) -> Result<Product, ServiceError> {
        input.validate()?;
        input.check_amounts()?;
        let sku = input.sku.trim().to_uppercase();
        self.ensure_unique_sku(&sku, None).await?;
        let supplier_name = self.supplier_name(input.supplier_id).await?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            sku,
            description: clean(input.description),
            category: clean(input.category),
            unit: clean(input.unit).unwrap_or_else(|| "un".to_string()),
            price: input.price,
            cost: input.cost,
            stock_quantity: input.stock_quantity,
            min_stock: input.min_stock,
            supplier_id: input.supplier_id,
            supplier_name,
            status: input.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let saved = self.products.insert(&product).await?;
        self.event_sender
            .send_or_log(Event::created(Product::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "product created"; "product_id" => %saved.id, "sku" => &saved.sku);
        info!(product_id = %saved.id, "Product created");
        Ok(saved)
    }

    /// Replaces the descriptive fields; the stock level is left untouched
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: ProductInput) -> Result<Product, ServiceError> {
        input.validate()?;
        input.check_amounts()?;
        let mut product = self.products.get(id).await?;
        let sku = input.sku.trim().to_uppercase();
        self.ensure_unique_sku(&sku, Some(id)).await?;

        product.supplier_name = self.supplier_name(input.supplier_id).await?;
        product.supplier_id = input.supplier_id;
        product.name = input.name.trim().to_string();
        product.sku = sku;
        product.description = clean(input.description);
        product.category = clean(input.category);
        product.unit = clean(input.unit).unwrap_or(product.unit);
        product.price = input.price;
        product.cost = input.cost;
        product.min_stock = input.min_stock;
        product.status = input.status.unwrap_or(product.status);

        let saved = self.products.save(&product).await?;
        self.event_sender
            .send_or_log(Event::updated(Product::COLLECTION, id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.products.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Product::COLLECTION, id))
            .await;
        slog::info!(self.logger, "product deleted"; "product_id" => %id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::suppliers::SupplierInput;
    use crate::services::test_support::services;
    use crate::models::Address;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn input(sku: &str) -> ProductInput {
        ProductInput {
            name: "Coffee 500g".into(),
            sku: sku.into(),
            description: None,
            category: Some("Groceries".into()),
            unit: None,
            price: dec!(18.90),
            cost: dec!(11.00),
            stock_quantity: dec!(10),
            min_stock: dec!(3),
            supplier_id: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn sku_is_unique_case_insensitively() {
        let svc = services().products;
        let product = svc.create(input("caf-500")).await.unwrap();
        assert_eq!(product.sku, "CAF-500");
        assert_eq!(product.unit, "un");
        assert_matches!(svc.create(input("CAF-500")).await, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn negative_amounts_are_rejected() {
        let svc = services().products;
        let mut bad = input("X1");
        bad.price = dec!(-1);
        assert_matches!(svc.create(bad).await, Err(ServiceError::ValidationError(_)));
        let mut bad = input("X2");
        bad.stock_quantity = dec!(-0.5);
        assert_matches!(svc.create(bad).await, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn supplier_link_is_resolved_and_required_to_exist() {
        let all = services();
        let supplier = all
            .suppliers
            .create(SupplierInput {
                name: "Acme".into(),
                trade_name: None,
                contact_name: None,
                email: None,
                phone: None,
                tax_id: None,
                address: Address::default(),
                status: None,
                notes: None,
            })
            .await
            .unwrap();

        let mut linked = input("S1");
        linked.supplier_id = Some(supplier.id);
        let product = all.products.create(linked).await.unwrap();
        assert_eq!(product.supplier_name.as_deref(), Some("Acme"));

        let mut dangling = input("S2");
        dangling.supplier_id = Some(Uuid::new_v4());
        assert_matches!(
            all.products.create(dangling).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn update_keeps_stock_level() {
        let svc = services().products;
        let product = svc.create(input("K1")).await.unwrap();
        let mut edit = input("K1");
        edit.stock_quantity = dec!(999);
        edit.price = dec!(20);
        let updated = svc.update(product.id, edit).await.unwrap();
        assert_eq!(updated.stock_quantity, dec!(10));
        assert_eq!(updated.price, dec!(20));
    }

    #[tokio::test]
    async fn low_stock_listing() {
        let svc = services().products;
        let mut low = input("L1");
        low.stock_quantity = dec!(2);
        svc.create(low).await.unwrap();
        svc.create(input("L2")).await.unwrap();

        let low = svc.low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "L1");

        let filtered = svc
            .list(&ProductFilter {
                low_stock: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
    }
}
