use super::StatusEnum;
use crate::store::Record;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, AsRefStr, Display,
    EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    Discontinued,
}

impl StatusEnum for ProductStatus {
    const KIND: &'static str = "product_status";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Unique within the collection
    pub sku: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Unit of measure ("un", "kg", "box", ...)
    pub unit: String,
    pub price: Decimal,
    pub cost: Decimal,
    /// Only changed through stock movements after creation
    pub stock_quantity: Decimal,
    pub min_stock: Decimal,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.min_stock
    }
}

impl Record for Product {
    const COLLECTION: &'static str = "products";

    fn id(&self) -> Uuid {
        self.id
    }
}
