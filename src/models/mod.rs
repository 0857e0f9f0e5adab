//! Business records stored as documents.
//!
//! Every record carries its own `id`, `created_at` and `updated_at`, filled
//! from the document envelope on read. Relations are a foreign id plus a
//! denormalized display name refreshed on each write.

pub mod campaign;
pub mod customer;
pub mod finance;
pub mod opportunity;
pub mod order;
pub mod product;
pub mod project;
pub mod quote;
pub mod stock;
pub mod supplier;
pub mod user;

use crate::errors::ServiceError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::IntoEnumIterator;
use utoipa::ToSchema;
use uuid::Uuid;

pub use campaign::{Campaign, CampaignStatus};
pub use customer::{Customer, CustomerStatus};
pub use finance::{FinancialTransaction, TransactionKind, TransactionStatus};
pub use opportunity::{Opportunity, OpportunityStage};
pub use order::{Order, OrderStatus, PaymentMethod, SalesChannel};
pub use product::{Product, ProductStatus};
pub use project::{CalendarEvent, EventStatus, Project, ProjectStatus, Task, TaskPriority, TaskStatus};
pub use quote::{Quote, QuoteStatus};
pub use stock::{MovementKind, MovementStatus, StockMovement};
pub use supplier::{Supplier, SupplierStatus};
pub use user::{Role, UserAccount};

/// Turns a snake_case code into a display label: `in_progress` -> "In Progress"
pub fn humanize(code: &str) -> String {
    code.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// A status enumeration with a stored code and a human label per variant.
pub trait StatusEnum: IntoEnumIterator + AsRef<str> + Copy + 'static {
    /// Key under which the options are published, e.g. `order_status`
    const KIND: &'static str;

    fn code(&self) -> &str {
        self.as_ref()
    }

    fn label(&self) -> String {
        humanize(self.as_ref())
    }

    fn options() -> Vec<StatusOption> {
        Self::iter()
            .map(|status| StatusOption {
                code: status.code().to_string(),
                label: status.label(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusOption {
    pub code: String,
    pub label: String,
}

/// Every status enumeration, keyed by kind
pub fn status_catalog() -> BTreeMap<&'static str, Vec<StatusOption>> {
    fn add<S: StatusEnum>(catalog: &mut BTreeMap<&'static str, Vec<StatusOption>>) {
        catalog.insert(S::KIND, S::options());
    }

    let mut catalog = BTreeMap::new();
    add::<CustomerStatus>(&mut catalog);
    add::<ProductStatus>(&mut catalog);
    add::<SupplierStatus>(&mut catalog);
    add::<OrderStatus>(&mut catalog);
    add::<SalesChannel>(&mut catalog);
    add::<PaymentMethod>(&mut catalog);
    add::<QuoteStatus>(&mut catalog);
    add::<CampaignStatus>(&mut catalog);
    add::<OpportunityStage>(&mut catalog);
    add::<TransactionKind>(&mut catalog);
    add::<TransactionStatus>(&mut catalog);
    add::<ProjectStatus>(&mut catalog);
    add::<TaskStatus>(&mut catalog);
    add::<TaskPriority>(&mut catalog);
    add::<EventStatus>(&mut catalog);
    add::<MovementKind>(&mut catalog);
    add::<MovementStatus>(&mut catalog);
    add::<Role>(&mut catalog);
    catalog
}

/// Largest quantity or money amount accepted on any input
pub const MAX_AMOUNT: Decimal = dec!(1000000000000);

/// Rejects values whose magnitude exceeds [`MAX_AMOUNT`]
pub fn check_amount_limit(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value.abs() > MAX_AMOUNT {
        return Err(ServiceError::ValidationError(format!(
            "{} cannot exceed {}",
            field, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// Postal address as captured on customer and supplier forms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
}

/// A product/quantity/price tuple inside an order or quote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub product_id: Uuid,
    /// Refreshed from the product on every write
    #[serde(default)]
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    /// quantity x unit_price - discount; recomputed, never trusted from input
    #[serde(default)]
    pub total: Decimal,
}

impl LineItem {
    /// `None` when the product does not fit a `Decimal`
    pub fn gross(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }

    pub fn line_total(&self) -> Option<Decimal> {
        Some(self.gross()?.checked_sub(self.discount)?.round_dp(2))
    }

    fn check(&self, position: usize) -> Result<(), ServiceError> {
        for (field, value) in [
            ("quantity", self.quantity),
            ("unit price", self.unit_price),
            ("discount", self.discount),
        ] {
            check_amount_limit(&format!("item {}: {}", position + 1, field), value)?;
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "item {}: quantity must be greater than zero",
                position + 1
            )));
        }
        if self.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "item {}: unit price cannot be negative",
                position + 1
            )));
        }
        let gross = self.gross().ok_or_else(|| {
            ServiceError::ValidationError(format!("item {}: line amount is too large", position + 1))
        })?;
        if self.discount < Decimal::ZERO || self.discount > gross {
            return Err(ServiceError::ValidationError(format!(
                "item {}: discount must be between 0 and the line amount",
                position + 1
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Validates the lines, writes each line total and returns the document totals.
pub fn compute_totals(items: &mut [LineItem], discount: Decimal) -> Result<Totals, ServiceError> {
    if items.is_empty() {
        return Err(ServiceError::ValidationError(
            "at least one item is required".into(),
        ));
    }

    check_amount_limit("discount", discount)?;
    let too_large = || ServiceError::ValidationError("order amount is too large".into());
    let mut subtotal = Decimal::ZERO;
    for (position, item) in items.iter_mut().enumerate() {
        item.check(position)?;
        item.total = item.line_total().ok_or_else(too_large)?;
        subtotal = subtotal.checked_add(item.total).ok_or_else(too_large)?;
    }

    if discount < Decimal::ZERO || discount > subtotal {
        return Err(ServiceError::ValidationError(
            "discount must be between 0 and the subtotal".into(),
        ));
    }

    Ok(Totals {
        subtotal,
        discount,
        total: (subtotal - discount).round_dp(2),
    })
}
