use super::StatusEnum;
use crate::store::Record;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display,
    EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementKind {
    /// Adds `quantity`
    Entry,
    /// Removes `quantity`
    Exit,
    /// Sets the stock to `quantity`
    Adjustment,
}

impl MovementKind {
    /// Stock level after applying a movement of this kind
    /// `None` when the result does not fit a `Decimal`
    pub fn apply(self, current: Decimal, quantity: Decimal) -> Option<Decimal> {
        match self {
            MovementKind::Entry => current.checked_add(quantity),
            MovementKind::Exit => current.checked_sub(quantity),
            MovementKind::Adjustment => Some(quantity),
        }
    }
}

impl StatusEnum for MovementKind {
    const KIND: &'static str = "movement_kind";
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, AsRefStr, Display,
    EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementStatus {
    #[default]
    Completed,
    Reversed,
}

impl StatusEnum for MovementStatus {
    const KIND: &'static str = "movement_status";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub previous_quantity: Decimal,
    pub resulting_quantity: Decimal,
    pub reason: Option<String>,
    /// Order (or other document) that caused the movement
    pub reference_id: Option<Uuid>,
    pub status: MovementStatus,
    pub reversed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockMovement {
    /// Net change this movement applied to the product
    pub fn delta(&self) -> Decimal {
        self.resulting_quantity - self.previous_quantity
    }
}

impl Record for StockMovement {
    const COLLECTION: &'static str = "stock_movements";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn kinds_apply() {
        assert_eq!(MovementKind::Entry.apply(dec!(5), dec!(3)), Some(dec!(8)));
        assert_eq!(MovementKind::Exit.apply(dec!(5), dec!(3)), Some(dec!(2)));
        assert_eq!(MovementKind::Exit.apply(dec!(2), dec!(3)), Some(dec!(-1)));
        assert_eq!(MovementKind::Adjustment.apply(dec!(5), dec!(12)), Some(dec!(12)));
        assert_eq!(MovementKind::Entry.apply(Decimal::MAX, dec!(1)), None);
    }
}
