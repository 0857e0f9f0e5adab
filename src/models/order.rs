use super::{LineItem, StatusEnum};
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
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// pending -> confirmed -> completed; anything but cancelled may be cancelled
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Completed)
                | (Confirmed, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Completed, Cancelled)
        )
    }
}

impl StatusEnum for OrderStatus {
    const KIND: &'static str = "order_status";
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, AsRefStr, Display,
    EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SalesChannel {
    #[default]
    Counter,
    Pos,
    Online,
    Phone,
}

impl StatusEnum for SalesChannel {
    const KIND: &'static str = "sales_channel";

    fn label(&self) -> String {
        match self {
            SalesChannel::Pos => "Point of Sale".to_string(),
            other => super::humanize(other.as_ref()),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display,
    EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    DebitCard,
    Pix,
    BankTransfer,
    BankSlip,
}

impl StatusEnum for PaymentMethod {
    const KIND: &'static str = "payment_method";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    /// Sequential display number, e.g. `SO-000042`
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub customer_name: Option<String>,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub channel: SalesChannel,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
    /// Quote this order was converted from
    pub quote_id: Option<Uuid>,
    /// Stock exits written on completion
    #[serde(default)]
    pub stock_movement_ids: Vec<Uuid>,
    /// Receivable written on completion
    pub transaction_id: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Order {
    const COLLECTION: &'static str = "orders";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Confirmed, true)]
    #[case(OrderStatus::Confirmed, OrderStatus::Completed, true)]
    #[case(OrderStatus::Pending, OrderStatus::Completed, true)]
    #[case(OrderStatus::Completed, OrderStatus::Cancelled, true)]
    #[case(OrderStatus::Completed, OrderStatus::Pending, false)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending, false)]
    #[case(OrderStatus::Cancelled, OrderStatus::Completed, false)]
    #[case(OrderStatus::Confirmed, OrderStatus::Pending, false)]
    fn order_transitions(#[case] from: OrderStatus, #[case] to: OrderStatus, #[case] ok: bool) {
        assert_eq!(from.can_transition_to(to), ok);
    }

    #[test]
    fn labels() {
        assert_eq!(PaymentMethod::CreditCard.label(), "Credit Card");
        assert_eq!(SalesChannel::Pos.label(), "Point of Sale");
        assert_eq!(OrderStatus::Cancelled.code(), "cancelled");
    }
}
