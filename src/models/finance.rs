use super::{PaymentMethod, StatusEnum};
use crate::store::Record;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Income is receivable (invoices), expense is payable (bills)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, AsRefStr, Display,
    EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl StatusEnum for TransactionKind {
    const KIND: &'static str = "transaction_kind";
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema, AsRefStr, Display,
    EnumIter, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Paid,
    Cancelled,
    /// Never stored; derived from a pending due date in the past
    Overdue,
}

impl StatusEnum for TransactionStatus {
    const KIND: &'static str = "transaction_status";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FinancialTransaction {
    pub id: Uuid,
    pub description: String,
    pub kind: TransactionKind,
    pub category: String,
    /// Strictly positive; the kind carries the sign
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub status: TransactionStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    /// Customer or supplier
    pub counterparty_id: Option<Uuid>,
    pub counterparty_name: Option<String>,
    /// Sale that generated this receivable
    pub order_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FinancialTransaction {
    pub fn effective_status(&self, today: NaiveDate) -> TransactionStatus {
        if self.status == TransactionStatus::Pending && self.due_date < today {
            TransactionStatus::Overdue
        } else {
            self.status
        }
    }
}

impl Record for FinancialTransaction {
    const COLLECTION: &'static str = "financial_transactions";

    fn id(&self) -> Uuid {
        self.id
    }
}
