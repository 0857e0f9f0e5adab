use super::{LineItem, StatusEnum};
use crate::store::Record;
use chrono::{DateTime, NaiveDate, Utc};
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
pub enum QuoteStatus {
    #[default]
    Draft,
    Sent,
    Accepted,
    Rejected,
    Expired,
    Converted,
}

impl QuoteStatus {
    pub fn can_transition_to(self, next: QuoteStatus) -> bool {
        use QuoteStatus::*;
        matches!(
            (self, next),
            (Draft, Sent)
                | (Sent, Accepted)
                | (Sent, Rejected)
                | (Accepted, Converted)
        )
    }

    /// Whether the quote is still waiting on the customer
    pub fn is_open(self) -> bool {
        matches!(self, QuoteStatus::Draft | QuoteStatus::Sent)
    }
}

impl StatusEnum for QuoteStatus {
    const KIND: &'static str = "quote_status";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub id: Uuid,
    /// Sequential display number, e.g. `QT-000007`
    pub number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub valid_until: NaiveDate,
    pub status: QuoteStatus,
    pub notes: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Order created when the quote was converted
    pub order_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    /// Stored status with expiry applied: an open quote past `valid_until` is expired.
    pub fn effective_status(&self, today: NaiveDate) -> QuoteStatus {
        if self.status.is_open() && self.valid_until < today {
            QuoteStatus::Expired
        } else {
            self.status
        }
    }
}

impl Record for Quote {
    const COLLECTION: &'static str = "quotes";

    fn id(&self) -> Uuid {
        self.id
    }
}
