use super::StatusEnum;
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
pub enum CampaignStatus {
    #[default]
    Planned,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl StatusEnum for CampaignStatus {
    const KIND: &'static str = "campaign_status";
}

/// Marketing campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Free text: "email", "social", "radio", ...
    pub channel: Option<String>,
    pub target_audience: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub budget: Decimal,
    pub spent: Decimal,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Campaign {
    const COLLECTION: &'static str = "campaigns";

    fn id(&self) -> Uuid {
        self.id
    }
}
