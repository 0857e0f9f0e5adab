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
pub enum OpportunityStage {
    #[default]
    Prospecting,
    Qualification,
    Proposal,
    Negotiation,
    Won,
    Lost,
}

impl OpportunityStage {
    pub fn is_closed(self) -> bool {
        matches!(self, OpportunityStage::Won | OpportunityStage::Lost)
    }

    /// Won forces 100, lost forces 0; open stages keep the requested value.
    pub fn apply_probability(self, requested: u8) -> u8 {
        match self {
            OpportunityStage::Won => 100,
            OpportunityStage::Lost => 0,
            _ => requested,
        }
    }
}

impl StatusEnum for OpportunityStage {
    const KIND: &'static str = "opportunity_stage";
}

/// Sales pipeline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Opportunity {
    pub id: Uuid,
    pub title: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub value: Decimal,
    pub stage: OpportunityStage,
    /// 0-100
    pub probability: u8,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn weighted_value(&self) -> Decimal {
        (self.value / Decimal::ONE_HUNDRED * Decimal::from(self.probability)).round_dp(2)
    }
}

impl Record for Opportunity {
    const COLLECTION: &'static str = "opportunities";

    fn id(&self) -> Uuid {
        self.id
    }
}
