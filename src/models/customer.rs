use super::{Address, StatusEnum};
use crate::store::Record;
use chrono::{DateTime, Utc};
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
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Lead,
    Blocked,
}

impl StatusEnum for CustomerStatus {
    const KIND: &'static str = "customer_status";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// CPF (11 digits) or CNPJ (14 digits), stored as digits only
    pub tax_id: Option<String>,
    #[serde(default)]
    pub address: Address,
    pub status: CustomerStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Customer {
    const COLLECTION: &'static str = "customers";

    fn id(&self) -> Uuid {
        self.id
    }
}
