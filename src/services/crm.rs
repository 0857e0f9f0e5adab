use super::{clean, resolve};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        check_amount_limit, Campaign, CampaignStatus, Customer, Opportunity, OpportunityStage,
    },
    store::{matches_search, Record, Repository, SharedStore},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use strum::IntoEnumIterator;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CampaignInput {
    #[validate(length(min = 1, max = 200, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub target_audience: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub budget: Decimal,
    #[serde(default)]
    pub spent: Decimal,
    pub status: Option<CampaignStatus>,
}

impl CampaignInput {
    fn check(&self) -> Result<(), ServiceError> {
        self.validate()?;
        if self.budget < Decimal::ZERO || self.spent < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "budget and spent cannot be negative".into(),
            ));
        }
        check_amount_limit("budget", self.budget)?;
        check_amount_limit("spent", self.spent)?;
        if self.end_date.map_or(false, |end| end < self.start_date) {
            return Err(ServiceError::ValidationError(
                "end date cannot be before the start date".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CampaignFilter {
    pub search: Option<String>,
    pub status: Option<CampaignStatus>,
}

#[derive(Clone)]
pub struct CampaignService {
    campaigns: Repository<Campaign>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl CampaignService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            campaigns: Repository::new(store),
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, ServiceError> {
        let search = filter.search.as_deref();
        self.campaigns
            .find_by(|c| {
                filter.status.map_or(true, |s| c.status == s)
                    && matches_search(
                        search,
                        &[
                            Some(c.name.as_str()),
                            c.channel.as_deref(),
                            c.target_audience.as_deref(),
                        ],
                    )
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Campaign, ServiceError> {
        self.campaigns.get(id).await
    }

    fn apply(campaign: &mut Campaign, input: CampaignInput) {
        campaign.name = input.name.trim().to_string();
        campaign.description = clean(input.description);
        campaign.channel = clean(input.channel);
        campaign.target_audience = clean(input.target_audience);
        campaign.start_date = input.start_date;
        campaign.end_date = input.end_date;
        campaign.budget = input.budget;
        campaign.spent = input.spent;
        campaign.status = input.status.unwrap_or(campaign.status);
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: CampaignInput) -> Result<Campaign, ServiceError> {
        input.check()?;
        let now = Utc::now();
        let mut campaign = Campaign {
            id: Uuid::new_v4(),
            name: String::new(),
            description: None,
            channel: None,
            target_audience: None,
            start_date: input.start_date,
            end_date: None,
            budget: Decimal::ZERO,
            spent: Decimal::ZERO,
            status: CampaignStatus::default(),
            created_at: now,
            updated_at: now,
        };
        Self::apply(&mut campaign, input);

        let saved = self.campaigns.insert(&campaign).await?;
        self.event_sender
            .send_or_log(Event::created(Campaign::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "campaign created"; "campaign_id" => %saved.id);
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: CampaignInput) -> Result<Campaign, ServiceError> {
        input.check()?;
        let mut campaign = self.campaigns.get(id).await?;
        Self::apply(&mut campaign, input);
        let saved = self.campaigns.save(&campaign).await?;
        self.event_sender
            .send_or_log(Event::updated(Campaign::COLLECTION, id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.campaigns.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Campaign::COLLECTION, id))
            .await;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct OpportunityInput {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    pub customer_id: Uuid,
    pub value: Decimal,
    pub stage: Option<OpportunityStage>,
    /// 0-100, pinned by closed stages
    #[validate(range(min = 0, max = 100))]
    pub probability: Option<u8>,
    pub expected_close_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct StageChange {
    pub stage: OpportunityStage,
    #[validate(range(min = 0, max = 100))]
    pub probability: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct OpportunityFilter {
    pub search: Option<String>,
    pub stage: Option<OpportunityStage>,
    pub customer_id: Option<Uuid>,
}

/// Per-stage totals of the sales pipeline
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StageSummary {
    pub stage: OpportunityStage,
    pub count: usize,
    pub total_value: Decimal,
    pub weighted_value: Decimal,
}

/// Every stage in pipeline order, including empty ones
pub fn pipeline_summary(opportunities: &[Opportunity]) -> Vec<StageSummary> {
    OpportunityStage::iter()
        .map(|stage| {
            let in_stage = opportunities.iter().filter(|o| o.stage == stage);
            let (count, total_value, weighted_value) = in_stage.fold(
                (0, Decimal::ZERO, Decimal::ZERO),
                |(n, total, weighted): (usize, Decimal, Decimal), o| {
                    (
                        n + 1,
                        total.saturating_add(o.value),
                        weighted.saturating_add(o.weighted_value()),
                    )
                },
            );
            StageSummary {
                stage,
                count,
                total_value,
                weighted_value: weighted_value.round_dp(2),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct OpportunityService {
    opportunities: Repository<Opportunity>,
    customers: Repository<Customer>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl OpportunityService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            opportunities: Repository::new(store.clone()),
            customers: Repository::new(store),
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &OpportunityFilter) -> Result<Vec<Opportunity>, ServiceError> {
        let search = filter.search.as_deref();
        self.opportunities
            .find_by(|o| {
                filter.stage.map_or(true, |s| o.stage == s)
                    && filter.customer_id.map_or(true, |id| o.customer_id == id)
                    && matches_search(
                        search,
                        &[Some(o.title.as_str()), Some(o.customer_name.as_str())],
                    )
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Opportunity, ServiceError> {
        self.opportunities.get(id).await
    }

    pub async fn pipeline(&self) -> Result<Vec<StageSummary>, ServiceError> {
        Ok(pipeline_summary(&self.opportunities.list().await?))
    }

    fn set_stage(opportunity: &mut Opportunity, stage: OpportunityStage, probability: Option<u8>) {
        let requested = probability.unwrap_or(opportunity.probability);
        opportunity.probability = stage.apply_probability(requested);
        if stage.is_closed() && !opportunity.stage.is_closed() {
            opportunity.closed_at = Some(Utc::now());
        } else if !stage.is_closed() {
            opportunity.closed_at = None;
        }
        opportunity.stage = stage;
    }

    async fn prepare(&self, input: &OpportunityInput) -> Result<Customer, ServiceError> {
        input.validate()?;
        if input.value < Decimal::ZERO {
            return Err(ServiceError::ValidationError("value cannot be negative".into()));
        }
        check_amount_limit("value", input.value)?;
        resolve(&self.customers, input.customer_id, "customer").await
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: OpportunityInput) -> Result<Opportunity, ServiceError> {
        let customer = self.prepare(&input).await?;
        let now = Utc::now();
        let mut opportunity = Opportunity {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            customer_id: customer.id,
            customer_name: customer.name,
            value: input.value,
            stage: OpportunityStage::default(),
            probability: 0,
            expected_close_date: input.expected_close_date,
            notes: clean(input.notes),
            closed_at: None,
            created_at: now,
            updated_at: now,
        };
        Self::set_stage(
            &mut opportunity,
            input.stage.unwrap_or_default(),
            input.probability,
        );

        let saved = self.opportunities.insert(&opportunity).await?;
        self.event_sender
            .send_or_log(Event::created(Opportunity::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "opportunity created"; "opportunity_id" => %saved.id, "value" => %saved.value);
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: OpportunityInput) -> Result<Opportunity, ServiceError> {
        let customer = self.prepare(&input).await?;
        let mut opportunity = self.opportunities.get(id).await?;
        opportunity.title = input.title.trim().to_string();
        opportunity.customer_id = customer.id;
        opportunity.customer_name = customer.name;
        opportunity.value = input.value;
        opportunity.expected_close_date = input.expected_close_date;
        opportunity.notes = clean(input.notes);
        let stage = input.stage.unwrap_or(opportunity.stage);
        Self::set_stage(&mut opportunity, stage, input.probability);

        let saved = self.opportunities.save(&opportunity).await?;
        self.event_sender
            .send_or_log(Event::updated(Opportunity::COLLECTION, id))
            .await;
        Ok(saved)
    }

    /// Moves the opportunity through the pipeline
    #[instrument(skip(self, change), fields(stage = %change.stage))]
    pub async fn change_stage(&self, id: Uuid, change: StageChange) -> Result<Opportunity, ServiceError> {
        change.validate()?;
        let mut opportunity = self.opportunities.get(id).await?;
        Self::set_stage(&mut opportunity, change.stage, change.probability);

        let saved = self.opportunities.save(&opportunity).await?;
        self.event_sender
            .send_or_log(Event::OpportunityStageChanged {
                opportunity_id: id,
                stage: saved.stage.to_string(),
            })
            .await;
        info!(opportunity_id = %id, stage = %saved.stage, probability = saved.probability, "Opportunity stage changed");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.opportunities.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Opportunity::COLLECTION, id))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use crate::services::customers::CustomerInput;
    use crate::services::test_support::services;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn campaign(start: NaiveDate, end: Option<NaiveDate>) -> CampaignInput {
        CampaignInput {
            name: "Winter sale".into(),
            description: None,
            channel: Some("email".into()),
            target_audience: None,
            start_date: start,
            end_date: end,
            budget: dec!(1000),
            spent: dec!(0),
            status: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn campaign_dates_and_amounts_are_checked() {
        let svc = services().campaigns;
        assert!(svc
            .create(campaign(date(2024, 6, 1), Some(date(2024, 6, 1))))
            .await
            .is_ok());
        assert_matches!(
            svc.create(campaign(date(2024, 6, 2), Some(date(2024, 6, 1)))).await,
            Err(ServiceError::ValidationError(_))
        );
        let mut negative = campaign(date(2024, 6, 1), None);
        negative.spent = dec!(-1);
        assert_matches!(svc.create(negative).await, Err(ServiceError::ValidationError(_)));
    }

    async fn customer(all: &crate::services::Services) -> Uuid {
        all.customers
            .create(CustomerInput {
                name: "Ana".into(),
                email: None,
                phone: None,
                tax_id: None,
                address: Address::default(),
                status: None,
                notes: None,
            })
            .await
            .unwrap()
            .id
    }

    fn opportunity(customer_id: Uuid, value: Decimal, probability: u8) -> OpportunityInput {
        OpportunityInput {
            title: "Fleet renewal".into(),
            customer_id,
            value,
            stage: None,
            probability: Some(probability),
            expected_close_date: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn closing_stages_pin_probability() {
        let all = services();
        let customer_id = customer(&all).await;
        let opp = all
            .opportunities
            .create(opportunity(customer_id, dec!(5000), 40))
            .await
            .unwrap();
        assert_eq!(opp.customer_name, "Ana");
        assert_eq!(opp.probability, 40);

        let won = all
            .opportunities
            .change_stage(
                opp.id,
                StageChange {
                    stage: OpportunityStage::Won,
                    probability: Some(10),
                },
            )
            .await
            .unwrap();
        assert_eq!(won.probability, 100);
        assert!(won.closed_at.is_some());

        let reopened = all
            .opportunities
            .change_stage(
                opp.id,
                StageChange {
                    stage: OpportunityStage::Negotiation,
                    probability: Some(70),
                },
            )
            .await
            .unwrap();
        assert_eq!(reopened.probability, 70);
        assert!(reopened.closed_at.is_none());
    }

    #[tokio::test]
    async fn probability_above_100_is_rejected() {
        let all = services();
        let customer_id = customer(&all).await;
        assert_matches!(
            all.opportunities
                .create(opportunity(customer_id, dec!(1), 101))
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn pipeline_totals_per_stage() {
        let all = services();
        let customer_id = customer(&all).await;
        all.opportunities
            .create(opportunity(customer_id, dec!(1000), 50))
            .await
            .unwrap();
        all.opportunities
            .create(opportunity(customer_id, dec!(3000), 10))
            .await
            .unwrap();

        let summary = all.opportunities.pipeline().await.unwrap();
        assert_eq!(summary.len(), 6);
        let prospecting = &summary[0];
        assert_eq!(prospecting.stage, OpportunityStage::Prospecting);
        assert_eq!(prospecting.count, 2);
        assert_eq!(prospecting.total_value, dec!(4000));
        assert_eq!(prospecting.weighted_value, dec!(800));
        assert!(summary[1..].iter().all(|s| s.count == 0));
    }
}
