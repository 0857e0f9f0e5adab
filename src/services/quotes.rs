use super::{
    clean, next_number, resolve,
    sales::{LineItemInput, OrderInput, SalesService},
    today,
};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    models::{compute_totals, Customer, Order, Quote, QuoteStatus},
    store::{matches_search, Record, Repository, SharedStore},
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Days a quote stays valid when the client does not say
pub const DEFAULT_VALIDITY_DAYS: i64 = 15;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct QuoteInput {
    pub customer_id: Uuid,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub discount: Decimal,
    pub valid_until: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct QuoteFilter {
    /// Matches number or customer name
    pub search: Option<String>,
    /// Compared against the effective status, so `expired` works
    pub status: Option<QuoteStatus>,
    pub customer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversionResult {
    pub quote: Quote,
    pub order: Order,
}

#[derive(Clone)]
pub struct QuoteService {
    quotes: Repository<Quote>,
    customers: Repository<Customer>,
    sales: SalesService,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl QuoteService {
    pub fn new(
        store: SharedStore,
        event_sender: Arc<EventSender>,
        sales: SalesService,
        logger: Logger,
    ) -> Self {
        Self {
            quotes: Repository::new(store.clone()),
            customers: Repository::new(store),
            sales,
            event_sender,
            logger,
        }
    }

    fn present(mut quote: Quote, today: NaiveDate) -> Quote {
        quote.status = quote.effective_status(today);
        quote
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &QuoteFilter) -> Result<Vec<Quote>, ServiceError> {
        let today = today();
        let search = filter.search.as_deref();
        let quotes = self
            .quotes
            .find_by(|q| {
                filter
                    .status
                    .map_or(true, |s| q.effective_status(today) == s)
                    && filter.customer_id.map_or(true, |id| q.customer_id == id)
                    && matches_search(
                        search,
                        &[Some(q.number.as_str()), Some(q.customer_name.as_str())],
                    )
            })
            .await?;
        Ok(quotes.into_iter().map(|q| Self::present(q, today)).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Quote, ServiceError> {
        Ok(Self::present(self.quotes.get(id).await?, today()))
    }

    /// Loads a quote for a write, failing if it is past its validity
    async fn load_live(&self, id: Uuid) -> Result<Quote, ServiceError> {
        let quote = self.quotes.get(id).await?;
        if quote.effective_status(today()) == QuoteStatus::Expired {
            return Err(ServiceError::InvalidStatus(format!(
                "quote {} expired on {}",
                quote.number, quote.valid_until
            )));
        }
        Ok(quote)
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: QuoteInput) -> Result<Quote, ServiceError> {
        input.validate()?;
        let customer = resolve(&self.customers, input.customer_id, "customer").await?;
        let mut items = self.sales.build_items(&input.items).await?;
        let totals = compute_totals(&mut items, input.discount)?;
        let valid_until = input
            .valid_until
            .unwrap_or_else(|| today() + Duration::days(DEFAULT_VALIDITY_DAYS));
        let number = {
            let existing = self.quotes.list().await?;
            next_number("QT", existing.iter().map(|q| q.number.as_str()))
        };

        let now = Utc::now();
        let quote = Quote {
            id: Uuid::new_v4(),
            number,
            customer_id: customer.id,
            customer_name: customer.name,
            items,
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            valid_until,
            status: QuoteStatus::Draft,
            notes: clean(input.notes),
            sent_at: None,
            order_id: None,
            created_at: now,
            updated_at: now,
        };

        let saved = self.quotes.insert(&quote).await?;
        self.event_sender
            .send_or_log(Event::created(Quote::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "quote created"; "quote_id" => %saved.id, "number" => &saved.number);
        Ok(Self::present(saved, today()))
    }

    /// Draft and sent quotes can be edited; totals are recomputed
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: QuoteInput) -> Result<Quote, ServiceError> {
        input.validate()?;
        let mut quote = self.quotes.get(id).await?;
        if !quote.status.is_open() {
            return Err(ServiceError::InvalidStatus(format!(
                "quote {} is {} and can no longer be edited",
                quote.number, quote.status
            )));
        }

        let customer = resolve(&self.customers, input.customer_id, "customer").await?;
        let mut items = self.sales.build_items(&input.items).await?;
        let totals = compute_totals(&mut items, input.discount)?;
        quote.customer_id = customer.id;
        quote.customer_name = customer.name;
        quote.items = items;
        quote.subtotal = totals.subtotal;
        quote.discount = totals.discount;
        quote.total = totals.total;
        if let Some(valid_until) = input.valid_until {
            quote.valid_until = valid_until;
        }
        quote.notes = clean(input.notes);

        let saved = self.quotes.save(&quote).await?;
        self.event_sender
            .send_or_log(Event::updated(Quote::COLLECTION, id))
            .await;
        Ok(Self::present(saved, today()))
    }

    async fn transition(&self, id: Uuid, next: QuoteStatus) -> Result<Quote, ServiceError> {
        let mut quote = self.load_live(id).await?;
        if !quote.status.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "quote {} cannot go from {} to {}",
                quote.number, quote.status, next
            )));
        }
        quote.status = next;
        if next == QuoteStatus::Sent {
            quote.sent_at = Some(Utc::now());
        }
        let saved = self.quotes.save(&quote).await?;
        self.event_sender
            .send_or_log(Event::updated(Quote::COLLECTION, id))
            .await;
        info!(quote_id = %id, status = %next, "Quote status changed");
        Ok(saved)
    }

    pub async fn send(&self, id: Uuid) -> Result<Quote, ServiceError> {
        self.transition(id, QuoteStatus::Sent).await
    }

    pub async fn accept(&self, id: Uuid) -> Result<Quote, ServiceError> {
        self.transition(id, QuoteStatus::Accepted).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<Quote, ServiceError> {
        self.transition(id, QuoteStatus::Rejected).await
    }

    /// Turns an accepted quote into a pending order at the quoted prices
    #[instrument(skip(self))]
    pub async fn convert(&self, id: Uuid) -> Result<ConversionResult, ServiceError> {
        let mut quote = self.quotes.get(id).await?;
        if !quote.status.can_transition_to(QuoteStatus::Converted) {
            return Err(ServiceError::InvalidStatus(format!(
                "only accepted quotes can be converted, quote {} is {}",
                quote.number,
                quote.effective_status(today())
            )));
        }

        let order = self
            .sales
            .create_from_quote(
                quote.id,
                OrderInput {
                    customer_id: Some(quote.customer_id),
                    items: quote.items.iter().map(LineItemInput::from).collect(),
                    discount: quote.discount,
                    channel: None,
                    payment_method: None,
                    notes: quote.notes.clone(),
                },
            )
            .await?;

        quote.status = QuoteStatus::Converted;
        quote.order_id = Some(order.id);
        let quote = self.quotes.save(&quote).await?;

        self.event_sender
            .send_or_log(Event::QuoteConverted {
                quote_id: quote.id,
                order_id: order.id,
            })
            .await;
        slog::info!(self.logger, "quote converted";
            "quote_id" => %quote.id,
            "order_id" => %order.id,
            "order_number" => &order.number);
        Ok(ConversionResult { quote, order })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.quotes.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Quote::COLLECTION, id))
            .await;
        Ok(())
    }
}
