use super::{
    clean, finance::FinanceService, next_number, resolve, stock::MovementInput,
    stock::StockService,
};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{
        compute_totals, Customer, LineItem, MovementKind, MovementStatus, Order, OrderStatus,
        PaymentMethod, Product, SalesChannel,
    },
    store::{matches_search, Record, Repository, SharedStore},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// One cart/order line as submitted by the client
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LineItemInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    /// Defaults to the product's current price
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub discount: Decimal,
}

impl From<&LineItem> for LineItemInput {
    fn from(item: &LineItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: Some(item.unit_price),
            discount: item.discount,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct OrderInput {
    pub customer_id: Option<Uuid>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub discount: Decimal,
    pub channel: Option<SalesChannel>,
    pub payment_method: Option<PaymentMethod>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct OrderFilter {
    /// Matches number or customer name
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub customer_id: Option<Uuid>,
    pub channel: Option<SalesChannel>,
}

#[derive(Clone)]
pub struct SalesService {
    orders: Repository<Order>,
    products: Repository<Product>,
    customers: Repository<Customer>,
    stock: StockService,
    finance: FinanceService,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl SalesService {
    pub fn new(
        store: SharedStore,
        event_sender: Arc<EventSender>,
        stock: StockService,
        finance: FinanceService,
        logger: Logger,
    ) -> Self {
        Self {
            orders: Repository::new(store.clone()),
            products: Repository::new(store.clone()),
            customers: Repository::new(store),
            stock,
            finance,
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let search = filter.search.as_deref();
        self.orders
            .find_by(|o| {
                filter.status.map_or(true, |s| o.status == s)
                    && filter.channel.map_or(true, |c| o.channel == c)
                    && filter
                        .customer_id
                        .map_or(true, |id| o.customer_id == Some(id))
                    && matches_search(
                        search,
                        &[Some(o.number.as_str()), o.customer_name.as_deref()],
                    )
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, ServiceError> {
        self.orders.get(id).await
    }

    /// Resolves products and prices, then recomputes every total
    pub(crate) async fn build_items(
        &self,
        inputs: &[LineItemInput],
    ) -> Result<Vec<LineItem>, ServiceError> {
        let mut items = Vec::with_capacity(inputs.len());
        for input in inputs {
            let product = resolve(&self.products, input.product_id, "product").await?;
            items.push(LineItem {
                product_id: product.id,
                product_name: product.name,
                quantity: input.quantity,
                unit_price: input.unit_price.unwrap_or(product.price),
                discount: input.discount,
                total: Decimal::ZERO,
            });
        }
        Ok(items)
    }

    pub(crate) async fn customer_name(
        &self,
        customer_id: Option<Uuid>,
    ) -> Result<Option<String>, ServiceError> {
        match customer_id {
            Some(id) => Ok(Some(resolve(&self.customers, id, "customer").await?.name)),
            None => Ok(None),
        }
    }

    /// Pending order, validated and priced but not yet stored
    async fn draft(&self, input: OrderInput, quote_id: Option<Uuid>) -> Result<Order, ServiceError> {
        input.validate()?;
        let mut items = self.build_items(&input.items).await?;
        let totals = compute_totals(&mut items, input.discount)?;
        let customer_name = self.customer_name(input.customer_id).await?;
        let number = {
            let existing = self.orders.list().await?;
            next_number("SO", existing.iter().map(|o| o.number.as_str()))
        };

        let now = Utc::now();
        Ok(Order {
            id: Uuid::new_v4(),
            number,
            customer_id: input.customer_id,
            customer_name,
            items,
            subtotal: totals.subtotal,
            discount: totals.discount,
            total: totals.total,
            status: OrderStatus::Pending,
            channel: input.channel.unwrap_or_default(),
            payment_method: input.payment_method,
            notes: clean(input.notes),
            quote_id,
            stock_movement_ids: Vec::new(),
            transaction_id: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn store_new(&self, order: &Order) -> Result<Order, ServiceError> {
        let saved = self.orders.insert(order).await?;
        self.event_sender
            .send_or_log(Event::created(Order::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "order created";
            "order_id" => %saved.id,
            "number" => &saved.number,
            "total" => %saved.total);
        info!(order_id = %saved.id, number = %saved.number, "Order created");
        Ok(saved)
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: OrderInput) -> Result<Order, ServiceError> {
        let order = self.draft(input, None).await?;
        self.store_new(&order).await
    }

    /// Pending order carrying a quote's lines at the quoted prices
    pub(crate) async fn create_from_quote(
        &self,
        quote_id: Uuid,
        input: OrderInput,
    ) -> Result<Order, ServiceError> {
        let order = self.draft(input, Some(quote_id)).await?;
        self.store_new(&order).await
    }

    /// Register sale: stored and completed in one step, receivable settled
    pub(crate) async fn checkout(&self, input: OrderInput) -> Result<Order, ServiceError> {
        let order = self.draft(input, None).await?;
        self.stock.check_availability(&demand(&order)).await?;
        let order = self.store_new(&order).await?;
        self.complete(order, true).await
    }

    /// Replaces lines and header of an order that has not been completed
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: Uuid, input: OrderInput) -> Result<Order, ServiceError> {
        input.validate()?;
        let mut order = self.orders.get(id).await?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} is {} and can no longer be edited",
                order.number, order.status
            )));
        }

        let mut items = self.build_items(&input.items).await?;
        let totals = compute_totals(&mut items, input.discount)?;
        order.customer_name = self.customer_name(input.customer_id).await?;
        order.customer_id = input.customer_id;
        order.items = items;
        order.subtotal = totals.subtotal;
        order.discount = totals.discount;
        order.total = totals.total;
        order.channel = input.channel.unwrap_or(order.channel);
        order.payment_method = input.payment_method;
        order.notes = clean(input.notes);

        let saved = self.orders.save(&order).await?;
        self.event_sender
            .send_or_log(Event::updated(Order::COLLECTION, id))
            .await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn change_status(&self, id: Uuid, next: OrderStatus) -> Result<Order, ServiceError> {
        let mut order = self.orders.get(id).await?;
        if !order.status.can_transition_to(next) {
            return Err(ServiceError::InvalidStatus(format!(
                "order {} cannot go from {} to {}",
                order.number, order.status, next
            )));
        }

        match next {
            OrderStatus::Completed => self.complete(order, false).await,
            OrderStatus::Cancelled => self.cancel(order).await,
            _ => {
                order.status = next;
                let saved = self.orders.save(&order).await?;
                self.event_sender
                    .send_or_log(Event::updated(Order::COLLECTION, id))
                    .await;
                Ok(saved)
            }
        }
    }

    /// Writes one stock exit per line and the receivable. Availability of
    /// every line is checked before the first write.
    async fn complete(&self, mut order: Order, settle: bool) -> Result<Order, ServiceError> {
        self.stock.check_availability(&demand(&order)).await?;

        for item in &order.items {
            let movement = self
                .stock
                .record(MovementInput {
                    product_id: item.product_id,
                    kind: MovementKind::Exit,
                    quantity: item.quantity,
                    reason: Some(format!("Sale {}", order.number)),
                    reference_id: Some(order.id),
                })
                .await
                .map_err(|e| {
                    error!(order_id = %order.id, error = %e, "Stock exit failed while completing sale");
                    e
                })?;
            order.stock_movement_ids.push(movement.id);
        }

        order.transaction_id = self
            .finance
            .record_sale(&order, settle)
            .await?
            .map(|t| t.id);
        order.status = OrderStatus::Completed;
        order.completed_at = Some(Utc::now());
        let saved = self.orders.save(&order).await?;

        metrics::record_sale_completed();
        self.event_sender
            .send_or_log(Event::SaleCompleted {
                order_id: saved.id,
                total: saved.total,
            })
            .await;
        slog::info!(self.logger, "sale completed";
            "order_id" => %saved.id,
            "number" => &saved.number,
            "total" => %saved.total,
            "channel" => saved.channel.as_ref());
        Ok(saved)
    }

    /// A completed sale gets its stock exits reversed and its pending
    /// receivable cancelled
    async fn cancel(&self, mut order: Order) -> Result<Order, ServiceError> {
        if order.status == OrderStatus::Completed {
            for movement_id in &order.stock_movement_ids {
                let movement = self.stock.get(*movement_id).await?;
                if movement.status == MovementStatus::Completed {
                    self.stock.reverse(*movement_id).await?;
                }
            }
            if let Some(transaction_id) = order.transaction_id {
                self.finance.void_sale(transaction_id).await?;
            }
        }

        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(Utc::now());
        let saved = self.orders.save(&order).await?;
        self.event_sender
            .send_or_log(Event::SaleCancelled { order_id: saved.id })
            .await;
        slog::info!(self.logger, "sale cancelled"; "order_id" => %saved.id, "number" => &saved.number);
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let order = self.orders.get(id).await?;
        if order.status == OrderStatus::Completed {
            return Err(ServiceError::InvalidOperation(format!(
                "order {} is completed; cancel it before deleting",
                order.number
            )));
        }
        self.orders.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(Order::COLLECTION, id))
            .await;
        slog::info!(self.logger, "order deleted"; "order_id" => %id);
        Ok(())
    }
}

fn demand(order: &Order) -> Vec<(Uuid, Decimal)> {
    order
        .items
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect()
}
