use super::clean;
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{check_amount_limit, MovementKind, MovementStatus, Product, StockMovement},
    store::{Repository, SharedStore},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use slog::Logger;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct MovementInput {
    pub product_id: Uuid,
    pub kind: MovementKind,
    /// Amount moved; for adjustments, the new absolute stock level
    pub quantity: Decimal,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct MovementFilter {
    pub product_id: Option<Uuid>,
    pub kind: Option<MovementKind>,
    pub status: Option<MovementStatus>,
    pub reference_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct StockService {
    products: Repository<Product>,
    movements: Repository<StockMovement>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl StockService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            products: Repository::new(store.clone()),
            movements: Repository::new(store),
            event_sender,
            logger,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, ServiceError> {
        self.movements
            .find_by(|m| {
                filter.product_id.map_or(true, |id| m.product_id == id)
                    && filter.kind.map_or(true, |k| m.kind == k)
                    && filter.status.map_or(true, |s| m.status == s)
                    && filter
                        .reference_id
                        .map_or(true, |r| m.reference_id == Some(r))
            })
            .await
    }

    /// Movements of one product, newest first
    pub async fn history(&self, product_id: Uuid) -> Result<Vec<StockMovement>, ServiceError> {
        self.products.get(product_id).await?;
        self.list(&MovementFilter {
            product_id: Some(product_id),
            ..Default::default()
        })
        .await
    }

    pub async fn get(&self, id: Uuid) -> Result<StockMovement, ServiceError> {
        self.movements.get(id).await
    }

    /// Fails with `InsufficientStock` unless every product can cover the summed quantity.
    /// Returns the products keyed by id.
    pub async fn check_availability(
        &self,
        lines: &[(Uuid, Decimal)],
    ) -> Result<HashMap<Uuid, Product>, ServiceError> {
        let mut wanted: HashMap<Uuid, Decimal> = HashMap::new();
        for (product_id, quantity) in lines {
            let total = wanted.entry(*product_id).or_default();
            *total = total.saturating_add(*quantity);
        }

        let mut products = HashMap::with_capacity(wanted.len());
        for (product_id, quantity) in wanted {
            let product = self.products.find(product_id).await?.ok_or_else(|| {
                ServiceError::ValidationError(format!("product {} does not exist", product_id))
            })?;
            if product.stock_quantity < quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} ({}): requested {}, available {}",
                    product.name, product.sku, quantity, product.stock_quantity
                )));
            }
            products.insert(product_id, product);
        }
        Ok(products)
    }

    /// Applies a movement to the product and records it
    #[instrument(skip(self, input), fields(product_id = %input.product_id, kind = %input.kind))]
    pub async fn record(&self, input: MovementInput) -> Result<StockMovement, ServiceError> {
        input.validate()?;
        let positive_required = input.kind != MovementKind::Adjustment;
        if (positive_required && input.quantity <= Decimal::ZERO) || input.quantity < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "quantity must be greater than zero (adjustments may be zero)".into(),
            ));
        }
        check_amount_limit("quantity", input.quantity)?;

        let mut product = self.products.get(input.product_id).await?;
        let previous = product.stock_quantity;
        let resulting = input.kind.apply(previous, input.quantity).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "{} ({}): resulting stock is out of range",
                product.name, product.sku
            ))
        })?;
        if resulting < Decimal::ZERO {
            return Err(ServiceError::InsufficientStock(format!(
                "{} ({}): requested {}, available {}",
                product.name, product.sku, input.quantity, previous
            )));
        }

        product.stock_quantity = resulting;
        let product = self.products.save(&product).await?;

        let now = Utc::now();
        let movement = StockMovement {
            id: Uuid::new_v4(),
            product_id: product.id,
            product_name: product.name.clone(),
            kind: input.kind,
            quantity: input.quantity,
            previous_quantity: previous,
            resulting_quantity: resulting,
            reason: clean(input.reason),
            reference_id: input.reference_id,
            status: MovementStatus::Completed,
            reversed_at: None,
            created_at: now,
            updated_at: now,
        };
        let movement = self.movements.insert(&movement).await?;

        metrics::record_stock_movement(movement.kind.as_ref());
        slog::info!(self.logger, "stock movement recorded";
            "movement_id" => %movement.id,
            "product_id" => %product.id,
            "kind" => movement.kind.as_ref(),
            "previous" => %previous,
            "resulting" => %resulting);
        self.after_change(&product, movement.id, previous).await;

        Ok(movement)
    }

    /// Undoes a completed movement; the product must still be able to absorb it
    #[instrument(skip(self))]
    pub async fn reverse(&self, id: Uuid) -> Result<StockMovement, ServiceError> {
        let mut movement = self.movements.get(id).await?;
        if movement.status == MovementStatus::Reversed {
            return Err(ServiceError::InvalidOperation(format!(
                "movement {} is already reversed",
                id
            )));
        }

        let mut product = self.products.get(movement.product_id).await?;
        let previous = product.stock_quantity;
        let resulting = previous - movement.delta();
        if resulting < Decimal::ZERO {
            return Err(ServiceError::InsufficientStock(format!(
                "{} ({}): reversing needs {}, available {}",
                product.name,
                product.sku,
                movement.delta(),
                previous
            )));
        }

        product.stock_quantity = resulting;
        let product = self.products.save(&product).await?;

        movement.status = MovementStatus::Reversed;
        movement.reversed_at = Some(Utc::now());
        let movement = self.movements.save(&movement).await?;

        slog::info!(self.logger, "stock movement reversed";
            "movement_id" => %movement.id,
            "product_id" => %product.id,
            "resulting" => %resulting);
        self.after_change(&product, movement.id, previous).await;

        Ok(movement)
    }

    async fn after_change(&self, product: &Product, movement_id: Uuid, previous: Decimal) {
        self.event_sender
            .send_or_log(Event::StockMoved {
                product_id: product.id,
                movement_id,
                previous_quantity: previous,
                resulting_quantity: product.stock_quantity,
            })
            .await;

        if product.stock_quantity < previous && product.is_low_stock() {
            warn!(product_id = %product.id, stock = %product.stock_quantity, "Product reached minimum stock");
            self.event_sender
                .send_or_log(Event::LowStock {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    stock_quantity: product.stock_quantity,
                    min_stock: product.min_stock,
                })
                .await;
        } else {
            info!(product_id = %product.id, stock = %product.stock_quantity, "Stock updated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MAX_AMOUNT;
    use crate::services::test_support::{product_input, services, services_with_events};
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn movement(product_id: Uuid, kind: MovementKind, quantity: Decimal) -> MovementInput {
        MovementInput {
            product_id,
            kind,
            quantity,
            reason: None,
            reference_id: None,
        }
    }

    #[tokio::test]
    async fn entry_exit_and_adjustment() {
        let all = services();
        let product = all
            .products
            .create(product_input("A", dec!(10), dec!(5)))
            .await
            .unwrap();

        let m = all
            .stock
            .record(movement(product.id, MovementKind::Entry, dec!(3)))
            .await
            .unwrap();
        assert_eq!((m.previous_quantity, m.resulting_quantity), (dec!(5), dec!(8)));

        all.stock
            .record(movement(product.id, MovementKind::Exit, dec!(8)))
            .await
            .unwrap();
        assert_eq!(all.products.get(product.id).await.unwrap().stock_quantity, dec!(0));

        let m = all
            .stock
            .record(movement(product.id, MovementKind::Adjustment, dec!(42)))
            .await
            .unwrap();
        assert_eq!(m.delta(), dec!(42));
        assert_eq!(all.stock.history(product.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn exit_to_minimum_emits_moved_then_low_stock() {
        let (all, mut events) = services_with_events();
        let product = all
            .products
            .create(product_input("L", dec!(2), dec!(5)))
            .await
            .unwrap();
        all.stock
            .record(movement(product.id, MovementKind::Exit, dec!(4)))
            .await
            .unwrap();

        assert_matches!(events.recv().await, Some(Event::DocumentCreated { id, .. }) if id == product.id);
        assert_matches!(
            events.recv().await,
            Some(Event::StockMoved { previous_quantity, resulting_quantity, .. })
                if previous_quantity == dec!(5) && resulting_quantity == dec!(1)
        );
        assert_matches!(
            events.recv().await,
            Some(Event::LowStock { product_id, .. }) if product_id == product.id
        );
    }

    #[tokio::test]
    async fn quantity_above_the_limit_is_rejected() {
        let all = services();
        let product = all
            .products
            .create(product_input("Q", dec!(1), dec!(5)))
            .await
            .unwrap();

        assert_matches!(
            all.stock
                .record(movement(product.id, MovementKind::Entry, MAX_AMOUNT + dec!(1)))
                .await,
            Err(ServiceError::ValidationError(_))
        );
        assert_eq!(all.products.get(product.id).await.unwrap().stock_quantity, dec!(5));
    }

    #[tokio::test]
    async fn exit_beyond_stock_is_rejected_without_writes() {
        let all = services();
        let product = all
            .products
            .create(product_input("B", dec!(10), dec!(2)))
            .await
            .unwrap();

        assert_matches!(
            all.stock
                .record(movement(product.id, MovementKind::Exit, dec!(3)))
                .await,
            Err(ServiceError::InsufficientStock(_))
        );
        assert_eq!(all.products.get(product.id).await.unwrap().stock_quantity, dec!(2));
        assert!(all.stock.history(product.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_only_for_adjustments() {
        let all = services();
        let product = all
            .products
            .create(product_input("C", dec!(10), dec!(2)))
            .await
            .unwrap();
        assert_matches!(
            all.stock
                .record(movement(product.id, MovementKind::Entry, dec!(0)))
                .await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(all
            .stock
            .record(movement(product.id, MovementKind::Adjustment, dec!(0)))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn reversal_restores_and_refuses_negative_stock() {
        let all = services();
        let product = all
            .products
            .create(product_input("D", dec!(10), dec!(0)))
            .await
            .unwrap();

        let entry = all
            .stock
            .record(movement(product.id, MovementKind::Entry, dec!(5)))
            .await
            .unwrap();
        all.stock
            .record(movement(product.id, MovementKind::Exit, dec!(4)))
            .await
            .unwrap();

        // only 1 left, reversing the entry of 5 would go negative
        assert_matches!(
            all.stock.reverse(entry.id).await,
            Err(ServiceError::InsufficientStock(_))
        );

        all.stock
            .record(movement(product.id, MovementKind::Entry, dec!(10)))
            .await
            .unwrap();
        let reversed = all.stock.reverse(entry.id).await.unwrap();
        assert_eq!(reversed.status, MovementStatus::Reversed);
        assert!(reversed.reversed_at.is_some());
        assert_eq!(all.products.get(product.id).await.unwrap().stock_quantity, dec!(6));

        assert_matches!(
            all.stock.reverse(entry.id).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn availability_sums_repeated_products() {
        let all = services();
        let product = all
            .products
            .create(product_input("E", dec!(10), dec!(5)))
            .await
            .unwrap();

        assert!(all
            .stock
            .check_availability(&[(product.id, dec!(2)), (product.id, dec!(3))])
            .await
            .is_ok());
        assert_matches!(
            all.stock
                .check_availability(&[(product.id, dec!(3)), (product.id, dec!(3))])
                .await,
            Err(ServiceError::InsufficientStock(_))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn stock_never_goes_negative(ops in prop::collection::vec((0u8..3, 0u32..20), 1..25)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let all = services();
                let product = all
                    .products
                    .create(product_input("P", dec!(1), dec!(5)))
                    .await
                    .unwrap();

                let mut ids = Vec::new();
                for (kind, qty) in ops {
                    let kind = match kind {
                        0 => MovementKind::Entry,
                        1 => MovementKind::Exit,
                        _ => MovementKind::Adjustment,
                    };
                    if let Ok(m) = all.stock.record(movement(product.id, kind, Decimal::from(qty))).await {
                        ids.push(m.id);
                    }
                    if qty % 4 == 0 {
                        if let Some(id) = ids.first() {
                            let _ = all.stock.reverse(*id).await;
                        }
                    }
                    let current = all.products.get(product.id).await.unwrap().stock_quantity;
                    assert!(current >= Decimal::ZERO);
                }
            });
        }
    }
}
