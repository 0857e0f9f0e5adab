use super::{
    finance::FinanceService,
    sales::{LineItemInput, OrderInput, SalesService},
};
use crate::{
    errors::ServiceError,
    models::{check_amount_limit, FinancialTransaction, Order, PaymentMethod, SalesChannel},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use slog::Logger;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    pub customer_id: Option<Uuid>,
    #[validate(length(min = 1, message = "the cart is empty"))]
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub discount: Decimal,
    pub payment_method: PaymentMethod,
    /// Cash handed over; when absent the exact total is assumed
    pub amount_tendered: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub amount_tendered: Decimal,
    pub change_due: Decimal,
    /// Settled receivable; absent for zero-total sales
    pub transaction: Option<FinancialTransaction>,
}

/// Register front end over the sales and finance services
#[derive(Clone)]
pub struct PosService {
    sales: SalesService,
    finance: FinanceService,
    logger: Logger,
}

impl PosService {
    pub fn new(sales: SalesService, finance: FinanceService, logger: Logger) -> Self {
        Self {
            sales,
            finance,
            logger,
        }
    }

    /// Prices the cart, checks the tendered amount, then completes the sale
    #[instrument(skip(self, input), fields(lines = input.items.len()))]
    pub async fn checkout(&self, input: CheckoutInput) -> Result<CheckoutReceipt, ServiceError> {
        input.validate()?;

        let mut items = self.sales.build_items(&input.items).await?;
        let totals = crate::models::compute_totals(&mut items, input.discount)?;
        let tendered = input.amount_tendered.unwrap_or(totals.total);
        check_amount_limit("amount tendered", tendered)?;
        if tendered < totals.total {
            return Err(ServiceError::ValidationError(format!(
                "amount tendered {} is below the total {}",
                tendered, totals.total
            )));
        }

        let order = self
            .sales
            .checkout(OrderInput {
                customer_id: input.customer_id,
                items: input.items,
                discount: input.discount,
                channel: Some(SalesChannel::Pos),
                payment_method: Some(input.payment_method),
                notes: None,
            })
            .await?;

        let transaction = match order.transaction_id {
            Some(id) => Some(self.finance.get(id).await?),
            None => None,
        };
        let change_due = (tendered - order.total).round_dp(2);

        slog::info!(self.logger, "checkout";
            "order_id" => %order.id,
            "total" => %order.total,
            "tendered" => %tendered,
            "change" => %change_due);

        Ok(CheckoutReceipt {
            order,
            amount_tendered: tendered,
            change_due,
            transaction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStatus, TransactionStatus};
    use crate::services::test_support::{product_input, services};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn cart(product_id: Uuid, quantity: Decimal, tendered: Option<Decimal>) -> CheckoutInput {
        CheckoutInput {
            customer_id: None,
            items: vec![LineItemInput {
                product_id,
                quantity,
                unit_price: None,
                discount: Decimal::ZERO,
            }],
            discount: Decimal::ZERO,
            payment_method: PaymentMethod::Cash,
            amount_tendered: tendered,
        }
    }

    #[tokio::test]
    async fn checkout_completes_and_settles() {
        let all = services();
        let p = all.products.create(product_input("A", dec!(4.50), dec!(10))).await.unwrap();

        let receipt = all.pos.checkout(cart(p.id, dec!(3), Some(dec!(20)))).await.unwrap();
        assert_eq!(receipt.order.total, dec!(13.50));
        assert_eq!(receipt.order.status, OrderStatus::Completed);
        assert_eq!(receipt.order.channel, SalesChannel::Pos);
        assert_eq!(receipt.change_due, dec!(6.50));

        let tx = receipt.transaction.unwrap();
        assert_eq!(tx.status, TransactionStatus::Paid);
        assert!(tx.paid_at.is_some());
        assert_eq!(all.products.get(p.id).await.unwrap().stock_quantity, dec!(7));
    }

    #[tokio::test]
    async fn short_payment_is_rejected_before_any_write() {
        let all = services();
        let p = all.products.create(product_input("A", dec!(10), dec!(10))).await.unwrap();

        assert_matches!(
            all.pos.checkout(cart(p.id, dec!(2), Some(dec!(19.99)))).await,
            Err(ServiceError::ValidationError(_))
        );
        assert!(all.sales.list(&Default::default()).await.unwrap().is_empty());
        assert_eq!(all.products.get(p.id).await.unwrap().stock_quantity, dec!(10));
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_no_order() {
        let all = services();
        let p = all.products.create(product_input("A", dec!(1), dec!(1))).await.unwrap();
        assert_matches!(
            all.pos.checkout(cart(p.id, dec!(2), None)).await,
            Err(ServiceError::InsufficientStock(_))
        );
        assert!(all.sales.list(&Default::default()).await.unwrap().is_empty());
    }
}
