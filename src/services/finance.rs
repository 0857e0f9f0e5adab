use super::{clean, resolve, today};
use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    metrics,
    models::{
        check_amount_limit, Customer, FinancialTransaction, Order, PaymentMethod, Supplier, TransactionKind,
        TransactionStatus,
    },
    store::{matches_search, Record, Repository, SharedStore},
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use slog::Logger;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Category used for receivables generated by sales
pub const SALES_CATEGORY: &str = "sales";

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TransactionInput {
    #[validate(length(min = 1, max = 200, message = "Description is required"))]
    pub description: String,
    pub kind: TransactionKind,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub payment_method: Option<PaymentMethod>,
    /// Customer for income, supplier for expense
    pub counterparty_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PayInput {
    /// Defaults to now
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TransactionFilter {
    pub kind: Option<TransactionKind>,
    /// Compared against the effective status, so `overdue` works
    pub status: Option<TransactionStatus>,
    /// Due month as `YYYY-MM`
    pub month: Option<String>,
    pub counterparty_id: Option<Uuid>,
    pub category: Option<String>,
    /// Matches description, category or counterparty
    pub search: Option<String>,
}

/// Parses a `YYYY-MM` month into (year, month)
pub fn parse_month(raw: &str) -> Result<(i32, u32), ServiceError> {
    let invalid = || ServiceError::ValidationError(format!("invalid month {:?}, expected YYYY-MM", raw));
    let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    Ok((year, month))
}

#[derive(Clone)]
pub struct FinanceService {
    transactions: Repository<FinancialTransaction>,
    customers: Repository<Customer>,
    suppliers: Repository<Supplier>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl FinanceService {
    pub fn new(store: SharedStore, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            transactions: Repository::new(store.clone()),
            customers: Repository::new(store.clone()),
            suppliers: Repository::new(store),
            event_sender,
            logger,
        }
    }

    /// Stored record with overdue applied
    fn present(mut transaction: FinancialTransaction, today: NaiveDate) -> FinancialTransaction {
        transaction.status = transaction.effective_status(today);
        transaction
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<FinancialTransaction>, ServiceError> {
        let month = filter.month.as_deref().map(parse_month).transpose()?;
        let today = today();
        let search = filter.search.as_deref();

        let transactions = self
            .transactions
            .find_by(|t| {
                filter.kind.map_or(true, |k| t.kind == k)
                    && filter
                        .status
                        .map_or(true, |s| t.effective_status(today) == s)
                    && month.map_or(true, |(y, m)| t.due_date.year() == y && t.due_date.month() == m)
                    && filter
                        .counterparty_id
                        .map_or(true, |id| t.counterparty_id == Some(id))
                    && filter
                        .category
                        .as_deref()
                        .map_or(true, |c| t.category.eq_ignore_ascii_case(c))
                    && matches_search(
                        search,
                        &[
                            Some(t.description.as_str()),
                            Some(t.category.as_str()),
                            t.counterparty_name.as_deref(),
                        ],
                    )
            })
            .await?;

        Ok(transactions
            .into_iter()
            .map(|t| Self::present(t, today))
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<FinancialTransaction, ServiceError> {
        Ok(Self::present(self.transactions.get(id).await?, today()))
    }

    async fn counterparty_name(
        &self,
        kind: TransactionKind,
        id: Option<Uuid>,
    ) -> Result<Option<String>, ServiceError> {
        let Some(id) = id else {
            return Ok(None);
        };
        let name = match kind {
            TransactionKind::Income => resolve(&self.customers, id, "customer").await?.name,
            TransactionKind::Expense => resolve(&self.suppliers, id, "supplier").await?.name,
        };
        Ok(Some(name))
    }

    fn check(input: &TransactionInput) -> Result<(), ServiceError> {
        input.validate()?;
        if input.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "amount must be greater than zero".into(),
            ));
        }
        check_amount_limit("amount", input.amount)
    }

    #[instrument(skip(self, input))]
    pub async fn create(&self, input: TransactionInput) -> Result<FinancialTransaction, ServiceError> {
        Self::check(&input)?;
        let counterparty_name = self
            .counterparty_name(input.kind, input.counterparty_id)
            .await?;

        let now = Utc::now();
        let transaction = FinancialTransaction {
            id: Uuid::new_v4(),
            description: input.description.trim().to_string(),
            kind: input.kind,
            category: input.category.trim().to_lowercase(),
            amount: input.amount.round_dp(2),
            due_date: input.due_date,
            status: TransactionStatus::Pending,
            paid_at: None,
            payment_method: input.payment_method,
            counterparty_id: input.counterparty_id,
            counterparty_name,
            order_id: None,
            notes: clean(input.notes),
            created_at: now,
            updated_at: now,
        };

        let saved = self.transactions.insert(&transaction).await?;
        self.event_sender
            .send_or_log(Event::created(FinancialTransaction::COLLECTION, saved.id))
            .await;
        slog::info!(self.logger, "transaction created";
            "transaction_id" => %saved.id,
            "kind" => saved.kind.as_ref(),
            "amount" => %saved.amount);
        Ok(Self::present(saved, today()))
    }

    /// Only pending transactions can be edited
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: TransactionInput,
    ) -> Result<FinancialTransaction, ServiceError> {
        Self::check(&input)?;
        let mut transaction = self.transactions.get(id).await?;
        if transaction.status != TransactionStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "transaction {} is {} and can no longer be edited",
                id, transaction.status
            )));
        }

        transaction.counterparty_name = self
            .counterparty_name(input.kind, input.counterparty_id)
            .await?;
        transaction.counterparty_id = input.counterparty_id;
        transaction.description = input.description.trim().to_string();
        transaction.kind = input.kind;
        transaction.category = input.category.trim().to_lowercase();
        transaction.amount = input.amount.round_dp(2);
        transaction.due_date = input.due_date;
        transaction.payment_method = input.payment_method;
        transaction.notes = clean(input.notes);

        let saved = self.transactions.save(&transaction).await?;
        self.event_sender
            .send_or_log(Event::updated(FinancialTransaction::COLLECTION, id))
            .await;
        Ok(Self::present(saved, today()))
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let transaction = self.transactions.get(id).await?;
        if transaction.order_id.is_some() && transaction.status == TransactionStatus::Paid {
            return Err(ServiceError::InvalidOperation(
                "a paid sale receivable cannot be deleted".into(),
            ));
        }
        self.transactions.delete(id).await?;
        self.event_sender
            .send_or_log(Event::deleted(FinancialTransaction::COLLECTION, id))
            .await;
        slog::info!(self.logger, "transaction deleted"; "transaction_id" => %id);
        Ok(())
    }

    /// Settles a pending (or overdue) transaction
    #[instrument(skip(self, input))]
    pub async fn pay(&self, id: Uuid, input: PayInput) -> Result<FinancialTransaction, ServiceError> {
        let mut transaction = self.transactions.get(id).await?;
        if transaction.status != TransactionStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "transaction {} is {}, only pending transactions can be paid",
                id, transaction.status
            )));
        }

        transaction.status = TransactionStatus::Paid;
        transaction.paid_at = Some(input.paid_at.unwrap_or_else(Utc::now));
        if input.payment_method.is_some() {
            transaction.payment_method = input.payment_method;
        }
        let saved = self.transactions.save(&transaction).await?;

        metrics::record_transaction_paid();
        self.event_sender
            .send_or_log(Event::TransactionPaid {
                transaction_id: saved.id,
                amount: saved.amount,
            })
            .await;
        slog::info!(self.logger, "transaction paid"; "transaction_id" => %saved.id, "amount" => %saved.amount);
        info!(transaction_id = %saved.id, "Transaction paid");
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<FinancialTransaction, ServiceError> {
        let mut transaction = self.transactions.get(id).await?;
        if transaction.status != TransactionStatus::Pending {
            return Err(ServiceError::InvalidStatus(format!(
                "transaction {} is {}, only pending transactions can be cancelled",
                id, transaction.status
            )));
        }
        transaction.status = TransactionStatus::Cancelled;
        let saved = self.transactions.save(&transaction).await?;
        self.event_sender
            .send_or_log(Event::updated(FinancialTransaction::COLLECTION, id))
            .await;
        slog::info!(self.logger, "transaction cancelled"; "transaction_id" => %id);
        Ok(saved)
    }

    /// Receivable for a completed sale, due today. With `settle` the
    /// receivable is written already paid (cash register sales).
    pub(crate) async fn record_sale(
        &self,
        order: &Order,
        settle: bool,
    ) -> Result<Option<FinancialTransaction>, ServiceError> {
        if order.total <= Decimal::ZERO {
            return Ok(None);
        }

        let now = Utc::now();
        let transaction = FinancialTransaction {
            id: Uuid::new_v4(),
            description: format!("Sale {}", order.number),
            kind: TransactionKind::Income,
            category: SALES_CATEGORY.to_string(),
            amount: order.total,
            due_date: now.date_naive(),
            status: if settle {
                TransactionStatus::Paid
            } else {
                TransactionStatus::Pending
            },
            paid_at: settle.then_some(now),
            payment_method: order.payment_method,
            counterparty_id: order.customer_id,
            counterparty_name: order.customer_name.clone(),
            order_id: Some(order.id),
            notes: None,
            created_at: now,
            updated_at: now,
        };
        let saved = self.transactions.insert(&transaction).await?;
        self.event_sender
            .send_or_log(Event::created(FinancialTransaction::COLLECTION, saved.id))
            .await;
        if settle {
            metrics::record_transaction_paid();
            self.event_sender
                .send_or_log(Event::TransactionPaid {
                    transaction_id: saved.id,
                    amount: saved.amount,
                })
                .await;
        }
        Ok(Some(saved))
    }

    /// Undoes the receivable of a cancelled sale. Paid receivables are
    /// left for a manual refund entry.
    pub(crate) async fn void_sale(&self, transaction_id: Uuid) -> Result<(), ServiceError> {
        let Some(transaction) = self.transactions.find(transaction_id).await? else {
            return Ok(());
        };
        match transaction.status {
            TransactionStatus::Pending => {
                self.cancel(transaction_id).await?;
            }
            TransactionStatus::Paid => {
                warn!(transaction_id = %transaction_id, "Cancelled sale had a paid receivable; refund must be recorded manually");
                slog::warn!(self.logger, "paid receivable left in place"; "transaction_id" => %transaction_id);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MAX_AMOUNT;
    use crate::services::test_support::services;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn input(kind: TransactionKind, amount: Decimal, due: NaiveDate) -> TransactionInput {
        TransactionInput {
            description: "Rent".into(),
            kind,
            category: "Facilities".into(),
            amount,
            due_date: due,
            payment_method: None,
            counterparty_id: None,
            notes: None,
        }
    }

    #[test_case("2024-05" => matches Ok((2024, 5)))]
    #[test_case("2024-13" => matches Err(_))]
    #[test_case("24-05" => matches Err(_))]
    #[test_case("may" => matches Err(_))]
    fn month_parsing(raw: &str) -> Result<(i32, u32), ServiceError> {
        parse_month(raw)
    }

    #[tokio::test]
    async fn amount_must_be_positive() {
        let svc = services().finance;
        assert_matches!(
            svc.create(input(TransactionKind::Expense, dec!(0), today())).await,
            Err(ServiceError::ValidationError(_))
        );
        let mut blank = input(TransactionKind::Expense, dec!(10), today());
        blank.category = String::new();
        assert_matches!(svc.create(blank).await, Err(ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn amounts_above_the_limit_are_rejected() {
        let all = services();
        let huge = Decimal::MAX / dec!(1.5);
        for _ in 0..2 {
            assert_matches!(
                all.finance
                    .create(input(TransactionKind::Income, huge, today()))
                    .await,
                Err(ServiceError::ValidationError(_))
            );
        }
        all.finance
            .create(input(TransactionKind::Income, MAX_AMOUNT, today()))
            .await
            .unwrap();

        let summary = all.analytics.dashboard().await.unwrap();
        assert_eq!(summary.receivables.pending_amount, MAX_AMOUNT);
    }

    #[tokio::test]
    async fn overdue_is_derived_and_filterable() {
        let svc = services().finance;
        let late = svc
            .create(input(TransactionKind::Expense, dec!(100), today() - Duration::days(3)))
            .await
            .unwrap();
        svc.create(input(TransactionKind::Expense, dec!(50), today() + Duration::days(3)))
            .await
            .unwrap();
        assert_eq!(late.status, TransactionStatus::Overdue);

        let overdue = svc
            .list(&TransactionFilter {
                status: Some(TransactionStatus::Overdue),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, late.id);

        // overdue is payable and stays derived, never stored
        let paid = svc.pay(late.id, PayInput::default()).await.unwrap();
        assert_eq!(paid.status, TransactionStatus::Paid);
        assert!(paid.paid_at.is_some());
    }

    #[tokio::test]
    async fn only_pending_can_be_paid_edited_or_cancelled() {
        let svc = services().finance;
        let tx = svc
            .create(input(TransactionKind::Income, dec!(10), today()))
            .await
            .unwrap();
        svc.cancel(tx.id).await.unwrap();

        assert_matches!(
            svc.pay(tx.id, PayInput::default()).await,
            Err(ServiceError::InvalidStatus(_))
        );
        assert_matches!(
            svc.update(tx.id, input(TransactionKind::Income, dec!(20), today()))
                .await,
            Err(ServiceError::InvalidStatus(_))
        );
        assert_matches!(svc.cancel(tx.id).await, Err(ServiceError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn counterparty_must_match_kind() {
        let all = services();
        let mut with_missing = input(TransactionKind::Income, dec!(10), today());
        with_missing.counterparty_id = Some(Uuid::new_v4());
        assert_matches!(
            all.finance.create(with_missing).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn month_filter_uses_due_date() {
        let svc = services().finance;
        let may = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
        let june = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        svc.create(input(TransactionKind::Expense, dec!(1), may)).await.unwrap();
        svc.create(input(TransactionKind::Expense, dec!(2), june)).await.unwrap();

        let found = svc
            .list(&TransactionFilter {
                month: Some("2024-05".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, dec!(1));

        assert_matches!(
            svc.list(&TransactionFilter {
                month: Some("2024/05".into()),
                ..Default::default()
            })
            .await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
