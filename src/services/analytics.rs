//! Dashboard and cash-flow aggregation.
//!
//! Everything here is arithmetic over records already loaded from the
//! store. The pure functions take the reference date explicitly so they
//! can be tested without a clock.

use super::finance::parse_month;
use crate::{
    errors::ServiceError,
    models::{
        CalendarEvent, EventStatus, FinancialTransaction, Opportunity, Order, OrderStatus,
        Product, ProductStatus, Quote, Task, TransactionKind, TransactionStatus,
    },
    store::{Repository, SharedStore},
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};

/// `YYYY-MM` key of a date
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Month before the one containing `date`, as a `YYYY-MM` key
pub fn previous_month_key(date: NaiveDate) -> String {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    format!("{:04}-{:02}", year, month)
}

/// `(cur - prev) / prev * 100`, two decimals; undefined when `prev` is zero
/// or the ratio does not fit a `Decimal`
pub fn percentage_delta(current: Decimal, previous: Decimal) -> Option<Decimal> {
    if previous.is_zero() {
        return None;
    }
    let ratio = current.checked_sub(previous)?.checked_div(previous)?;
    Some(ratio.checked_mul(Decimal::ONE_HUNDRED)?.round_dp(2))
}

/// Sums amounts, clamping at the `Decimal` bounds instead of overflowing
fn total_of(amounts: impl IntoIterator<Item = Decimal>) -> Decimal {
    amounts
        .into_iter()
        .fold(Decimal::ZERO, |total, amount| total.saturating_add(amount))
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyCashFlow {
    /// `YYYY-MM`
    pub month: String,
    pub income: Decimal,
    pub expense: Decimal,
    pub net: Decimal,
    /// Sum of `net` up to and including this month
    pub balance: Decimal,
}

/// Paid transactions grouped by the month they were paid, oldest first
pub fn monthly_cash_flow(transactions: &[FinancialTransaction]) -> Vec<MonthlyCashFlow> {
    let mut months: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for tx in transactions {
        let Some(paid_at) = tx.paid_at.filter(|_| tx.status == TransactionStatus::Paid) else {
            continue;
        };
        let entry = months.entry(month_key(paid_at.date_naive())).or_default();
        match tx.kind {
            TransactionKind::Income => entry.0 = entry.0.saturating_add(tx.amount),
            TransactionKind::Expense => entry.1 = entry.1.saturating_add(tx.amount),
        }
    }

    let mut balance = Decimal::ZERO;
    months
        .into_iter()
        .map(|(month, (income, expense))| {
            let net = income.saturating_sub(expense);
            balance = balance.saturating_add(net);
            MonthlyCashFlow {
                month,
                income,
                expense,
                net,
                balance,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CategoryShare {
    pub category: String,
    pub total: Decimal,
    /// Percentage of the kind's total, two decimals
    pub share: Decimal,
}

/// Per-category totals of one kind, largest first. Cancelled entries are skipped.
pub fn category_breakdown(
    transactions: &[FinancialTransaction],
    kind: TransactionKind,
) -> Vec<CategoryShare> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for tx in transactions
        .iter()
        .filter(|t| t.kind == kind && t.status != TransactionStatus::Cancelled)
    {
        let total = totals.entry(tx.category.as_str()).or_default();
        *total = total.saturating_add(tx.amount);
    }

    let grand_total = total_of(totals.values().copied());
    let mut shares: Vec<CategoryShare> = totals
        .into_iter()
        .map(|(category, total)| CategoryShare {
            category: category.to_string(),
            total,
            share: if grand_total.is_zero() {
                Decimal::ZERO
            } else {
                (total / grand_total * Decimal::ONE_HUNDRED).round_dp(2)
            },
        })
        .collect();
    shares.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));
    shares
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SalesComparison {
    pub current_count: usize,
    pub previous_count: usize,
    pub count_delta: Option<Decimal>,
    pub current_revenue: Decimal,
    pub previous_revenue: Decimal,
    pub revenue_delta: Option<Decimal>,
    /// Current month revenue / count
    pub average_ticket: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Outstanding {
    /// Pending and not yet due
    pub pending_count: usize,
    pub pending_amount: Decimal,
    /// Pending and past due
    pub overdue_count: usize,
    pub overdue_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub month: String,
    pub sales: SalesComparison,
    pub open_quotes: usize,
    pub open_quotes_value: Decimal,
    pub weighted_pipeline: Decimal,
    pub low_stock_count: usize,
    pub receivables: Outstanding,
    pub payables: Outstanding,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
    /// Scheduled events starting within the next seven days
    pub upcoming_events: Vec<CalendarEvent>,
}

/// Records the dashboard is computed from
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub orders: Vec<Order>,
    pub quotes: Vec<Quote>,
    pub opportunities: Vec<Opportunity>,
    pub products: Vec<Product>,
    pub transactions: Vec<FinancialTransaction>,
    pub tasks: Vec<Task>,
    pub events: Vec<CalendarEvent>,
}

pub const UPCOMING_DAYS: i64 = 7;

fn outstanding(transactions: &[FinancialTransaction], kind: TransactionKind, today: NaiveDate) -> Outstanding {
    let mut out = Outstanding::default();
    for tx in transactions.iter().filter(|t| t.kind == kind) {
        match tx.effective_status(today) {
            TransactionStatus::Pending => {
                out.pending_count += 1;
                out.pending_amount = out.pending_amount.saturating_add(tx.amount);
            }
            TransactionStatus::Overdue => {
                out.overdue_count += 1;
                out.overdue_amount = out.overdue_amount.saturating_add(tx.amount);
            }
            _ => {}
        }
    }
    out
}

pub fn dashboard_summary(data: &DashboardData, now: DateTime<Utc>) -> DashboardSummary {
    let today = now.date_naive();
    let current_month = month_key(today);
    let previous_month = previous_month_key(today);

    let completed_in = |month: &str| -> (usize, Decimal) {
        data.orders
            .iter()
            .filter(|o| o.status == OrderStatus::Completed)
            .filter(|o| {
                o.completed_at
                    .map_or(false, |at| month_key(at.date_naive()) == month)
            })
            .fold((0, Decimal::ZERO), |(n, total), o| (n + 1, total.saturating_add(o.total)))
    };
    let (current_count, current_revenue) = completed_in(&current_month);
    let (previous_count, previous_revenue) = completed_in(&previous_month);
    let average_ticket = if current_count == 0 {
        Decimal::ZERO
    } else {
        (current_revenue / Decimal::from(current_count)).round_dp(2)
    };

    let open_quotes: Vec<&Quote> = data
        .quotes
        .iter()
        .filter(|q| q.effective_status(today).is_open())
        .collect();

    let weighted_pipeline = total_of(
        data.opportunities
            .iter()
            .filter(|o| !o.stage.is_closed())
            .map(Opportunity::weighted_value),
    );

    let horizon = now + Duration::days(UPCOMING_DAYS);
    let mut upcoming_events: Vec<CalendarEvent> = data
        .events
        .iter()
        .filter(|e| e.status == EventStatus::Scheduled && e.start_at >= now && e.start_at < horizon)
        .cloned()
        .collect();
    upcoming_events.sort_by_key(|e| e.start_at);

    DashboardSummary {
        month: current_month,
        sales: SalesComparison {
            current_count,
            previous_count,
            count_delta: percentage_delta(
                Decimal::from(current_count),
                Decimal::from(previous_count),
            ),
            current_revenue,
            previous_revenue,
            revenue_delta: percentage_delta(current_revenue, previous_revenue),
            average_ticket,
        },
        open_quotes: open_quotes.len(),
        open_quotes_value: total_of(open_quotes.iter().map(|q| q.total)),
        weighted_pipeline,
        low_stock_count: data
            .products
            .iter()
            .filter(|p| p.status == ProductStatus::Active && p.is_low_stock())
            .count(),
        receivables: outstanding(&data.transactions, TransactionKind::Income, today),
        payables: outstanding(&data.transactions, TransactionKind::Expense, today),
        open_tasks: data.tasks.iter().filter(|t| t.status.is_open()).count(),
        overdue_tasks: data.tasks.iter().filter(|t| t.is_overdue(today)).count(),
        upcoming_events,
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct CashFlowQuery {
    /// First month included, `YYYY-MM`
    pub from: Option<String>,
    /// Last month included, `YYYY-MM`
    pub to: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct CategoryQuery {
    pub kind: TransactionKind,
    /// Restrict to transactions due in this month, `YYYY-MM`
    pub month: Option<String>,
}

/// Loads the collections and runs the aggregations above
#[derive(Clone)]
pub struct AnalyticsService {
    orders: Repository<Order>,
    quotes: Repository<Quote>,
    opportunities: Repository<Opportunity>,
    products: Repository<Product>,
    transactions: Repository<FinancialTransaction>,
    tasks: Repository<Task>,
    events: Repository<CalendarEvent>,
}

impl AnalyticsService {
    pub fn new(store: SharedStore) -> Self {
        Self {
            orders: Repository::new(store.clone()),
            quotes: Repository::new(store.clone()),
            opportunities: Repository::new(store.clone()),
            products: Repository::new(store.clone()),
            transactions: Repository::new(store.clone()),
            tasks: Repository::new(store.clone()),
            events: Repository::new(store),
        }
    }

    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<DashboardSummary, ServiceError> {
        let data = DashboardData {
            orders: self.orders.list().await?,
            quotes: self.quotes.list().await?,
            opportunities: self.opportunities.list().await?,
            products: self.products.list().await?,
            transactions: self.transactions.list().await?,
            tasks: self.tasks.list().await?,
            events: self.events.list().await?,
        };
        Ok(dashboard_summary(&data, Utc::now()))
    }

    /// Monthly cash flow; the running balance starts at the first month shown
    #[instrument(skip(self))]
    pub async fn cash_flow(&self, query: &CashFlowQuery) -> Result<Vec<MonthlyCashFlow>, ServiceError> {
        let from = query.from.as_deref().map(validated_month).transpose()?;
        let to = query.to.as_deref().map(validated_month).transpose()?;
        let transactions = self
            .transactions
            .find_by(|t| {
                t.paid_at.map_or(false, |at| {
                    let key = month_key(at.date_naive());
                    from.as_deref().map_or(true, |f| key.as_str() >= f)
                        && to.as_deref().map_or(true, |e| key.as_str() <= e)
                })
            })
            .await?;
        Ok(monthly_cash_flow(&transactions))
    }

    #[instrument(skip(self))]
    pub async fn categories(&self, query: &CategoryQuery) -> Result<Vec<CategoryShare>, ServiceError> {
        let month = query.month.as_deref().map(validated_month).transpose()?;
        let transactions = self
            .transactions
            .find_by(|t| {
                month
                    .as_deref()
                    .map_or(true, |m| month_key(t.due_date) == m)
            })
            .await?;
        Ok(category_breakdown(&transactions, query.kind))
    }
}

/// Canonical `YYYY-MM` form of a month parameter
fn validated_month(raw: &str) -> Result<String, ServiceError> {
    let (year, month) = parse_month(raw)?;
    Ok(format!("{:04}-{:02}", year, month))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OpportunityStage, QuoteStatus, TaskPriority, TaskStatus};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;
    use uuid::Uuid;

    fn tx(
        kind: TransactionKind,
        category: &str,
        amount: Decimal,
        status: TransactionStatus,
        paid_at: Option<DateTime<Utc>>,
        due: NaiveDate,
    ) -> FinancialTransaction {
        FinancialTransaction {
            id: Uuid::new_v4(),
            description: "t".into(),
            kind,
            category: category.into(),
            amount,
            due_date: due,
            status,
            paid_at,
            payment_method: None,
            counterparty_id: None,
            counterparty_name: None,
            order_id: None,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn paid(kind: TransactionKind, category: &str, amount: Decimal, when: DateTime<Utc>) -> FinancialTransaction {
        tx(kind, category, amount, TransactionStatus::Paid, Some(when), when.date_naive())
    }

    #[test_case(dec!(150), dec!(100) => Some(dec!(50)))]
    #[test_case(dec!(50), dec!(100) => Some(dec!(-50)))]
    #[test_case(dec!(1), dec!(3) => Some(dec!(-66.67)))]
    #[test_case(dec!(10), dec!(0) => None)]
    #[test_case(dec!(0), dec!(0) => None)]
    fn deltas(current: Decimal, previous: Decimal) -> Option<Decimal> {
        percentage_delta(current, previous)
    }

    #[test]
    fn previous_month_wraps_year() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(previous_month_key(jan), "2023-12");
        assert_eq!(month_key(jan), "2024-01");
    }

    #[test]
    fn cash_flow_groups_paid_by_month_with_running_balance() {
        let transactions = vec![
            paid(TransactionKind::Income, "sales", dec!(1000), at(2024, 1, 10)),
            paid(TransactionKind::Expense, "rent", dec!(400), at(2024, 1, 20)),
            paid(TransactionKind::Expense, "rent", dec!(900), at(2024, 2, 5)),
            paid(TransactionKind::Income, "sales", dec!(300), at(2024, 3, 1)),
            // pending and cancelled entries never reach the cash flow
            tx(
                TransactionKind::Income,
                "sales",
                dec!(5000),
                TransactionStatus::Pending,
                None,
                at(2024, 2, 1).date_naive(),
            ),
            tx(
                TransactionKind::Expense,
                "rent",
                dec!(5000),
                TransactionStatus::Cancelled,
                Some(at(2024, 2, 1)),
                at(2024, 2, 1).date_naive(),
            ),
        ];

        let flow = monthly_cash_flow(&transactions);
        let months: Vec<_> = flow.iter().map(|m| m.month.as_str()).collect();
        assert_eq!(months, ["2024-01", "2024-02", "2024-03"]);
        assert_eq!(flow[0].net, dec!(600));
        assert_eq!(flow[1].net, dec!(-900));
        assert_eq!(flow[1].balance, dec!(-300));
        assert_eq!(flow[2].balance, dec!(0));
    }

    #[test]
    fn category_shares_sum_to_about_100() {
        let when = at(2024, 1, 10);
        let transactions = vec![
            paid(TransactionKind::Expense, "rent", dec!(500), when),
            paid(TransactionKind::Expense, "payroll", dec!(400), when),
            paid(TransactionKind::Expense, "utilities", dec!(100), when),
            paid(TransactionKind::Expense, "rent", dec!(500), when),
            paid(TransactionKind::Income, "sales", dec!(9999), when),
        ];
        let shares = category_breakdown(&transactions, TransactionKind::Expense);
        assert_eq!(shares.len(), 3);
        assert_eq!(shares[0].category, "rent");
        assert_eq!(shares[0].total, dec!(1000));
        assert_eq!(shares[0].share, dec!(66.67));
        assert_eq!(shares[1].share, dec!(26.67));
        assert_eq!(shares[2].share, dec!(6.67));
    }

    #[test]
    fn empty_breakdown() {
        assert!(category_breakdown(&[], TransactionKind::Income).is_empty());
        assert!(monthly_cash_flow(&[]).is_empty());
    }

    fn order(total: Decimal, completed_at: DateTime<Utc>) -> Order {
        Order {
            id: Uuid::new_v4(),
            number: "SO-000001".into(),
            customer_id: None,
            customer_name: None,
            items: vec![],
            subtotal: total,
            discount: Decimal::ZERO,
            total,
            status: OrderStatus::Completed,
            channel: Default::default(),
            payment_method: None,
            notes: None,
            quote_id: None,
            stock_movement_ids: vec![],
            transaction_id: None,
            completed_at: Some(completed_at),
            cancelled_at: None,
            created_at: completed_at,
            updated_at: completed_at,
        }
    }

    #[test]
    fn dashboard_compares_months_and_counts_open_work() {
        let now = at(2024, 3, 15);
        let today = now.date_naive();
        let data = DashboardData {
            orders: vec![
                order(dec!(100), at(2024, 3, 1)),
                order(dec!(200), at(2024, 3, 10)),
                order(dec!(200), at(2024, 2, 10)),
            ],
            quotes: vec![Quote {
                id: Uuid::new_v4(),
                number: "QT-000001".into(),
                customer_id: Uuid::new_v4(),
                customer_name: "Ana".into(),
                items: vec![],
                subtotal: dec!(80),
                discount: Decimal::ZERO,
                total: dec!(80),
                valid_until: today,
                status: QuoteStatus::Sent,
                notes: None,
                sent_at: None,
                order_id: None,
                created_at: now,
                updated_at: now,
            }],
            opportunities: vec![Opportunity {
                id: Uuid::new_v4(),
                title: "Deal".into(),
                customer_id: Uuid::new_v4(),
                customer_name: "Ana".into(),
                value: dec!(1000),
                stage: OpportunityStage::Proposal,
                probability: 25,
                expected_close_date: None,
                notes: None,
                closed_at: None,
                created_at: now,
                updated_at: now,
            }],
            products: vec![],
            transactions: vec![
                tx(
                    TransactionKind::Income,
                    "sales",
                    dec!(50),
                    TransactionStatus::Pending,
                    None,
                    today - Duration::days(2),
                ),
                tx(
                    TransactionKind::Expense,
                    "rent",
                    dec!(70),
                    TransactionStatus::Pending,
                    None,
                    today + Duration::days(2),
                ),
            ],
            tasks: vec![Task {
                id: Uuid::new_v4(),
                title: "Call back".into(),
                description: None,
                project_id: None,
                project_name: None,
                assignee: None,
                priority: TaskPriority::High,
                status: TaskStatus::Todo,
                due_date: Some(today - Duration::days(1)),
                completed_at: None,
                created_at: now,
                updated_at: now,
            }],
            events: vec![
                CalendarEvent {
                    id: Uuid::new_v4(),
                    title: "Soon".into(),
                    description: None,
                    location: None,
                    start_at: now + Duration::days(2),
                    end_at: now + Duration::days(2),
                    all_day: false,
                    customer_id: None,
                    customer_name: None,
                    status: EventStatus::Scheduled,
                    created_at: now,
                    updated_at: now,
                },
                CalendarEvent {
                    id: Uuid::new_v4(),
                    title: "Later".into(),
                    description: None,
                    location: None,
                    start_at: now + Duration::days(8),
                    end_at: now + Duration::days(8),
                    all_day: false,
                    customer_id: None,
                    customer_name: None,
                    status: EventStatus::Scheduled,
                    created_at: now,
                    updated_at: now,
                },
            ],
        };

        let summary = dashboard_summary(&data, now);
        assert_eq!(summary.month, "2024-03");
        assert_eq!(summary.sales.current_count, 2);
        assert_eq!(summary.sales.previous_count, 1);
        assert_eq!(summary.sales.current_revenue, dec!(300));
        assert_eq!(summary.sales.revenue_delta, Some(dec!(50)));
        assert_eq!(summary.sales.count_delta, Some(dec!(100)));
        assert_eq!(summary.sales.average_ticket, dec!(150));
        assert_eq!(summary.open_quotes, 1);
        assert_eq!(summary.weighted_pipeline, dec!(250));
        assert_eq!(summary.receivables.overdue_count, 1);
        assert_eq!(summary.receivables.overdue_amount, dec!(50));
        assert_eq!(summary.payables.pending_amount, dec!(70));
        assert_eq!(summary.open_tasks, 1);
        assert_eq!(summary.overdue_tasks, 1);
        assert_eq!(summary.upcoming_events.len(), 1);
        assert_eq!(summary.upcoming_events[0].title, "Soon");
    }

    #[test]
    fn stored_amounts_near_the_decimal_bound_clamp() {
        let now = at(2024, 3, 15);
        let huge = Decimal::MAX / dec!(1.5);
        let transactions = vec![
            paid(TransactionKind::Income, "sales", huge, now),
            paid(TransactionKind::Income, "services", huge, now),
        ];

        let flow = monthly_cash_flow(&transactions);
        assert_eq!(flow.len(), 1);
        assert_eq!(flow[0].income, Decimal::MAX);
        assert_eq!(flow[0].balance, Decimal::MAX);

        let shares = category_breakdown(&transactions, TransactionKind::Income);
        assert_eq!(shares.len(), 2);
        assert!(shares.iter().all(|s| s.total == huge));

        let pending = vec![
            tx(TransactionKind::Income, "sales", huge, TransactionStatus::Pending, None, now.date_naive()),
            tx(TransactionKind::Income, "sales", huge, TransactionStatus::Pending, None, now.date_naive()),
        ];
        let data = DashboardData {
            transactions: pending,
            ..DashboardData::default()
        };
        let summary = dashboard_summary(&data, now);
        assert_eq!(summary.receivables.pending_count, 2);
        assert_eq!(summary.receivables.pending_amount, Decimal::MAX);
    }

    #[test]
    fn delta_that_does_not_fit_is_undefined() {
        assert_eq!(percentage_delta(Decimal::MAX, dec!(0.01)), None);
    }

    proptest! {
        #[test]
        fn final_balance_is_paid_income_minus_expense(
            entries in prop::collection::vec((any::<bool>(), 1u32..100_000, 1u32..=12), 0..40)
        ) {
            let transactions: Vec<_> = entries
                .iter()
                .map(|(income, cents, month)| {
                    let kind = if *income { TransactionKind::Income } else { TransactionKind::Expense };
                    paid(kind, "x", Decimal::new(i64::from(*cents), 2), at(2023, *month, 1))
                })
                .collect();

            let expected: Decimal = transactions
                .iter()
                .map(|t| match t.kind {
                    TransactionKind::Income => t.amount,
                    TransactionKind::Expense => -t.amount,
                })
                .sum();
            let flow = monthly_cash_flow(&transactions);
            let last = flow.last().map(|m| m.balance).unwrap_or_default();
            prop_assert_eq!(last, expected);
            prop_assert!(flow.windows(2).all(|w| w[0].month < w[1].month));
        }

        #[test]
        fn delta_sign_follows_direction(cur in 0i64..1_000_000, prev in 1i64..1_000_000) {
            let delta = percentage_delta(Decimal::from(cur), Decimal::from(prev)).unwrap();
            if cur < prev {
                prop_assert!(delta <= Decimal::ZERO);
            } else {
                prop_assert!(delta >= Decimal::ZERO);
            }
        }
    }
}
