pub mod analytics;
pub mod crm;
pub mod customers;
pub mod finance;
pub mod pos;
pub mod products;
pub mod projects;
pub mod quotes;
pub mod sales;
pub mod stock;
pub mod suppliers;
pub mod users;

use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::logging::component_logger;
use crate::store::{Record, Repository, SharedStore};
use crate::validation::PostalCodeLookup;
use chrono::{NaiveDate, Utc};
use slog::Logger;
use std::sync::Arc;
use uuid::Uuid;

/// Every service, wired to one store and one event channel
#[derive(Clone)]
pub struct Services {
    pub customers: customers::CustomerService,
    pub suppliers: suppliers::SupplierService,
    pub products: products::ProductService,
    pub stock: stock::StockService,
    pub sales: sales::SalesService,
    pub pos: pos::PosService,
    pub quotes: quotes::QuoteService,
    pub campaigns: crm::CampaignService,
    pub opportunities: crm::OpportunityService,
    pub finance: finance::FinanceService,
    pub projects: projects::ProjectService,
    pub tasks: projects::TaskService,
    pub calendar: projects::CalendarService,
    pub analytics: analytics::AnalyticsService,
    pub users: users::UserService,
}

impl Services {
    pub fn new(
        store: SharedStore,
        event_sender: Arc<EventSender>,
        postal_lookup: Arc<dyn PostalCodeLookup>,
        logger: &Logger,
    ) -> Self {
        let stock = stock::StockService::new(
            store.clone(),
            event_sender.clone(),
            component_logger(logger, "stock"),
        );
        let finance = finance::FinanceService::new(
            store.clone(),
            event_sender.clone(),
            component_logger(logger, "finance"),
        );
        let sales = sales::SalesService::new(
            store.clone(),
            event_sender.clone(),
            stock.clone(),
            finance.clone(),
            component_logger(logger, "sales"),
        );

        Self {
            customers: customers::CustomerService::new(
                store.clone(),
                event_sender.clone(),
                postal_lookup,
                component_logger(logger, "customers"),
            ),
            suppliers: suppliers::SupplierService::new(
                store.clone(),
                event_sender.clone(),
                component_logger(logger, "suppliers"),
            ),
            products: products::ProductService::new(
                store.clone(),
                event_sender.clone(),
                component_logger(logger, "products"),
            ),
            pos: pos::PosService::new(sales.clone(), finance.clone(), component_logger(logger, "pos")),
            quotes: quotes::QuoteService::new(
                store.clone(),
                event_sender.clone(),
                sales.clone(),
                component_logger(logger, "quotes"),
            ),
            campaigns: crm::CampaignService::new(
                store.clone(),
                event_sender.clone(),
                component_logger(logger, "campaigns"),
            ),
            opportunities: crm::OpportunityService::new(
                store.clone(),
                event_sender.clone(),
                component_logger(logger, "opportunities"),
            ),
            projects: projects::ProjectService::new(
                store.clone(),
                event_sender.clone(),
                component_logger(logger, "projects"),
            ),
            tasks: projects::TaskService::new(
                store.clone(),
                event_sender.clone(),
                component_logger(logger, "tasks"),
            ),
            calendar: projects::CalendarService::new(
                store.clone(),
                event_sender.clone(),
                component_logger(logger, "calendar"),
            ),
            analytics: analytics::AnalyticsService::new(store.clone()),
            users: users::UserService::new(
                store,
                event_sender,
                component_logger(logger, "users"),
            ),
            stock,
            sales,
            finance,
        }
    }
}

/// Local calendar date used for derived statuses
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Loads a referenced record; a dangling reference is a validation failure.
pub(crate) async fn resolve<T: Record>(
    repo: &Repository<T>,
    id: Uuid,
    what: &str,
) -> Result<T, ServiceError> {
    repo.find(id)
        .await?
        .ok_or_else(|| ServiceError::ValidationError(format!("{} {} does not exist", what, id)))
}

/// Next display number for a prefix, one past the highest one in use
pub(crate) fn next_number<'a>(prefix: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let highest = existing
        .filter_map(|n| n.strip_prefix(prefix))
        .filter_map(|n| n.strip_prefix('-'))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{:06}", prefix, highest + 1)
}

/// Trims and drops blank optional text
pub(crate) fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_continue_after_highest() {
        let existing = ["SO-000003", "SO-000010", "QT-000050", "garbage"];
        assert_eq!(next_number("SO", existing.iter().copied()), "SO-000011");
        assert_eq!(next_number("QT", existing.iter().copied()), "QT-000051");
        assert_eq!(next_number("XX", std::iter::empty()), "XX-000001");
    }

    #[test]
    fn clean_drops_blank_text() {
        assert_eq!(clean(Some("  ".into())), None);
        assert_eq!(clean(Some(" a ".into())), Some("a".into()));
        assert_eq!(clean(None), None);
    }
}
