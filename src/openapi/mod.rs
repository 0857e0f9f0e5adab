use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "bizdesk API",
        version = "1.0.0",
        description = r#"
# bizdesk

Business management backend for small companies: customer and supplier
registry, product catalog with stock movements, sales orders and point of
sale, quotes, campaigns and the opportunity pipeline, receivables and
payables, projects with tasks and a calendar, and a dashboard.

## Authentication

Obtain a token pair from `POST /auth/login` and send the access token on
every request:

```
Authorization: Bearer <access-token>
```

## Error Handling

Failures share one body shape:

```json
{
  "error": "Bad Request",
  "message": "Validation error: name is required",
  "details": "validation_error",
  "request_id": "1f0c...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local desktop backend")
    ),
    tags(
        (name = "Customers", description = "Customer registry"),
        (name = "Suppliers", description = "Supplier registry"),
        (name = "Products", description = "Product catalog"),
        (name = "Stock", description = "Stock movements and history"),
        (name = "Orders", description = "Sales orders"),
        (name = "Point of Sale", description = "Counter checkout"),
        (name = "Quotes", description = "Quotes and conversion to orders"),
        (name = "CRM", description = "Campaigns and opportunities"),
        (name = "Finance", description = "Receivables, payables and cash flow"),
        (name = "Projects", description = "Projects and tasks"),
        (name = "Calendar", description = "Calendar events"),
        (name = "Dashboard", description = "Summary indicators"),
        (name = "Meta", description = "Status catalogs"),
        (name = "Shell", description = "Desktop shell bridge"),
        (name = "auth", description = "Login, token refresh and user accounts")
    ),
    paths(
        // Customers
        crate::handlers::customers::list_customers,
        crate::handlers::customers::get_customer,
        crate::handlers::customers::create_customer,
        crate::handlers::customers::update_customer,
        crate::handlers::customers::delete_customer,
        crate::handlers::customers::lookup_postal_code,

        // Suppliers
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::update_supplier,
        crate::handlers::suppliers::delete_supplier,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::list_low_stock,

        // Stock
        crate::handlers::stock::list_movements,
        crate::handlers::stock::get_movement,
        crate::handlers::stock::product_history,
        crate::handlers::stock::record_movement,
        crate::handlers::stock::reverse_movement,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::delete_order,

        // Point of sale
        crate::handlers::pos::checkout,

        // Quotes
        crate::handlers::quotes::list_quotes,
        crate::handlers::quotes::get_quote,
        crate::handlers::quotes::create_quote,
        crate::handlers::quotes::update_quote,
        crate::handlers::quotes::send_quote,
        crate::handlers::quotes::accept_quote,
        crate::handlers::quotes::reject_quote,
        crate::handlers::quotes::convert_quote,
        crate::handlers::quotes::delete_quote,

        // CRM
        crate::handlers::crm::list_campaigns,
        crate::handlers::crm::get_campaign,
        crate::handlers::crm::create_campaign,
        crate::handlers::crm::update_campaign,
        crate::handlers::crm::delete_campaign,
        crate::handlers::crm::list_opportunities,
        crate::handlers::crm::pipeline,
        crate::handlers::crm::get_opportunity,
        crate::handlers::crm::create_opportunity,
        crate::handlers::crm::update_opportunity,
        crate::handlers::crm::change_stage,
        crate::handlers::crm::delete_opportunity,

        // Finance
        crate::handlers::finance::list_transactions,
        crate::handlers::finance::get_transaction,
        crate::handlers::finance::create_transaction,
        crate::handlers::finance::update_transaction,
        crate::handlers::finance::pay_transaction,
        crate::handlers::finance::cancel_transaction,
        crate::handlers::finance::delete_transaction,
        crate::handlers::finance::cash_flow,
        crate::handlers::finance::categories,

        // Projects, tasks and calendar
        crate::handlers::projects::list_projects,
        crate::handlers::projects::get_project,
        crate::handlers::projects::create_project,
        crate::handlers::projects::update_project,
        crate::handlers::projects::delete_project,
        crate::handlers::projects::list_tasks,
        crate::handlers::projects::get_task,
        crate::handlers::projects::create_task,
        crate::handlers::projects::update_task,
        crate::handlers::projects::delete_task,
        crate::handlers::projects::list_events,
        crate::handlers::projects::get_event,
        crate::handlers::projects::create_event,
        crate::handlers::projects::update_event,
        crate::handlers::projects::delete_event,

        // Dashboard and catalogs
        crate::handlers::dashboard::dashboard,
        crate::handlers::dashboard::statuses,

        // Shell
        crate::handlers::shell::ipc,
        crate::handlers::shell::notify,
        crate::handlers::shell::shell_state,

        // Auth
        crate::auth::login_handler,
        crate::auth::refresh_token_handler,
        crate::auth::logout_handler,
        crate::auth::me_handler,
        crate::auth::list_users_handler,
        crate::auth::create_user_handler,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::ResponseMeta,
            crate::models::Address,
            crate::models::LineItem,
            crate::models::Totals,
            crate::models::StatusOption,

            // Registries and catalog
            crate::models::customer::Customer,
            crate::services::customers::CustomerInput,
            crate::models::supplier::Supplier,
            crate::services::suppliers::SupplierInput,
            crate::models::product::Product,
            crate::services::products::ProductInput,
            crate::models::stock::StockMovement,
            crate::services::stock::MovementInput,

            // Sales
            crate::models::order::Order,
            crate::services::sales::OrderInput,
            crate::services::sales::LineItemInput,
            crate::services::sales::StatusChange,
            crate::services::pos::CheckoutInput,
            crate::services::pos::CheckoutReceipt,
            crate::models::quote::Quote,
            crate::services::quotes::QuoteInput,
            crate::services::quotes::ConversionResult,

            // CRM
            crate::models::campaign::Campaign,
            crate::services::crm::CampaignInput,
            crate::models::opportunity::Opportunity,
            crate::services::crm::OpportunityInput,
            crate::services::crm::StageChange,
            crate::services::crm::StageSummary,

            // Finance and dashboard
            crate::models::finance::FinancialTransaction,
            crate::services::finance::TransactionInput,
            crate::services::finance::PayInput,
            crate::services::analytics::MonthlyCashFlow,
            crate::services::analytics::CategoryShare,
            crate::services::analytics::SalesComparison,
            crate::services::analytics::Outstanding,
            crate::services::analytics::DashboardSummary,

            // Projects and calendar
            crate::models::project::Project,
            crate::models::project::Task,
            crate::models::project::CalendarEvent,
            crate::services::projects::ProjectInput,
            crate::services::projects::ProjectView,
            crate::services::projects::TaskInput,
            crate::services::projects::CalendarEventInput,

            // Shell
            crate::shell::IpcMessage,
            crate::shell::WindowState,
            crate::shell::NotificationLevel,
            crate::shell::Notification,
            crate::shell::ShellSnapshot,
            crate::handlers::shell::NotifyRequest,

            // Auth
            crate::auth::TokenPair,
            crate::auth::LoginCredentials,
            crate::auth::RefreshTokenRequest,
            crate::models::user::UserView,
            crate::services::users::NewUser,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme every protected path refers to
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("bizdesk API"));
        assert!(json.contains("/api/v1/customers"));
        assert!(json.contains("/api/v1/pos/checkout"));
        assert!(json.contains("/shell/ipc"));
        assert!(json.contains("\"Bearer\""));
    }
}
