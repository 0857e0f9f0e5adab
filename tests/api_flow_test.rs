//! End-to-end flows through the HTTP router over the in-memory store.

mod common;

use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{decimal, response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

async fn create(app: &TestApp, uri: &str, body: Value) -> Value {
    let response = app.admin(Method::POST, uri, Some(body)).await;
    assert_eq!(response.status(), StatusCode::CREATED, "POST {uri}");
    response_json(response).await["data"].clone()
}

async fn create_product(app: &TestApp, sku: &str, price: &str, stock: &str) -> Value {
    create(
        app,
        "/api/v1/products",
        json!({
            "name": format!("Product {sku}"),
            "sku": sku,
            "price": price,
            "cost": "1.00",
            "stock_quantity": stock,
            "min_stock": "2"
        }),
    )
    .await
}

async fn create_customer(app: &TestApp, name: &str) -> Value {
    create(
        app,
        "/api/v1/customers",
        json!({ "name": name, "email": "buyer@example.com" }),
    )
    .await
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/customers", None, None)
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_cannot_read_finance() {
    let app = TestApp::new().await;

    let forbidden = app
        .staff(Method::GET, "/api/v1/finance/transactions", None)
        .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let allowed = app.staff(Method::GET, "/api/v1/orders", None).await;
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn customer_without_name_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .admin(Method::POST, "/api/v1/customers", Some(json!({ "name": "" })))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["message"].as_str().is_some());
}

#[tokio::test]
async fn non_ascii_postal_codes_are_bad_requests() {
    let app = TestApp::new().await;

    let response = app
        .admin(
            Method::POST,
            "/api/v1/customers",
            Some(json!({ "name": "Loja", "address": { "postal_code": "١٢٣٤٥٦٧٨" } })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Arabic-Indic digits 1 to 8, percent-encoded
    let encoded = "%D9%A1%D9%A2%D9%A3%D9%A4%D9%A5%D9%A6%D9%A7%D9%A8";
    let response = app
        .admin(
            Method::GET,
            &format!("/api/v1/customers/postal-code/{encoded}"),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_amounts_are_bad_requests_and_dashboard_stays_up() {
    let app = TestApp::new().await;
    let product = create_product(&app, "SKU-9", "10.00", "5").await;

    let order = app
        .admin(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "items": [{
                    "product_id": product["id"],
                    "quantity": "100000000000000000000",
                    "unit_price": "100000000000000000000"
                }]
            })),
        )
        .await;
    assert_eq!(order.status(), StatusCode::BAD_REQUEST);

    let transaction = app
        .admin(
            Method::POST,
            "/api/v1/finance/transactions",
            Some(json!({
                "description": "Typo",
                "kind": "income",
                "category": "Sales",
                "amount": "52818775009509558395695966890",
                "due_date": Utc::now().date_naive().to_string()
            })),
        )
        .await;
    assert_eq!(transaction.status(), StatusCode::BAD_REQUEST);

    let dashboard = app.admin(Method::GET, "/api/v1/dashboard", None).await;
    assert_eq!(dashboard.status(), StatusCode::OK);
}

#[tokio::test]
async fn completing_a_sale_moves_stock_and_books_receivable() {
    let app = TestApp::new().await;
    let product = create_product(&app, "SKU-1", "10.00", "5").await;
    let customer = create_customer(&app, "Padaria").await;

    let order = create(
        &app,
        "/api/v1/orders",
        json!({
            "customer_id": customer["id"],
            "items": [{ "product_id": product["id"], "quantity": "3" }]
        }),
    )
    .await;
    assert_eq!(order["status"], "pending");
    assert_eq!(decimal(&order["total"]), dec!(30));

    let completed = app
        .admin(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order["id"].as_str().unwrap()),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(completed.status(), StatusCode::OK);
    let completed = response_json(completed).await["data"].clone();
    assert_eq!(completed["status"], "completed");

    let product = response_json(
        app.admin(
            Method::GET,
            &format!("/api/v1/products/{}", product["id"].as_str().unwrap()),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(decimal(&product["data"]["stock_quantity"]), dec!(2));

    let transaction_id = completed["transaction_id"].as_str().expect("receivable booked");
    let transaction = response_json(
        app.admin(
            Method::GET,
            &format!("/api/v1/finance/transactions/{transaction_id}"),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(transaction["data"]["kind"], "income");
    assert_eq!(transaction["data"]["status"], "pending");
    assert_eq!(decimal(&transaction["data"]["amount"]), dec!(30));
}

#[tokio::test]
async fn sale_beyond_available_stock_is_unprocessable() {
    let app = TestApp::new().await;
    let product = create_product(&app, "SKU-2", "4.00", "1").await;

    let order = create(
        &app,
        "/api/v1/orders",
        json!({ "items": [{ "product_id": product["id"], "quantity": "2" }] }),
    )
    .await;

    let response = app
        .admin(
            Method::PUT,
            &format!("/api/v1/orders/{}/status", order["id"].as_str().unwrap()),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn pos_checkout_returns_change() {
    let app = TestApp::new().await;
    let product = create_product(&app, "SKU-3", "12.50", "10").await;

    let response = app
        .staff(
            Method::POST,
            "/api/v1/pos/checkout",
            Some(json!({
                "items": [{ "product_id": product["id"], "quantity": "2" }],
                "payment_method": "cash",
                "amount_tendered": "30.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let receipt = response_json(response).await["data"].clone();
    assert_eq!(receipt["order"]["status"], "completed");
    assert_eq!(receipt["order"]["channel"], "pos");
    assert_eq!(decimal(&receipt["change_due"]), dec!(5));
    assert_eq!(receipt["transaction"]["status"], "paid");
}

#[tokio::test]
async fn accepted_quote_converts_into_order() {
    let app = TestApp::new().await;
    let product = create_product(&app, "SKU-4", "8.00", "10").await;
    let customer = create_customer(&app, "Oficina").await;

    let quote = create(
        &app,
        "/api/v1/quotes",
        json!({
            "customer_id": customer["id"],
            "items": [{ "product_id": product["id"], "quantity": "4" }]
        }),
    )
    .await;
    let quote_id = quote["id"].as_str().unwrap().to_string();
    assert_eq!(quote["status"], "draft");

    for step in ["send", "accept"] {
        let response = app
            .admin(Method::POST, &format!("/api/v1/quotes/{quote_id}/{step}"), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK, "quote {step}");
    }

    let response = app
        .admin(Method::POST, &format!("/api/v1/quotes/{quote_id}/convert"), None)
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let result = response_json(response).await["data"].clone();
    assert_eq!(result["quote"]["status"], "converted");
    assert_eq!(result["order"]["status"], "pending");
    assert_eq!(result["order"]["quote_id"], quote_id.as_str());
    assert_eq!(decimal(&result["order"]["total"]), dec!(32));

    let again = app
        .admin(Method::POST, &format!("/api/v1/quotes/{quote_id}/convert"), None)
        .await;
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn paid_income_shows_in_cash_flow() {
    let app = TestApp::new().await;
    let today = Utc::now().date_naive();

    let transaction = create(
        &app,
        "/api/v1/finance/transactions",
        json!({
            "description": "Consulting",
            "kind": "income",
            "category": "Services",
            "amount": "150.00",
            "due_date": today.to_string()
        }),
    )
    .await;

    let paid = app
        .admin(
            Method::POST,
            &format!(
                "/api/v1/finance/transactions/{}/pay",
                transaction["id"].as_str().unwrap()
            ),
            Some(json!({})),
        )
        .await;
    assert_eq!(paid.status(), StatusCode::OK);

    let flow = response_json(app.admin(Method::GET, "/api/v1/finance/cash-flow", None).await).await;
    let month = today.format("%Y-%m").to_string();
    let entry = flow["data"]
        .as_array()
        .expect("cash flow rows")
        .iter()
        .find(|row| row["month"] == month.as_str())
        .expect("current month present");
    assert_eq!(decimal(&entry["income"]), dec!(150));
    assert_eq!(decimal(&entry["balance"]), dec!(150));
}

#[tokio::test]
async fn status_catalog_is_available_to_any_user() {
    let app = TestApp::new().await;

    let response = app.staff(Method::GET, "/api/v1/meta/statuses", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let order_statuses = body["data"]["order_status"]
        .as_array()
        .expect("order statuses listed");
    assert!(order_statuses.iter().any(|option| option["code"] == "completed"));
}

#[tokio::test]
async fn shell_ipc_drives_window_state() {
    let app = TestApp::new().await;

    let response = app
        .staff(Method::POST, "/shell/ipc", Some(json!({ "channel": "maximize" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let state = response_json(response).await;
    assert_eq!(state["data"]["maximized"], true);

    let unknown = app
        .staff(Method::POST, "/shell/ipc", Some(json!({ "channel": "explode" })))
        .await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let close = app
        .staff(Method::POST, "/shell/ipc", Some(json!({ "channel": "close" })))
        .await;
    assert_eq!(close.status(), StatusCode::OK);

    let after_close = app
        .staff(Method::POST, "/shell/ipc", Some(json!({ "channel": "minimize" })))
        .await;
    assert_eq!(after_close.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_memory_backend() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health/details", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["details"]["store"]["message"], "memory");
}
