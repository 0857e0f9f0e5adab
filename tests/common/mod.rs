#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use bizdesk::{
    auth::LoginCredentials,
    config::AppConfig,
    events,
    logging::discard_logger,
    models::Role,
    services::users::NewUser,
    shell::Shell,
    store::{MemoryStore, SharedStore},
    validation::DisabledLookup,
    AppState,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

const TEST_SECRET: &str =
    "Zq8v!Kp2#Lm4@Nr6$Ts8%Vx0^Yb3&Wd5*Fh7(Jk9)Gc1-Hn2_Pq4+Rs6=Tu8~Ew0?Ia1";

/// Full router over a fresh document store, with one admin and one staff
/// account already logged in.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub admin_token: String,
    pub staff_token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// In-memory document store
    pub async fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new())).await
    }

    pub async fn with_store(store: SharedStore) -> Self {
        let cfg = test_config();
        let shell = Arc::new(Shell::headless());
        let (state, event_rx) = AppState::new(
            cfg,
            store,
            Arc::new(DisabledLookup),
            shell.clone(),
            &discard_logger(),
        );
        let event_task = tokio::spawn(events::process_events(event_rx, Some(shell)));

        let admin_token = login_new_user(&state, "admin@bizdesk.test", Role::Admin).await;
        let staff_token = login_new_user(&state, "staff@bizdesk.test", Role::Staff).await;

        Self {
            router: bizdesk::app_router(state.clone()),
            state,
            admin_token,
            staff_token,
            _event_task: event_task,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request builds"))
            .await
            .expect("router is infallible")
    }

    /// Request as the admin account
    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.admin_token)).await
    }

    /// Request as the staff account
    pub async fn staff(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.staff_token)).await
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".into(),
        TEST_SECRET.into(),
        3600,
        86_400,
        "127.0.0.1".into(),
        18_080,
        "test".into(),
    );
    cfg.storage_backend = "memory".into();
    cfg.cors_allow_any_origin = true;
    cfg
}

async fn login_new_user(state: &AppState, email: &str, role: Role) -> String {
    let password = "correct horse battery staple";
    state
        .services
        .users
        .create_user(NewUser {
            name: format!("{role} user"),
            email: email.into(),
            password: password.into(),
            role: Some(role),
        })
        .await
        .expect("test user created");

    state
        .auth
        .login(&LoginCredentials {
            email: email.into(),
            password: password.into(),
        })
        .await
        .expect("test user logs in")
        .access_token
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Decimals travel as strings
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}
