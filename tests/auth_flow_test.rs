mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn login_me_and_logout() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "staff@bizdesk.test", "password": "correct horse battery staple" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = response_json(response).await;
    let access = tokens["access_token"].as_str().expect("access token").to_string();
    assert_eq!(tokens["token_type"], "Bearer");

    let me = app.request(Method::GET, "/auth/me", None, Some(&access)).await;
    assert_eq!(me.status(), StatusCode::OK);
    let me = response_json(me).await;
    assert_eq!(me["email"], "staff@bizdesk.test");
    assert!(me["roles"].as_array().unwrap().iter().any(|r| r == "staff"));

    let logout = app
        .request(Method::POST, "/auth/logout", None, Some(&access))
        .await;
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let revoked = app.request(Method::GET, "/auth/me", None, Some(&access)).await;
    assert_eq!(revoked.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "admin@bizdesk.test", "password": "nope nope nope" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_tokens_are_single_use() {
    let app = TestApp::new().await;
    let tokens = response_json(
        app.request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "admin@bizdesk.test", "password": "correct horse battery staple" })),
            None,
        )
        .await,
    )
    .await;
    let refresh = json!({ "refresh_token": tokens["refresh_token"] });

    let first = app
        .request(Method::POST, "/auth/refresh", Some(refresh.clone()), None)
        .await;
    assert_eq!(first.status(), StatusCode::OK);

    let replay = app
        .request(Method::POST, "/auth/refresh", Some(refresh), None)
        .await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_admins_manage_users() {
    let app = TestApp::new().await;
    let new_user = json!({
        "name": "Carla",
        "email": "carla@bizdesk.test",
        "password": "long enough password",
        "role": "manager"
    });

    let denied = app
        .staff(Method::POST, "/auth/users", Some(new_user.clone()))
        .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let created = app.admin(Method::POST, "/auth/users", Some(new_user.clone())).await;
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(response_json(created).await["role"], "manager");

    let duplicate = app.admin(Method::POST, "/auth/users", Some(new_user)).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let listed = response_json(app.admin(Method::GET, "/auth/users", None).await).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(3));
}
