//! End-to-end flows through the full router with a bootstrapped state.

use axum::{
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use portfolio_server::{
    config::Config,
    content::{defaults::default_payload, SectionName},
    create_app,
    state::AppState,
};
use serde_json::{json, Value};
use std::{collections::HashMap, net::SocketAddr};
use tower::ServiceExt;

const PASSWORD: &str = "correct horse battery";

async fn app() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    let vars = HashMap::from([
        (
            "ADMIN_PASSWORD_HASH".to_string(),
            bcrypt::hash(PASSWORD, 4).unwrap(),
        ),
        (
            "CONTENT_FILE".to_string(),
            dir.path().join("content.json").display().to_string(),
        ),
        (
            "UPLOADS_DIR".to_string(),
            dir.path().join("uploads").display().to_string(),
        ),
    ]);
    let config = Config::from_map(&vars).unwrap();
    let state = AppState::bootstrap(config).await.unwrap();
    let router = create_app(state).layer(MockConnectInfo(SocketAddr::from(([192, 0, 2, 7], 4000))));
    (dir, router)
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn post_json(uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn full_edit_cycle() {
    let (_dir, app) = app().await;

    let (status, headers, body) = call(
        &app,
        post_json(
            "/api/admin/login",
            None,
            &json!({ "username": "admin", "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    let cookie = headers[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let hero = json!({ "greeting": "Hi", "name": "Test" });
    let (status, _, body) = call(&app, post_json("/api/content/hero", Some(&cookie), &hero)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _, body) = call(
        &app,
        Request::get("/api/content/hero").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, hero);

    let (status, _, _) = call(
        &app,
        Request::post("/api/admin/logout")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = call(&app, post_json("/api/content/hero", Some(&cookie), &hero)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn freshly_seeded_store_serves_bundled_defaults() {
    let (_dir, app) = app().await;

    let (status, _, body) = call(
        &app,
        Request::get("/api/content/projects")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let expected = Value::Object(default_payload(SectionName::Projects).unwrap());
    assert_eq!(body, expected);
}

#[tokio::test]
async fn content_survives_a_restart_on_the_same_file() {
    let (dir, app) = app().await;
    let (_, headers, _) = call(
        &app,
        post_json(
            "/api/admin/login",
            None,
            &json!({ "username": "admin", "password": PASSWORD }),
        ),
    )
    .await;
    let cookie = headers[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let about = json!({ "bio": "Rust developer" });
    call(&app, post_json("/api/content/about", Some(&cookie), &about)).await;

    let vars = HashMap::from([
        (
            "ADMIN_PASSWORD_HASH".to_string(),
            bcrypt::hash(PASSWORD, 4).unwrap(),
        ),
        (
            "CONTENT_FILE".to_string(),
            dir.path().join("content.json").display().to_string(),
        ),
        (
            "UPLOADS_DIR".to_string(),
            dir.path().join("uploads").display().to_string(),
        ),
    ]);
    let restarted = create_app(
        AppState::bootstrap(Config::from_map(&vars).unwrap())
            .await
            .unwrap(),
    );

    let (status, _, body) = call(
        &restarted,
        Request::get("/api/content/about").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, about);

    // In-memory sessions do not outlive the process.
    let (status, _, _) = call(
        &restarted,
        post_json("/api/content/about", Some(&cookie), &about),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_throttle_returns_429_not_401() {
    let (_dir, app) = app().await;
    let wrong = json!({ "username": "admin", "password": "nope" });

    let mut statuses = Vec::new();
    for _ in 0..11 {
        let (status, _, _) = call(&app, post_json("/api/admin/login", None, &wrong)).await;
        statuses.push(status);
    }
    assert!(statuses[..10].iter().all(|s| *s == StatusCode::UNAUTHORIZED));
    assert_eq!(statuses[10], StatusCode::TOO_MANY_REQUESTS);
}
