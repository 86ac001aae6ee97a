use axum::Router;
use axum::body::{Body, to_bytes};
use axum::Extension;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

use turbo_server::{AppState, Config, build_router};

const SECRET: &str = "an-adequately-long-test-secret-0123456789";

fn app_with(config: Config, peer: &str) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::from_config(config).unwrap());
    let peer: SocketAddr = peer.parse().unwrap();
    let app = build_router(state.clone())
        .unwrap()
        .layer(Extension(ConnectInfo(peer)));
    (app, state)
}

fn limited(rps: f64, burst: i64) -> Config {
    let mut config = Config::default();
    config.middleware.rate_limit.rps = rps;
    config.middleware.rate_limit.burst = burst;
    config
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn register(name: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"name": name, "email": format!("{name}@example.com")}).to_string(),
        ))
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_healthy() {
    let (app, _) = app_with(Config::default(), "127.0.0.1:4000");

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn burst_is_admitted_then_429() {
    let (app, _) = app_with(limited(0.001, 3), "1.2.3.4:5000");

    for _ in 0..3 {
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        body_json(response).await,
        json!({"error": "too many requests", "code": 429})
    );
}

#[tokio::test]
async fn rejected_request_never_reaches_the_handler() {
    let (app, state) = app_with(limited(0.001, 1), "1.2.3.4:5000");

    let first = app.clone().oneshot(register("ada")).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app.clone().oneshot(register("bob")).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(state.users.len(), 1);
}

#[tokio::test]
async fn clients_are_limited_independently() {
    let state = Arc::new(AppState::from_config(limited(0.001, 1)).unwrap());
    let router = build_router(state.clone()).unwrap();
    let from = |peer: &str| router.clone().layer(Extension(ConnectInfo(peer.parse::<SocketAddr>().unwrap())));

    let a = from("10.0.0.1:1000");
    let b = from("10.0.0.2:1000");

    assert_eq!(a.clone().oneshot(get("/health")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        a.clone().oneshot(get("/health")).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(b.clone().oneshot(get("/health")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(state.rate_limiter.tracked_clients(), 2);
}

#[tokio::test]
async fn disabled_rate_limit_never_rejects() {
    let mut config = limited(0.001, 1);
    config.middleware.rate_limit.enabled = false;
    let (app, state) = app_with(config, "1.2.3.4:5000");

    for _ in 0..50 {
        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert!(!state.rate_limiter.is_active());
}

#[tokio::test]
async fn forwarded_for_keys_the_limiter_only_from_trusted_proxies() {
    let mut config = limited(0.001, 1);
    config.server.trusted_proxies = vec!["10.0.0.1".parse().unwrap()];
    let (app, state) = app_with(config, "10.0.0.1:443");

    let via_proxy = |client: &'static str| {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", client)
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.clone().oneshot(via_proxy("203.0.113.1")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(app.clone().oneshot(via_proxy("203.0.113.2")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        app.clone().oneshot(via_proxy("203.0.113.1")).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    let registry = state.rate_limiter.registry().unwrap();
    assert!(registry.budget("203.0.113.1").is_some());
    assert!(registry.budget("10.0.0.1").is_none());
}

#[tokio::test]
async fn spoofed_forwarded_hop_does_not_buy_a_fresh_budget() {
    let mut config = limited(0.001, 1);
    config.server.trusted_proxies = vec!["10.0.0.1".parse().unwrap()];
    let (app, _) = app_with(config, "10.0.0.1:443");

    let spoofed = |claimed: &'static str| {
        Request::builder()
            .uri("/health")
            .header("x-forwarded-for", format!("{claimed}, 203.0.113.7"))
            .body(Body::empty())
            .unwrap()
    };

    assert_eq!(app.clone().oneshot(spoofed("1.1.1.1")).await.unwrap().status(), StatusCode::OK);
    assert_eq!(
        app.clone().oneshot(spoofed("2.2.2.2")).await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn ip_allow_list_answers_403() {
    let mut config = Config::default();
    config.middleware.ip_access.enabled = true;
    config.middleware.ip_access.allowed_ips = vec!["127.0.0.1".parse().unwrap()];

    let (allowed, _) = app_with(config.clone(), "127.0.0.1:9000");
    let (denied, _) = app_with(config, "192.168.0.10:9000");

    assert_eq!(allowed.oneshot(get("/health")).await.unwrap().status(), StatusCode::OK);

    let response = denied.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({"error": "access denied for your IP address", "code": 403})
    );
}

#[tokio::test]
async fn protected_route_requires_a_valid_token() {
    let mut config = Config::default();
    config.jwt.enabled = true;
    config.jwt.secret = SECRET.to_string();
    let (app, _) = app_with(config, "127.0.0.1:4000");

    let created = app.clone().oneshot(register("ada")).await.unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = body_json(created).await;
    let id = body["user"]["id"].as_u64().unwrap();
    let token = body["token"].as_str().unwrap().to_string();

    let missing = app.clone().oneshot(get(&format!("/v1/users/{id}"))).await.unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(missing).await,
        json!({"error": "authorization header required", "code": 401})
    );

    let forged = Request::builder()
        .uri(format!("/v1/users/{id}"))
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let forged = app.clone().oneshot(forged).await.unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);

    let authed = Request::builder()
        .uri(format!("/v1/users/{id}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let authed = app.clone().oneshot(authed).await.unwrap();
    assert_eq!(authed.status(), StatusCode::OK);
    assert_eq!(body_json(authed).await["name"], "ada");
}

#[tokio::test]
async fn open_routes_when_jwt_is_disabled() {
    let (app, _) = app_with(Config::default(), "127.0.0.1:4000");

    let created = app.clone().oneshot(register("ada")).await.unwrap();
    let body = body_json(created).await;
    assert!(body.get("token").is_none());

    let found = app.clone().oneshot(get("/v1/users/1")).await.unwrap();
    assert_eq!(found.status(), StatusCode::OK);

    let missing = app.clone().oneshot(get("/v1/users/99")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(missing).await,
        json!({"error": "user not found", "code": 404})
    );
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let (app, _) = app_with(Config::default(), "127.0.0.1:4000");

    assert_eq!(app.clone().oneshot(register("ada")).await.unwrap().status(), StatusCode::CREATED);
    assert_eq!(app.clone().oneshot(register("ada")).await.unwrap().status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_register_body_is_a_json_400() {
    let (app, state) = app_with(Config::default(), "127.0.0.1:4000");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"name": "ada"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("email"));
    assert!(state.users.is_empty());
}

#[tokio::test]
async fn non_numeric_user_id_is_a_json_400() {
    let (app, _) = app_with(Config::default(), "127.0.0.1:4000");

    let response = app.oneshot(get("/v1/users/abc")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn metrics_route_follows_config() {
    let (without, _) = app_with(Config::default(), "127.0.0.1:4000");
    assert_eq!(without.oneshot(get("/metrics")).await.unwrap().status(), StatusCode::NOT_FOUND);

    let mut config = Config::default();
    config.middleware.prometheus = true;
    let (with, _) = app_with(config, "127.0.0.1:4000");

    let response = with.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("rate_limit_tracked_clients"));
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let (app, _) = app_with(Config::default(), "127.0.0.1:4000");

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/v1/register")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(preflight).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
