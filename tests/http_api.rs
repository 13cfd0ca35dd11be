//! HTTP routes driven through the router with `oneshot`

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use loyalty_ledger::application::handlers::{build_router, AppState};
use loyalty_ledger::domain::entities::order::{OrderStatus, OrderUpdate};
use loyalty_ledger::domain::repositories::ledger_store::OrderStore;
use loyalty_ledger::domain::services::token_service::{TokenConfig, TokenService};
use loyalty_ledger::domain::value_objects::order_number::OrderNumber;
use loyalty_ledger::domain::value_objects::points::Points;
use loyalty_ledger::persistence::InMemoryLedgerStore;
use loyalty_ledger::rate_limit::{create_rate_limiter, RateLimiterConfig};

const SECRET: &[u8] = b"http-api-test-signing-secret-0123456789";

fn app_with_limit(requests_per_minute: u32) -> (Router, Arc<InMemoryLedgerStore>) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let tokens = TokenService::new(SECRET, TokenConfig::default());
    let state = AppState::new(store.clone(), tokens, 4 /* bcrypt minimum cost */);
    let limiter = create_rate_limiter(RateLimiterConfig {
        requests_per_minute,
    });
    (build_router(state, limiter), store)
}

fn app() -> (Router, Arc<InMemoryLedgerStore>) {
    app_with_limit(1000)
}

fn json_request(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn text_request(uri: &str, body: &str, token: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn register(app: &Router, login: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "/api/user/register",
            json!({"login": login, "password": "secret"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let header = response
        .headers()
        .get(header::AUTHORIZATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = body_json(response).await;
    let token = body["token"].as_str().unwrap().to_string();
    assert_eq!(header, format!("Bearer {}", token));
    token
}

async fn process(store: &InMemoryLedgerStore, number: &str, accrual_minor: i64) {
    store
        .update_orders(&[OrderUpdate {
            number: OrderNumber::parse(number).unwrap(),
            status: OrderStatus::Processed,
            accrual: Points::from_minor(accrual_minor),
        }])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_register_and_login_statuses() {
    let (app, _) = app();
    register(&app, "alice").await;

    let busy = app
        .clone()
        .oneshot(json_request(
            "/api/user/register",
            json!({"login": "alice", "password": "other"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(busy.status(), StatusCode::CONFLICT);

    let empty = app
        .clone()
        .oneshot(json_request(
            "/api/user/register",
            json!({"login": "", "password": "x"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let malformed = app
        .clone()
        .oneshot(json_request("/api/user/register", json!({"login": 1}), None))
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let ok = app
        .clone()
        .oneshot(json_request(
            "/api/user/login",
            json!({"login": "alice", "password": "secret"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let wrong = app
        .clone()
        .oneshot(json_request(
            "/api/user/login",
            json!({"login": "alice", "password": "nope"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_account_routes_require_token() {
    let (app, _) = app();

    let missing = app
        .clone()
        .oneshot(Request::get("/api/user/balance").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let forged = app
        .clone()
        .oneshot(get_request("/api/user/balance", "not.a.token"))
        .await
        .unwrap();
    assert_eq!(forged.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_upload_statuses() {
    let (app, _) = app();
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let cases = [
        (&alice, "79927398713", StatusCode::ACCEPTED),
        (&alice, "79927398713", StatusCode::OK),
        (&bob, "79927398713", StatusCode::CONFLICT),
        (&alice, "79927398710", StatusCode::UNPROCESSABLE_ENTITY),
        (&alice, "not-a-number", StatusCode::UNPROCESSABLE_ENTITY),
    ];
    for (token, number, expected) in cases {
        let response = app
            .clone()
            .oneshot(text_request("/api/user/orders", number, token))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "posting {}", number);
    }
}

#[tokio::test]
async fn test_order_listing() {
    let (app, store) = app();
    let alice = register(&app, "alice").await;

    let empty = app
        .clone()
        .oneshot(get_request("/api/user/orders", &alice))
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::NO_CONTENT);

    app.clone()
        .oneshot(text_request("/api/user/orders", "79927398713", &alice))
        .await
        .unwrap();
    process(&store, "79927398713", 50_050).await;

    let listed = app
        .clone()
        .oneshot(get_request("/api/user/orders", &alice))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let body = body_json(listed).await;
    assert_eq!(body[0]["number"], "79927398713");
    assert_eq!(body[0]["status"], "PROCESSED");
    assert_eq!(body[0]["accrual"], 500.5);
    assert!(body[0]["uploaded_at"].is_string());
}

#[tokio::test]
async fn test_balance_and_withdrawals() {
    let (app, store) = app();
    let alice = register(&app, "alice").await;
    app.clone()
        .oneshot(text_request("/api/user/orders", "79927398713", &alice))
        .await
        .unwrap();
    process(&store, "79927398713", 10_000).await;

    let withdraw = |sum: Value, order: &str| {
        json_request(
            "/api/user/balance/withdraw",
            json!({"order": order, "sum": sum}),
            Some(alice.as_str()),
        )
    };

    let ok = app.clone().oneshot(withdraw(json!(40), "12345674")).await.unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let too_much = app.clone().oneshot(withdraw(json!(90), "12345674")).await.unwrap();
    assert_eq!(too_much.status(), StatusCode::PAYMENT_REQUIRED);

    let bad_reference = app.clone().oneshot(withdraw(json!(1), "12345670")).await.unwrap();
    assert_eq!(bad_reference.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let bad_amount = app.clone().oneshot(withdraw(json!(-1), "12345674")).await.unwrap();
    assert_eq!(bad_amount.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let balance = app
        .clone()
        .oneshot(get_request("/api/user/balance", &alice))
        .await
        .unwrap();
    assert_eq!(balance.status(), StatusCode::OK);
    let body = body_json(balance).await;
    assert_eq!(body["current"], 60.0);
    assert_eq!(body["withdrawn"], 40.0);

    let listed = app
        .clone()
        .oneshot(get_request("/api/user/withdrawals", &alice))
        .await
        .unwrap();
    assert_eq!(listed.status(), StatusCode::OK);
    let body = body_json(listed).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["order"], "12345674");
    assert_eq!(body[0]["sum"], 40.0);
}

#[tokio::test]
async fn test_empty_withdrawal_history_is_no_content() {
    let (app, _) = app();
    let alice = register(&app, "alice").await;
    let response = app
        .clone()
        .oneshot(get_request("/api/user/withdrawals", &alice))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_credential_routes_are_rate_limited() {
    let (app, _) = app_with_limit(2);
    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(json_request(
                "/api/user/login",
                json!({"login": "ghost", "password": "x"}),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let limited = app
        .clone()
        .oneshot(json_request(
            "/api/user/login",
            json!({"login": "ghost", "password": "x"}),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
}
