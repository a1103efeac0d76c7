// HTTP API tests: drive the router in-process

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use predictum_ledger::{routes, AppState, NewMarket};

fn app_with(state: AppState) -> (Router, Arc<AppState>) {
    let state = Arc::new(state);
    (routes::router(state.clone()), state)
}

fn empty_app(balance: f64) -> (Router, Arc<AppState>) {
    app_with(AppState::in_memory(balance).unwrap())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn in_a_day() -> String {
    (Utc::now() + Duration::days(1)).to_rfc3339()
}

#[tokio::test]
async fn test_full_betting_flow() {
    let (app, _) = empty_app(1000.0);

    let (status, market) = send(
        &app,
        "POST",
        "/api/markets",
        Some(json!({ "question": "Will it snow?", "category": "Weather", "endTime": in_a_day() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(market["id"], 1);
    assert_eq!(market["status"], "Active");
    assert_eq!(market["odds"]["yesOdds"], 0.5);

    let (status, bet) = send(
        &app,
        "POST",
        "/api/bet",
        Some(json!({ "marketId": 1, "outcome": "Yes", "amount": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bet["success"], true);
    assert_eq!(bet["balance"], 900.0);
    assert_eq!(bet["shares"], 100_000.0);
    assert_eq!(bet["market"]["yesPool"], 100.0);
    assert_eq!(bet["market"]["odds"]["yesOdds"], 1.0);

    let (status, resolved) = send(&app, "POST", "/api/markets/1/resolve", Some(json!({ "outcome": "Yes" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["market"]["status"], "Resolved");
    assert_eq!(resolved["market"]["winningOutcome"], "Yes");

    let (status, claim) = send(&app, "POST", "/api/claim/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(claim["payout"], 100.0);
    assert_eq!(claim["balance"], 1000.0);

    let (status, again) = send(&app, "POST", "/api/claim/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(again["error"].as_str().unwrap().contains("already claimed"));

    let (_, positions) = send(&app, "GET", "/api/positions", None).await;
    assert_eq!(positions[0]["marketId"], 1);
    assert_eq!(positions[0]["claimed"], true);

    let (_, balance) = send(&app, "GET", "/api/balance", None).await;
    assert_eq!(balance["balance"], 1000.0);
}

#[tokio::test]
async fn test_error_statuses() {
    let (app, _) = empty_app(50.0);
    send(
        &app,
        "POST",
        "/api/markets",
        Some(json!({ "question": "Q?", "category": "Test", "endTime": in_a_day() })),
    )
    .await;

    let (status, body) = send(&app, "GET", "/api/markets/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "GET", "/api/markets/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/bet", Some(json!({ "marketId": 1, "outcome": "Yes", "amount": 51 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/bet", Some(json!({ "marketId": 1, "outcome": "Maybe", "amount": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/bet", Some(json!({ "marketId": 1, "outcome": "No", "amount": -3 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/api/bet", Some(json!({ "marketId": 7, "outcome": "No", "amount": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "POST", "/api/claim/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/api/markets",
        Some(json!({ "question": "Q?", "category": "Test", "endTime": "tomorrow" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(&app, "POST", "/api/markets/1/resolve", Some(json!({ "outcome": "No" }))).await;
    let (status, _) = send(&app, "POST", "/api/markets/1/resolve", Some(json!({ "outcome": "Yes" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", "/api/bet", Some(json!({ "marketId": 1, "outcome": "No", "amount": 1 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, balance) = send(&app, "GET", "/api/balance", None).await;
    assert_eq!(balance["balance"], 50.0);
}

#[tokio::test]
async fn test_listing_pagination_and_filters() {
    let state = AppState::in_memory(0.0).unwrap();
    for i in 0..25 {
        let category = if i % 5 == 0 { "Sports" } else { "Crypto" };
        state
            .ledger
            .create_market(NewMarket::new(format!("Question {:02}?", i), category, Utc::now() + Duration::days(i + 1)))
            .unwrap();
    }
    let (app, _) = app_with(state);

    let (status, first) = send(&app, "GET", "/api/markets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["markets"].as_array().unwrap().len(), 20);
    assert_eq!(first["pagination"], json!({ "page": 1, "limit": 20, "total": 25, "totalPages": 2 }));
    // ending-soon by default
    assert_eq!(first["markets"][0]["question"], "Question 00?");

    let (_, second) = send(&app, "GET", "/api/markets?page=2&limit=20", None).await;
    assert_eq!(second["markets"].as_array().unwrap().len(), 5);

    let (_, beyond) = send(&app, "GET", "/api/markets?page=3", None).await;
    assert!(beyond["markets"].as_array().unwrap().is_empty());
    assert_eq!(beyond["pagination"]["total"], 25);

    let (_, lenient) = send(&app, "GET", "/api/markets?page=abc&limit=1000", None).await;
    assert_eq!(lenient["pagination"]["page"], 1);
    assert_eq!(lenient["pagination"]["limit"], 20);

    let (_, sports) = send(&app, "GET", "/api/markets?category=Sports&sortBy=alphabetical", None).await;
    assert_eq!(sports["pagination"]["total"], 5);
    assert_eq!(sports["markets"][4]["question"], "Question 20?");

    let (status, _) = send(&app, "GET", "/api/markets?sortBy=random", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/markets?status=Open", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expired_market_reads_as_locked() {
    let state = AppState::in_memory(100.0).unwrap();
    state
        .ledger
        .create_market(NewMarket::new("Already over?", "Test", Utc::now() - Duration::minutes(1)))
        .unwrap();
    let (app, _) = app_with(state);

    let (_, market) = send(&app, "GET", "/api/markets/1", None).await;
    assert_eq!(market["status"], "Locked");

    let (_, locked) = send(&app, "GET", "/api/markets?status=Locked", None).await;
    assert_eq!(locked["pagination"]["total"], 1);

    let (status, _) = send(&app, "POST", "/api/bet", Some(json!({ "marketId": 1, "outcome": "Yes", "amount": 5 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_quote_endpoint() {
    let state = AppState::in_memory(100.0).unwrap();
    state
        .ledger
        .create_market(NewMarket::new("Q?", "Test", Utc::now() + Duration::days(1)).with_pools(100.0, 300.0))
        .unwrap();
    let (app, _) = app_with(state);

    let (status, quote) = send(&app, "GET", "/api/markets/1/quote?outcome=Yes&amount=100", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["shares"], 100_000.0);
    assert_eq!(quote["potentialPayout"], 250.0);

    let (status, _) = send(&app, "GET", "/api/markets/1/quote?outcome=Yes", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = empty_app(0.0);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
