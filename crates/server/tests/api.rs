use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use migration::MigratorTrait;
use sea_orm::Database;
use serde_json::{Value, json};
use server::{ServerState, router};
use tower::ServiceExt;

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = engine::Engine::builder()
        .database(db)
        .build()
        .await
        .unwrap();
    router(ServerState {
        engine: Arc::new(engine),
    })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_trip(app: &Router) -> String {
    let (status, trip) = send(
        app,
        Method::POST,
        "/api/trips",
        Some(json!({ "title": "Rome", "currency": "EUR" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    trip["id"].as_str().unwrap().to_string()
}

async fn add_participant(app: &Router, trip_id: &str, name: &str) -> String {
    let (status, participant) = send(
        app,
        Method::POST,
        &format!("/api/trips/{trip_id}/participants"),
        Some(json!({ "name": name })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    participant["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn dinner_scenario_through_the_api() {
    let app = app().await;
    let trip_id = create_trip(&app).await;
    let a = add_participant(&app, &trip_id, "A").await;
    let b = add_participant(&app, &trip_id, "B").await;

    let (status, expense) = send(
        &app,
        Method::POST,
        &format!("/api/budget/{trip_id}/expenses"),
        Some(json!({
            "title": "Dinner",
            "amount_minor": 5000,
            "category": "food",
            "date": "2026-03-01",
            "paid_by": a,
            "splits": [
                { "participant_id": a, "amount_minor": 2500 },
                { "participant_id": b, "amount_minor": 2500 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(expense["paid_by_name"], "A");
    assert_eq!(expense["splits"][1]["participant_name"], "B");

    let (status, summary) = send(
        &app,
        Method::GET,
        &format!("/api/budget/{trip_id}/budget-summary"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_minor"], 5000);
    assert_eq!(summary["by_category"]["food"], 5000);

    let balances = summary["by_participant"].as_array().unwrap();
    let balance_of = |id: &str| {
        balances
            .iter()
            .find(|b| b["participant_id"] == id)
            .map(|b| b["balance_minor"].as_i64().unwrap())
            .unwrap()
    };
    assert_eq!(balance_of(&a), 2500);
    assert_eq!(balance_of(&b), -2500);
}

#[tokio::test]
async fn split_mismatch_is_422_with_both_sums() {
    let app = app().await;
    let trip_id = create_trip(&app).await;
    let a = add_participant(&app, &trip_id, "A").await;

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/budget/{trip_id}/expenses"),
        Some(json!({
            "title": "Taxi",
            "amount_minor": 3000,
            "date": "2026-03-01",
            "paid_by": a,
            "splits": [{ "participant_id": a, "amount_minor": 2000 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["expected_minor"], 3000);
    assert_eq!(body["actual_minor"], 2000);
    assert!(body["error"].as_str().unwrap().contains("30.00"));
}

#[tokio::test]
async fn unknown_participant_and_category_are_rejected() {
    let app = app().await;
    let trip_id = create_trip(&app).await;
    let a = add_participant(&app, &trip_id, "A").await;
    let stranger = uuid::Uuid::new_v4().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/budget/{trip_id}/expenses"),
        Some(json!({
            "title": "Bus",
            "amount_minor": 400,
            "date": "2026-03-01",
            "paid_by": a,
            "splits": [
                { "participant_id": a, "amount_minor": 200 },
                { "participant_id": stranger, "amount_minor": 200 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/budget/{trip_id}/expenses"),
        Some(json!({
            "title": "Bus",
            "amount_minor": 400,
            "category": "spa",
            "date": "2026-03-01",
            "paid_by": a,
            "splits": [{ "participant_id": a, "amount_minor": 400 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("spa"));
}

#[tokio::test]
async fn split_equally_and_delete_flow() {
    let app = app().await;
    let trip_id = create_trip(&app).await;
    let a = add_participant(&app, &trip_id, "A").await;
    add_participant(&app, &trip_id, "B").await;
    let c = add_participant(&app, &trip_id, "C").await;

    let (status, expense) = send(
        &app,
        Method::POST,
        &format!("/api/budget/{trip_id}/expenses/split-equally"),
        Some(json!({
            "title": "Hotel",
            "amount_minor": 10000,
            "category": "accommodation",
            "date": "2026-03-02",
            "paid_by": a
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let shares: Vec<i64> = expense["splits"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["amount_minor"].as_i64().unwrap())
        .collect();
    assert_eq!(shares, vec![3333, 3333, 3334]);
    assert_eq!(expense["splits"][2]["participant_id"], c.as_str());

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/trips/participants/{c}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());

    let expense_id = expense["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/budget/expenses/{expense_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/trips/participants/{c}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, list) = send(
        &app,
        Method::GET,
        &format!("/api/trips/{trip_id}/participants"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["participants"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn update_expense_revalidates() {
    let app = app().await;
    let trip_id = create_trip(&app).await;
    let a = add_participant(&app, &trip_id, "A").await;

    let (_, expense) = send(
        &app,
        Method::POST,
        &format!("/api/budget/{trip_id}/expenses"),
        Some(json!({
            "title": "Gelato",
            "amount_minor": 600,
            "date": "2026-03-03",
            "paid_by": a,
            "splits": [{ "participant_id": a, "amount_minor": 600 }]
        })),
    )
    .await;
    let expense_id = expense["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/budget/expenses/{expense_id}"),
        Some(json!({ "amount_minor": 900 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, updated) = send(
        &app,
        Method::PUT,
        &format!("/api/budget/expenses/{expense_id}"),
        Some(json!({
            "amount_minor": 900,
            "splits": [{ "participant_id": a, "amount_minor": 900 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["amount_minor"], 900);

    let (status, list) = send(
        &app,
        Method::GET,
        &format!("/api/budget/{trip_id}/expenses"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["expenses"][0]["amount_minor"], 900);
}

#[tokio::test]
async fn stateless_helpers() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/budget/equal-split",
        Some(json!({ "amount": "100.00", "count": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["shares_minor"], json!([3333, 3333, 3334]));
    assert_eq!(body["shares"], json!(["33.33", "33.33", "33.34"]));

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/budget/equal-split",
        Some(json!({ "amount": "10", "count": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/budget/equal-split",
        Some(json!({ "amount": "1.00", "count": 10_000_000_000u64 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Invalid amount: count must be at most 1000");

    let p = uuid::Uuid::new_v4();
    let q = uuid::Uuid::new_v4();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/budget/validate-splits",
        Some(json!({
            "amount_minor": 1000,
            "participants": [p, q],
            "splits": [
                { "participant_id": p, "amount_minor": 333 },
                { "participant_id": q, "amount_minor": 666 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["splits_total_minor"], 999);
}

#[tokio::test]
async fn missing_trip_is_404() {
    let app = app().await;
    let missing = uuid::Uuid::new_v4();

    let (status, body) = send(&app, Method::GET, &format!("/api/trips/{missing}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "\"trip not exists\" key not found!");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/budget/{missing}/budget-summary"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
