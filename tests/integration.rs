use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use order_dispatch::api::rest::router;
use order_dispatch::models::driver::ServiceType;
use order_dispatch::models::order::{Order, OrderStatus};
use order_dispatch::notify::push::LogSender;
use order_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn setup() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(1024, 300, Arc::new(LogSender)));
    (router(state.clone()), state)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn register_driver(app: &axum::Router, service_type: &str) -> Uuid {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Ahmed",
                "service_type": service_type,
                "location": { "lat": 33.3152, "lng": 44.3661 },
                "push_token": "driver-token"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

async fn create_order(app: &axum::Router, service_type: &str) -> Uuid {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "service_type": service_type,
                "customer_id": "+9647700000001",
                "customer_name": "Zahra",
                "customer_location": { "lat": 33.3152, "lng": 44.3661 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

async fn accept(app: &axum::Router, order_id: Uuid, driver_id: Uuid) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "POST",
            &format!("/orders/{order_id}/accept"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap()
}

async fn put_status(app: &axum::Router, order_id: Uuid, body: Value) -> axum::response::Response {
    app.clone()
        .oneshot(json_request(
            "PUT",
            &format!("/orders/{order_id}/status"),
            body,
        ))
        .await
        .unwrap()
}

fn stale_order(age_minutes: i64) -> Order {
    let created_at = Utc::now() - Duration::minutes(age_minutes);
    Order {
        id: Uuid::new_v4(),
        service_type: ServiceType::Taxi,
        status: OrderStatus::Pending,
        customer_id: "+9647700000002".to_string(),
        customer_name: "Hassan".to_string(),
        customer_address: None,
        customer_location: None,
        items: Vec::new(),
        destination: None,
        destination_address: None,
        notes: None,
        total: None,
        driver_id: None,
        driver_accepted_at: None,
        cancellation_reason: None,
        created_at,
        updated_at: created_at,
    }
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 0);
    assert_eq!(body["drivers"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("orders_expired_total"));
}

#[tokio::test]
async fn register_driver_returns_driver() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Ahmed",
                "service_type": "delivery",
                "location": { "lat": 33.3152, "lng": 44.3661 }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "Ahmed");
    assert_eq!(body["service_type"], "delivery");
    assert_eq!(body["is_available"], true);
    assert!(body["id"].as_str().unwrap().len() > 0);
}

#[tokio::test]
async fn register_driver_rejects_blank_name() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({ "name": "  ", "service_type": "taxi" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_order_rejects_blank_customer_name() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "service_type": "taxi",
                "customer_id": "+9647700000001",
                "customer_name": ""
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_taxi_order_starts_pending() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "service_type": "taxi",
                "customer_id": "+9647700000001",
                "customer_name": "Zahra"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    assert_eq!(body["driver_id"], Value::Null);
    assert_eq!(body["customer_name"], "Zahra");
}

#[tokio::test]
async fn delivery_order_with_items_starts_preparing() {
    let (app, _state) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "service_type": "delivery",
                "customer_id": "+9647700000001",
                "customer_name": "Zahra",
                "items": [
                    { "product_id": "p1", "product_name": "Rice", "price": 3.5, "quantity": 2 }
                ]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["status"], "preparing");
}

#[tokio::test]
async fn accept_assigns_driver_once() {
    let (app, _state) = setup();
    let winner = register_driver(&app, "taxi").await;
    let loser = register_driver(&app, "taxi").await;
    let order_id = create_order(&app, "taxi").await;

    let response = accept(&app, order_id, winner).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["driver_id"], winner.to_string());
    assert!(body["driver_accepted_at"].as_str().is_some());

    let conflict = accept(&app, order_id, loser).await;
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn accept_unknown_order_is_not_found() {
    let (app, _state) = setup();
    let driver_id = register_driver(&app, "taxi").await;

    let response = accept(&app, Uuid::new_v4(), driver_id).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn driver_progression_requires_assignment() {
    let (app, _state) = setup();
    let order_id = create_order(&app, "taxi").await;

    let response = put_status(&app, order_id, json!({ "status": "arrived" })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_cannot_move_backward() {
    let (app, _state) = setup();
    let driver_id = register_driver(&app, "taxi").await;
    let order_id = create_order(&app, "taxi").await;

    accept(&app, order_id, driver_id).await;
    let response = put_status(&app, order_id, json!({ "status": "arrived" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let backward = put_status(&app, order_id, json!({ "status": "accepted" })).await;
    assert_eq!(backward.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn driver_cancellation_after_arrival_requires_reason() {
    let (app, _state) = setup();
    let driver_id = register_driver(&app, "taxi").await;
    let order_id = create_order(&app, "taxi").await;

    accept(&app, order_id, driver_id).await;
    put_status(&app, order_id, json!({ "status": "arrived" })).await;

    let without_reason = put_status(
        &app,
        order_id,
        json!({ "status": "cancelled", "driver_id": driver_id }),
    )
    .await;
    assert_eq!(without_reason.status(), StatusCode::BAD_REQUEST);

    let with_reason = put_status(
        &app,
        order_id,
        json!({
            "status": "cancelled",
            "driver_id": driver_id,
            "cancellation_reason": "customer unreachable"
        }),
    )
    .await;
    assert_eq!(with_reason.status(), StatusCode::OK);

    let body = body_json(with_reason).await;
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["cancellation_reason"], "customer unreachable");
}

#[tokio::test]
async fn customer_can_cancel_until_driver_arrives() {
    let (app, _state) = setup();
    let driver_id = register_driver(&app, "taxi").await;

    // cancellable while merely accepted
    let order_id = create_order(&app, "taxi").await;
    accept(&app, order_id, driver_id).await;
    let response = put_status(&app, order_id, json!({ "status": "cancelled" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    // rejected once the trip is underway
    let order_id = create_order(&app, "taxi").await;
    accept(&app, order_id, driver_id).await;
    put_status(&app, order_id, json!({ "status": "arrived" })).await;
    put_status(&app, order_id, json!({ "status": "in_progress" })).await;

    let response = put_status(&app, order_id, json!({ "status": "cancelled" })).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn completed_orders_cannot_be_cancelled_by_anyone() {
    let (app, _state) = setup();
    let driver_id = register_driver(&app, "taxi").await;
    let order_id = create_order(&app, "taxi").await;

    accept(&app, order_id, driver_id).await;
    put_status(&app, order_id, json!({ "status": "in_progress" })).await;
    put_status(&app, order_id, json!({ "status": "completed" })).await;

    let as_driver = put_status(
        &app,
        order_id,
        json!({
            "status": "cancelled",
            "driver_id": driver_id,
            "cancellation_reason": "too late"
        }),
    )
    .await;
    assert_eq!(as_driver.status(), StatusCode::CONFLICT);

    let as_customer = put_status(&app, order_id, json!({ "status": "cancelled" })).await;
    assert_eq!(as_customer.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn available_listing_applies_the_lazy_expiration_filter() {
    let (app, state) = setup();

    let stale = stale_order(6);
    let stale_id = stale.id;
    state.orders.insert(stale_id, stale);

    let fresh_id = create_order(&app, "taxi").await;

    let response = app
        .clone()
        .oneshot(get_request("/orders?status=pending"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|order| order["id"].as_str().unwrap())
        .collect();

    assert!(ids.contains(&fresh_id.to_string().as_str()));
    assert!(!ids.contains(&stale_id.to_string().as_str()));

    // the stale order is cancelled in the background shortly after
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(
        state.orders.get(&stale_id).unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn include_expired_listing_keeps_stale_orders_visible() {
    let (app, state) = setup();

    let stale = stale_order(6);
    let stale_id = stale.id;
    state.orders.insert(stale_id, stale);

    let response = app
        .clone()
        .oneshot(get_request("/orders?status=pending&include_expired=true"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|order| order["id"].as_str().unwrap())
        .collect();

    assert!(ids.contains(&stale_id.to_string().as_str()));
}

#[tokio::test]
async fn listing_filters_by_driver_and_customer() {
    let (app, _state) = setup();
    let driver_id = register_driver(&app, "taxi").await;
    let order_id = create_order(&app, "taxi").await;
    create_order(&app, "taxi").await;

    accept(&app, order_id, driver_id).await;

    let response = app
        .clone()
        .oneshot(get_request(&format!("/orders?driver_id={driver_id}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], order_id.to_string());

    let response = app
        .clone()
        .oneshot(get_request("/orders?customer_id=%2B9647700000001"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn driver_location_update_emits_and_timestamps() {
    let (app, state) = setup();
    let driver_id = register_driver(&app, "delivery").await;

    let mut events = state.realtime.subscribe();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/location"),
            json!({ "location": { "lat": 33.40, "lng": 44.40 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["last_location_update"].as_str().is_some());
    assert_eq!(body["location"]["lat"], 33.40);

    let envelope = events.try_recv().unwrap();
    let event = serde_json::to_value(&envelope.event).unwrap();
    assert_eq!(event["event"], "driver:location:updated");
    assert_eq!(event["data"]["driver_id"], driver_id.to_string());
}

#[tokio::test]
async fn customer_push_token_registration_returns_no_content() {
    let (app, state) = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/customers/%2B9647700000001/push-token",
            json!({ "push_token": "customer-token" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        state
            .customer_tokens
            .get("+9647700000001")
            .unwrap()
            .value(),
        "customer-token"
    );
}

#[tokio::test]
async fn nearest_driver_lookup_returns_closest_match() {
    let (app, _state) = setup();

    let near = register_driver(&app, "crane").await;
    // second crane driver parked far away
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "name": "Omar",
                "service_type": "crane",
                "location": { "lat": 36.19, "lng": 43.99 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get_request(
            "/drivers/nearest?lat=33.3152&lng=44.3661&service_type=crane",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["driver"]["id"], near.to_string());
    assert!(body["distance_m"].as_f64().unwrap() < 1_000.0);
}

#[tokio::test]
async fn order_events_reach_the_global_feed() {
    let (app, state) = setup();
    let mut events = state.realtime.subscribe();

    let order_id = create_order(&app, "taxi").await;

    let envelope = events.try_recv().unwrap();
    let event = serde_json::to_value(&envelope.event).unwrap();
    assert_eq!(event["event"], "order:new");
    assert_eq!(event["data"]["order"]["id"], order_id.to_string());
}
