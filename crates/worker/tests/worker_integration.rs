//! Integration tests for the activity worker.

use std::sync::Arc;
use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use inventory::{InventoryRecord, ReservationConfig};
use metrics_exporter_prometheus::PrometheusHandle;
use state_store::InMemoryStateStore;
use tower::ServiceExt;
use worker::AppState;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_state() -> (
    axum::Router,
    Arc<AppState<InMemoryStateStore>>,
    InMemoryStateStore,
) {
    let store = InMemoryStateStore::new();
    let state = worker::create_default_state(store.clone(), ReservationConfig::default());
    let app = worker::create_app(state.clone(), get_metrics_handle());
    (app, state, store)
}

fn setup() -> axum::Router {
    setup_with_state().0
}

async fn seed(state: &AppState<InMemoryStateStore>, item: &str, quantity: u32) {
    state
        .catalog
        .restock(&InventoryRecord::new(item, 15000.0, quantity))
        .await
        .unwrap();
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn reserve_body(request_id: &str, item: &str, amount: u32) -> serde_json::Value {
    serde_json::json!({
        "workflowInstanceId": "wf-1",
        "attempt": 1,
        "input": {
            "requestId": request_id,
            "itemBeingPurchased": item,
            "amount": amount,
            "currency": 60000.0
        }
    })
}

#[tokio::test]
async fn test_health_check_lists_activities() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(
        json["activities"],
        serde_json::json!(["ReserveInventoryActivity"])
    );
}

#[tokio::test]
async fn test_list_activities() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/activities")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["activities"][0], "ReserveInventoryActivity");
}

#[tokio::test]
async fn test_reserve_activity_debits_stock() {
    let (app, state, _) = setup_with_state();
    seed(&state, "Cars", 10).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/activities/ReserveInventoryActivity",
            reserve_body("r-1", "Cars", 4),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["output"].is_null());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/inventory/Cars")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["quantity"], 6);
    assert_eq!(json["name"], "Cars");
}

#[tokio::test]
async fn test_insufficient_inventory_is_terminal() {
    let (app, state, _) = setup_with_state();
    seed(&state, "Cars", 3).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/activities/ReserveInventoryActivity",
            reserve_body("r-1", "Cars", 4),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert_eq!(json["retryable"], false);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Insufficient inventory")
    );
    assert_eq!(state.catalog.get("Cars").await.unwrap().unwrap().quantity, 3);
}

#[tokio::test]
async fn test_unknown_item_is_terminal() {
    let app = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/activities/ReserveInventoryActivity",
            reserve_body("r-1", "Boats", 1),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("Unknown item"));
}

#[tokio::test]
async fn test_store_outage_is_retryable() {
    let (app, state, store) = setup_with_state();
    seed(&state, "Cars", 10).await;
    store.set_unavailable(true);

    let response = app
        .oneshot(json_request(
            "POST",
            "/activities/ReserveInventoryActivity",
            reserve_body("r-1", "Cars", 1),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["retryable"], true);
}

#[tokio::test]
async fn test_unregistered_activity_returns_404() {
    let app = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/activities/RefundPaymentActivity",
            reserve_body("r-1", "Cars", 1),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_input_is_terminal() {
    let (app, state, _) = setup_with_state();
    seed(&state, "Cars", 10).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/activities/ReserveInventoryActivity",
            serde_json::json!({ "input": { "requestId": "r-1", "amount": -1 } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(state.catalog.get("Cars").await.unwrap().unwrap().quantity, 10);
}

#[tokio::test]
async fn test_redelivered_invocation_debits_once() {
    let (app, state, _) = setup_with_state();
    seed(&state, "Cars", 10).await;

    for attempt in 1..=2 {
        let mut body = reserve_body("r-dup", "Cars", 4);
        body["attempt"] = serde_json::json!(attempt);
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/activities/ReserveInventoryActivity",
                body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(state.catalog.get("Cars").await.unwrap().unwrap().quantity, 6);
}

#[tokio::test]
async fn test_restock_and_get_item() {
    let app = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/inventory/Computers",
            serde_json::json!({ "totalCost": 500.0, "quantity": 40 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["name"], "Computers");
    assert_eq!(json["quantity"], 40);
    assert_eq!(json["version"], 1);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/inventory/Computers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["totalCost"], 500.0);
}

#[tokio::test]
async fn test_restock_rejects_negative_price() {
    let app = setup();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/inventory/Computers",
            serde_json::json!({ "totalCost": -1.0, "quantity": 40 }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_missing_item_returns_404() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/inventory/Boats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint_reports_reservations() {
    let (app, state, _) = setup_with_state();
    seed(&state, "Paperclips", 10).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/activities/ReserveInventoryActivity",
            reserve_body("r-metrics", "Paperclips", 1),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("inventory_reservations_total"));
    assert!(text.contains("activity_invocations_total"));
}
