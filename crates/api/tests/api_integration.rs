//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use api::{AppState, Config};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::InMemoryProductLookup;
use event_store::InMemoryEventStore;
use messaging::{CommandBus, EventBus};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{OrdersView, PaymentsView, ProductsView, ProjectionProcessor};
use saga::order_fulfillment::REASON_NO_PAYMENT_DETAILS;
use saga::{
    CompletionNotifier, InMemoryDeadlineScheduler, InMemorySagaStore, InMemoryUserDirectory,
    SagaContext, SagaDeadline, SagaOrchestrator,
};
use serde_json::{Value, json};
use tower::ServiceExt;

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

fn setup_with_state() -> (axum::Router, Arc<AppState<InMemoryEventStore>>) {
    let state = api::create_default_state(InMemoryEventStore::new(), Config::default());
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

fn setup() -> axum::Router {
    setup_with_state().0
}

/// Wiring with no saga listening, so placed orders never complete.
fn setup_without_saga(config: Config) -> axum::Router {
    let store = InMemoryEventStore::new();
    let events = EventBus::new();

    let orders = OrdersView::new();
    let products = ProductsView::new();
    let payments = PaymentsView::new();
    let mut processor = ProjectionProcessor::new(store.clone());
    processor.register(Arc::new(orders.clone()));
    processor.register(Arc::new(products.clone()));
    processor.register(Arc::new(payments.clone()));
    let processor = Arc::new(processor);
    events.subscribe(processor.clone());

    let commands = Arc::new(CommandBus::new(
        store,
        Arc::new(InMemoryProductLookup::new()),
        events,
        config.bus_config(),
    ));

    let users = InMemoryUserDirectory::new();
    let (scheduler, _fired) = InMemoryDeadlineScheduler::<SagaDeadline>::new();
    let orchestrator = SagaOrchestrator::new(
        Arc::new(InMemorySagaStore::new()),
        SagaContext {
            commands: commands.clone(),
            users: Arc::new(users.clone()),
            deadlines: Arc::new(scheduler),
            notifier: CompletionNotifier::new(),
        },
        config.saga_config(),
    );

    let state = Arc::new(AppState {
        commands,
        orchestrator,
        projection_processor: processor,
        orders,
        products,
        payments,
        users,
        config,
    });
    api::create_app(state, get_metrics_handle())
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(app: &axum::Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&payload).unwrap()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn create_product(app: &axum::Router, product_id: &str, title: &str, quantity: u32) {
    let (status, json) = post_json(
        app,
        "/products",
        json!({ "productId": product_id, "title": title, "price": 1500, "quantity": quantity }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    assert_eq!(json["productId"], product_id);
}

async fn place_order(app: &axum::Router, product_id: &str, quantity: u32) -> (StatusCode, Value) {
    post_json(
        app,
        "/orders",
        json!({ "productId": product_id, "quantity": quantity, "addressId": "A-1" }),
    )
    .await
}

async fn product_stock(app: &axum::Router, product_id: &str) -> u64 {
    let (_, products) = get_json(app, "/products").await;
    products
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["productId"] == product_id)
        .unwrap()["quantity"]
        .as_u64()
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["projections"], 3);
    assert_eq!(json["subscribers"], 2);
    assert_eq!(json["activeSagas"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_and_list_products() {
    let app = setup();

    create_product(&app, "P-1", "Keyboard", 5).await;
    create_product(&app, "P-2", "Mouse", 2).await;

    let (status, products) = get_json(&app, "/products").await;
    assert_eq!(status, StatusCode::OK);

    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["title"], "Keyboard");
    assert_eq!(products[0]["price"], 1500);
    assert_eq!(products[0]["quantity"], 5);
    assert_eq!(products[1]["title"], "Mouse");
}

#[tokio::test]
async fn test_create_product_generates_id() {
    let app = setup();

    let (status, json) = post_json(
        &app,
        "/products",
        json!({ "title": "Monitor", "price": 20000, "quantity": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(!json["productId"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_product_validation() {
    let app = setup();

    for payload in [
        json!({ "title": " ", "price": 100, "quantity": 1 }),
        json!({ "title": "Keyboard", "price": 0, "quantity": 1 }),
        json!({ "title": "Keyboard", "price": 100, "quantity": 0 }),
        json!({ "title": "Keyboard", "price": 100, "quantity": 6 }),
    ] {
        let (status, json) = post_json(&app, "/products", payload.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload} -> {json}");
        assert!(json["error"].is_string());
    }
}

#[tokio::test]
async fn test_duplicate_product_is_conflict() {
    let app = setup();
    create_product(&app, "P-1", "Keyboard", 5).await;

    let (status, json) = post_json(
        &app,
        "/products",
        json!({ "productId": "P-2", "title": "Keyboard", "price": 100, "quantity": 1 }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["error"],
        "Product with productId P-2 or title Keyboard already exist"
    );
}

#[tokio::test]
async fn test_place_order_approved() {
    let app = setup();
    create_product(&app, "P-1", "Keyboard", 3).await;

    let (status, summary) = place_order(&app, "P-1", 2).await;

    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["orderStatus"], "APPROVED");
    assert_eq!(summary["message"], "");
    let order_id = summary["orderId"].as_str().unwrap().to_string();

    let (status, order) = get_json(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["orderStatus"], "APPROVED");
    assert_eq!(order["productId"], "P-1");
    assert_eq!(order["quantity"], 2);
    assert_eq!(order["userId"], api::config::DEFAULT_USER_ID);

    let (status, payment) = get_json(&app, &format!("/payments/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["orderId"], order_id);

    assert_eq!(product_stock(&app, "P-1").await, 1);
}

#[tokio::test]
async fn test_place_order_exceeding_stock_is_rejected() {
    let app = setup();
    create_product(&app, "P-1", "Keyboard", 3).await;

    let (status, summary) = place_order(&app, "P-1", 4).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["orderStatus"], "REJECTED");
    assert_eq!(summary["message"], "Insufficient number of items in stock");
    assert_eq!(product_stock(&app, "P-1").await, 3);

    let order_id = summary["orderId"].as_str().unwrap();
    let (status, _) = get_json(&app, &format!("/payments/{order_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_place_order_for_unknown_product_is_rejected() {
    let app = setup();

    let (status, summary) = place_order(&app, "P-404", 1).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["orderStatus"], "REJECTED");
    assert_eq!(summary["message"], "Product P-404 does not exist");
}

#[tokio::test]
async fn test_missing_payment_details_releases_stock() {
    let (app, state) = setup_with_state();
    state.users.set_not_found(true);
    create_product(&app, "P-1", "Keyboard", 3).await;

    let (status, summary) = place_order(&app, "P-1", 2).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["orderStatus"], "REJECTED");
    assert_eq!(summary["message"], REASON_NO_PAYMENT_DETAILS);
    assert_eq!(product_stock(&app, "P-1").await, 3);

    let order_id = summary["orderId"].as_str().unwrap();
    let (_, order) = get_json(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(order["orderStatus"], "REJECTED");
    assert_eq!(order["reason"], REASON_NO_PAYMENT_DETAILS);
}

#[tokio::test]
async fn test_place_order_validation() {
    let app = setup();

    for payload in [
        json!({ "productId": "P-1", "quantity": 0, "addressId": "A-1" }),
        json!({ "productId": "P-1", "quantity": 6, "addressId": "A-1" }),
        json!({ "productId": "", "quantity": 1, "addressId": "A-1" }),
        json!({ "productId": "P-1", "quantity": 1, "addressId": "  " }),
    ] {
        let (status, _) = post_json(&app, "/orders", payload.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload}");
    }

    let (_, orders) = get_json(&app, "/orders").await;
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_place_order_times_out_without_outcome() {
    let config = Config {
        order_response_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let app = setup_without_saga(config);
    create_product(&app, "P-1", "Keyboard", 3).await;

    let (status, json) = place_order(&app, "P-1", 1).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(json["error"].as_str().unwrap().contains("did not complete"));

    let (_, orders) = get_json(&app, "/orders").await;
    assert_eq!(orders[0]["orderStatus"], "CREATED");
}

#[tokio::test]
async fn test_get_nonexistent_order_and_payment() {
    let app = setup();

    let (status, json) = get_json(&app, "/orders/O-404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Order O-404 not found");

    let (status, _) = get_json(&app, "/payments/O-404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_rebuilds_read_model() {
    let app = setup();
    create_product(&app, "P-1", "Keyboard", 3).await;
    let (_, summary) = place_order(&app, "P-1", 1).await;
    let order_id = summary["orderId"].as_str().unwrap().to_string();
    let (_, before) = get_json(&app, "/orders").await;

    let request = Request::builder()
        .method("POST")
        .uri("/management/event-processor/orders/reset")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(body).unwrap(),
        "The event processor with name [orders] has been reset"
    );

    let (_, after) = get_json(&app, "/orders").await;
    assert_eq!(before, after);

    let (status, order) = get_json(&app, &format!("/orders/{order_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["orderStatus"], "APPROVED");
}

#[tokio::test]
async fn test_reset_unknown_processor() {
    let app = setup();

    let request = Request::builder()
        .method("POST")
        .uri("/management/event-processor/shipping/reset")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json["error"],
        "The event processor with name [shipping] is not exists"
    );
}
