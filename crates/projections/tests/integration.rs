//! Integration tests: commands through the bus → ProjectionProcessor → views.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    ApproveOrder, CancelProductReservation, CreateOrder, CreateProduct, InMemoryProductLookup,
    Money, OrderStatus, PaymentDetails, ProcessPayment, RejectOrder, ReserveProduct,
};
use event_store::InMemoryEventStore;
use messaging::{CommandBus, CommandBusConfig, CommandGateway, EventBus};
use projections::{OrdersView, PaymentsView, ProductsView, ProjectionProcessor};

struct Setup {
    store: InMemoryEventStore,
    bus: CommandBus<InMemoryEventStore>,
    processor: Arc<ProjectionProcessor<InMemoryEventStore>>,
    orders: OrdersView,
    products: ProductsView,
    payments: PaymentsView,
}

fn setup() -> Setup {
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

    let bus = CommandBus::new(
        store.clone(),
        Arc::new(InMemoryProductLookup::new()),
        events,
        CommandBusConfig::default(),
    );

    Setup {
        store,
        bus,
        processor,
        orders,
        products,
        payments,
    }
}

fn details() -> PaymentDetails {
    PaymentDetails {
        name: "JHON DOE".to_string(),
        card_number: "123Card".to_string(),
        valid_until_month: 12,
        valid_until_year: 2030,
        cvv: "123".to_string(),
    }
}

/// Creates product P-1 with stock 5 and runs order O-1 (qty 2) to approval
/// and order O-2 (qty 1) to rejection after a released reservation.
async fn run_two_orders(s: &Setup) {
    let product_id = AggregateId::from("P-1");
    let approved = AggregateId::from("O-1");
    let rejected = AggregateId::from("O-2");

    s.bus
        .dispatch(CreateProduct::new(product_id.clone(), "Keyboard", Money::from_cents(4999), 5).into())
        .await
        .unwrap();

    s.bus
        .dispatch(CreateOrder::new(approved.clone(), "P-1", "U-1", 2, "A-1").into())
        .await
        .unwrap();
    s.bus
        .dispatch(ReserveProduct::new(product_id.clone(), approved.clone(), "U-1", 2).into())
        .await
        .unwrap();
    s.bus
        .dispatch(ProcessPayment::new(AggregateId::from("PAY-1"), approved.clone(), details()).into())
        .await
        .unwrap();
    s.bus
        .dispatch(ApproveOrder::new(approved).into())
        .await
        .unwrap();

    s.bus
        .dispatch(CreateOrder::new(rejected.clone(), "P-1", "U-2", 1, "A-2").into())
        .await
        .unwrap();
    s.bus
        .dispatch(ReserveProduct::new(product_id.clone(), rejected.clone(), "U-2", 1).into())
        .await
        .unwrap();
    s.bus
        .dispatch(
            CancelProductReservation::new(product_id, rejected.clone(), "U-2", 1, "Payment timeout")
                .into(),
        )
        .await
        .unwrap();
    s.bus
        .dispatch(RejectOrder::new(rejected, "Payment timeout").into())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_views_follow_live_events() {
    let s = setup();
    run_two_orders(&s).await;

    let o1 = s.orders.get(&AggregateId::from("O-1")).await.unwrap();
    assert_eq!(o1.order_status, OrderStatus::Approved);
    assert_eq!(o1.quantity, 2);

    let o2 = s.orders.get(&AggregateId::from("O-2")).await.unwrap();
    assert_eq!(o2.order_status, OrderStatus::Rejected);
    assert_eq!(o2.reason.as_deref(), Some("Payment timeout"));

    let product = s.products.get(&AggregateId::from("P-1")).await.unwrap();
    assert_eq!(product.quantity, 3);

    let payment = s
        .payments
        .find_by_order(&AggregateId::from("O-1"))
        .await
        .unwrap();
    assert_eq!(payment.payment_id.as_str(), "PAY-1");
    assert!(s.payments.find_by_order(&AggregateId::from("O-2")).await.is_none());
}

#[tokio::test]
async fn test_reset_rebuilds_the_same_view() {
    let s = setup();
    run_two_orders(&s).await;
    let before = s.products.all().await;

    s.processor.reset("products").await.unwrap();

    assert_eq!(s.products.all().await, before);
    assert_eq!(s.orders.len().await, 2);
}

#[tokio::test]
async fn test_catch_up_from_store_matches_live_views() {
    let s = setup();
    run_two_orders(&s).await;

    let orders = OrdersView::new();
    let products = ProductsView::new();
    let mut fresh = ProjectionProcessor::new(s.store.clone());
    fresh.register(Arc::new(orders.clone()));
    fresh.register(Arc::new(products.clone()));

    fresh.run_catch_up().await.unwrap();

    assert_eq!(orders.all().await, s.orders.all().await);
    assert_eq!(products.all().await, s.products.all().await);
}

#[tokio::test]
async fn test_reset_of_unknown_projection_fails() {
    let s = setup();

    let err = s.processor.reset("product-group").await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "The event processor with name [product-group] is not exists"
    );
}
