//! Command bus and event bus working together.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::AggregateId;
use domain::{CreateProduct, InMemoryProductLookup, Money, ReserveProduct};
use event_store::{EventEnvelope, InMemoryEventStore};
use messaging::{
    CommandBus, CommandBusConfig, CommandGateway, EventBus, EventSubscriber, SubscriberError,
};

#[derive(Default)]
struct Collector {
    events: Mutex<Vec<(String, i64)>>,
}

#[async_trait]
impl EventSubscriber for Collector {
    fn name(&self) -> &str {
        "collector"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), SubscriberError> {
        self.events
            .lock()
            .unwrap()
            .push((envelope.event_type.clone(), envelope.version.as_i64()));
        Ok(())
    }
}

fn setup() -> (Arc<CommandBus<InMemoryEventStore>>, Arc<Collector>) {
    let events = EventBus::new();
    let collector = Arc::new(Collector::default());
    events.subscribe(collector.clone());

    let bus = CommandBus::new(
        InMemoryEventStore::new(),
        Arc::new(InMemoryProductLookup::new()),
        events,
        CommandBusConfig {
            partitions: 4,
            ..CommandBusConfig::default()
        },
    );
    (Arc::new(bus), collector)
}

#[tokio::test]
async fn committed_events_are_published_in_commit_order() {
    let (bus, collector) = setup();
    let product_id = AggregateId::from("P-1");

    bus.dispatch(CreateProduct::new(product_id.clone(), "Keyboard", Money::from_cents(100), 5).into())
        .await
        .unwrap();
    for order in 1..=3 {
        bus.dispatch(
            ReserveProduct::new(
                product_id.clone(),
                AggregateId::from(format!("O-{order}")),
                "U-1",
                1,
            )
            .into(),
        )
        .await
        .unwrap();
    }

    let events = collector.events.lock().unwrap().clone();
    let versions: Vec<i64> = events.iter().map(|(_, v)| *v).collect();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    assert_eq!(events[0].0, "ProductCreated");
}

#[tokio::test]
async fn rejected_commands_publish_nothing() {
    let (bus, collector) = setup();

    let result = bus
        .dispatch(ReserveProduct::new(AggregateId::from("P-404"), AggregateId::new(), "U-1", 1).into())
        .await;

    assert!(result.is_err());
    assert!(collector.events.lock().unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_dispatches_to_one_product_are_serialized() {
    let (bus, collector) = setup();
    let product_id = AggregateId::from("P-1");
    bus.dispatch(CreateProduct::new(product_id.clone(), "Keyboard", Money::from_cents(100), 3).into())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let bus = Arc::clone(&bus);
        let product_id = product_id.clone();
        handles.push(tokio::spawn(async move {
            bus.dispatch(ReserveProduct::new(product_id, AggregateId::new(), "U-1", 1).into())
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(e) => assert_eq!(e.to_string(), "Insufficient number of items in stock"),
        }
    }

    assert_eq!(accepted, 3);
    let product = bus.products().get_product(&product_id).await.unwrap().unwrap();
    assert_eq!(product.quantity(), 0);
    assert_eq!(collector.events.lock().unwrap().len(), 4);
}
