use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::product::{ProductCreatedData, ProductReservedData};
use domain::{DomainEvent, Money, ProductEvent};
use event_store::{AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Version};
use projections::{Projection, ProjectionProcessor, ProductsView};

use std::sync::Arc;

fn make_envelope(product_id: &AggregateId, version: i64, event: &ProductEvent) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(product_id.clone())
        .aggregate_type("Product")
        .event_type(DomainEvent::event_type(event))
        .version(Version::new(version))
        .payload(event)
        .unwrap()
        .build()
        .unwrap()
}

/// Populate a store with N products, each created and then reserved twice.
async fn populate_store(store: &InMemoryEventStore, n: usize) {
    for i in 0..n {
        let product_id = AggregateId::new();
        let created = ProductEvent::ProductCreated(ProductCreatedData {
            product_id: product_id.clone(),
            title: format!("Product {i}"),
            price: Money::from_cents(1000),
            quantity: 5,
        });

        let mut events = vec![make_envelope(&product_id, 1, &created)];
        for version in 2..=3 {
            let reserved = ProductEvent::ProductReserved(ProductReservedData {
                product_id: product_id.clone(),
                order_id: AggregateId::new(),
                user_id: "U-1".to_string(),
                quantity: 1,
            });
            events.push(make_envelope(&product_id, version, &reserved));
        }
        store.append(events, AppendOptions::new()).await.unwrap();
    }
}

fn bench_catch_up(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();

    rt.block_on(populate_store(&store, 1000));

    c.bench_function("projections/catch_up_3000_events", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut processor = ProjectionProcessor::new(store.clone());
                processor.register(Arc::new(ProductsView::new()));
                processor.run_catch_up().await.unwrap();
            });
        });
    });
}

fn bench_process_single_event(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let view = ProductsView::new();

    c.bench_function("projections/process_single_event", |b| {
        b.iter(|| {
            rt.block_on(async {
                let product_id = AggregateId::new();
                let created = ProductEvent::ProductCreated(ProductCreatedData {
                    product_id: product_id.clone(),
                    title: "Keyboard".to_string(),
                    price: Money::from_cents(1000),
                    quantity: 5,
                });
                view.handle(&make_envelope(&product_id, 1, &created))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_query_all_products(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    let view = ProductsView::new();

    rt.block_on(async {
        populate_store(&store, 100).await;
        let mut processor = ProjectionProcessor::new(store);
        processor.register(Arc::new(view.clone()));
        processor.run_catch_up().await.unwrap();
    });

    c.bench_function("projections/query_all_100_products", |b| {
        b.iter(|| rt.block_on(view.all()));
    });
}

fn bench_reset(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();

    rt.block_on(populate_store(&store, 100));

    let mut processor = ProjectionProcessor::new(store);
    processor.register(Arc::new(ProductsView::new()));

    c.bench_function("projections/reset_300_events", |b| {
        b.iter(|| rt.block_on(processor.reset("products")).unwrap());
    });
}

criterion_group!(
    benches,
    bench_catch_up,
    bench_process_single_event,
    bench_query_all_products,
    bench_reset,
);
criterion_main!(benches);
