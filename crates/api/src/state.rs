//! Process wiring shared by `main` and the integration tests.

use std::sync::Arc;

use domain::InMemoryProductLookup;
use event_store::EventStore;
use messaging::{CommandBus, EventBus};
use projections::{OrdersView, PaymentsView, ProductsView, ProjectionProcessor};
use saga::{
    CompletionNotifier, InMemoryDeadlineScheduler, InMemorySagaStore, InMemoryUserDirectory,
    SagaContext, SagaDeadline, SagaOrchestrator,
};

use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore> {
    pub commands: Arc<CommandBus<S>>,
    pub orchestrator: SagaOrchestrator,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
    pub orders: OrdersView,
    pub products: ProductsView,
    pub payments: PaymentsView,
    pub users: InMemoryUserDirectory,
    pub config: Config,
}

/// Wires the buses, the saga and the read models over `event_store`.
///
/// Must run inside a Tokio runtime: the bus, saga and deadline workers are
/// spawned here. Projections subscribe ahead of the saga, so the read models
/// already reflect an order's terminal event when its summary is published.
pub fn create_default_state<S: EventStore + Clone + 'static>(
    event_store: S,
    config: Config,
) -> Arc<AppState<S>> {
    let events = EventBus::new();

    let orders = OrdersView::new();
    let products = ProductsView::new();
    let payments = PaymentsView::new();

    let mut processor = ProjectionProcessor::new(event_store.clone());
    processor.register(Arc::new(orders.clone()));
    processor.register(Arc::new(products.clone()));
    processor.register(Arc::new(payments.clone()));
    let processor = Arc::new(processor);
    events.subscribe(processor.clone());

    let commands = Arc::new(CommandBus::new(
        event_store,
        Arc::new(InMemoryProductLookup::new()),
        events.clone(),
        config.bus_config(),
    ));

    let users = InMemoryUserDirectory::new();
    let (scheduler, fired) = InMemoryDeadlineScheduler::<SagaDeadline>::new();
    let context = SagaContext {
        commands: commands.clone(),
        users: Arc::new(users.clone()),
        deadlines: Arc::new(scheduler),
        notifier: CompletionNotifier::new(),
    };
    let orchestrator = SagaOrchestrator::new(
        Arc::new(InMemorySagaStore::new()),
        context,
        config.saga_config(),
    );
    orchestrator.spawn_deadline_pump(fired);
    events.subscribe(Arc::new(orchestrator.clone()));

    tracing::info!(
        bus_partitions = config.bus_partitions,
        saga_partitions = config.saga_partitions,
        payment_deadline = ?config.payment_deadline,
        "application wired"
    );

    Arc::new(AppState {
        commands,
        orchestrator,
        projection_processor: processor,
        orders,
        products,
        payments,
        users,
        config,
    })
}
