//! Command routing.
//!
//! Every command names its target aggregate. The bus queues it on the
//! partition owning that aggregate, runs it through the matching service,
//! publishes whatever was committed and reports the outcome back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    ApproveOrder, CancelProductReservation, Command as _, CommandResult, CreateOrder,
    CreateProduct, DomainError, OrderService, PaymentService, ProcessPayment, ProductLookup,
    ProductService, RejectOrder, ReserveProduct, RetryPolicy,
};
use event_store::{EventEnvelope, EventStore, Version};
use tokio::sync::oneshot;

use crate::error::{BusError, Result};
use crate::event_bus::EventBus;
use crate::partition::PartitionedExecutor;

/// Every command the system accepts.
#[derive(Debug, Clone)]
pub enum Command {
    CreateOrder(CreateOrder),
    ApproveOrder(ApproveOrder),
    RejectOrder(RejectOrder),
    CreateProduct(CreateProduct),
    ReserveProduct(ReserveProduct),
    CancelProductReservation(CancelProductReservation),
    ProcessPayment(ProcessPayment),
}

impl Command {
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::CreateOrder(c) => c.command_type(),
            Command::ApproveOrder(c) => c.command_type(),
            Command::RejectOrder(c) => c.command_type(),
            Command::CreateProduct(c) => c.command_type(),
            Command::ReserveProduct(c) => c.command_type(),
            Command::CancelProductReservation(c) => c.command_type(),
            Command::ProcessPayment(c) => c.command_type(),
        }
    }

    /// Returns the identifier of the aggregate the command is addressed to.
    pub fn target_id(&self) -> &AggregateId {
        match self {
            Command::CreateOrder(c) => c.aggregate_id(),
            Command::ApproveOrder(c) => c.aggregate_id(),
            Command::RejectOrder(c) => c.aggregate_id(),
            Command::CreateProduct(c) => c.aggregate_id(),
            Command::ReserveProduct(c) => c.aggregate_id(),
            Command::CancelProductReservation(c) => c.aggregate_id(),
            Command::ProcessPayment(c) => c.aggregate_id(),
        }
    }
}

macro_rules! impl_from_command {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Command {
                fn from(cmd: $variant) -> Self {
                    Command::$variant(cmd)
                }
            }
        )*
    };
}

impl_from_command!(
    CreateOrder,
    ApproveOrder,
    RejectOrder,
    CreateProduct,
    ReserveProduct,
    CancelProductReservation,
    ProcessPayment,
);

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponse {
    /// The aggregate the command ran against.
    pub aggregate_id: AggregateId,

    /// Aggregate version after the command.
    pub version: Version,

    /// Number of events committed. Zero when the command was already
    /// satisfied.
    pub committed: usize,
}

impl CommandResponse {
    fn from_result<A: domain::Aggregate>(aggregate_id: AggregateId, result: &CommandResult<A>) -> Self {
        Self {
            aggregate_id,
            version: result.new_version,
            committed: result.envelopes.len(),
        }
    }

    /// Returns the identifier of what the command created, if it created
    /// anything. For `ProcessPayment` this is the payment id.
    pub fn result_id(&self) -> Option<&AggregateId> {
        (self.committed > 0).then_some(&self.aggregate_id)
    }
}

/// The submission surface used by the saga and the HTTP layer.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Dispatches a command and waits for its outcome.
    async fn dispatch(&self, command: Command) -> Result<CommandResponse>;
}

/// Command bus tuning.
#[derive(Debug, Clone)]
pub struct CommandBusConfig {
    /// Number of partition workers.
    pub partitions: usize,

    /// How long `dispatch` waits for an answer.
    pub dispatch_timeout: Duration,

    pub retry: RetryPolicy,
}

impl Default for CommandBusConfig {
    fn default() -> Self {
        Self {
            partitions: 8,
            dispatch_timeout: Duration::from_millis(5000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Services the routing table dispatches to.
struct Router<S: EventStore> {
    orders: OrderService<S>,
    products: ProductService<S>,
    payments: PaymentService<S>,
    events: EventBus,
}

impl<S: EventStore> Router<S> {
    async fn route(&self, command: Command) -> std::result::Result<CommandResponse, DomainError> {
        let id = command.target_id().clone();

        let (response, envelopes) = match command {
            Command::CreateOrder(cmd) => into_parts(id, self.orders.create_order(cmd).await?),
            Command::ApproveOrder(cmd) => into_parts(id, self.orders.approve_order(cmd).await?),
            Command::RejectOrder(cmd) => into_parts(id, self.orders.reject_order(cmd).await?),
            Command::CreateProduct(cmd) => {
                into_parts(id, self.products.create_product(cmd).await?)
            }
            Command::ReserveProduct(cmd) => {
                into_parts(id, self.products.reserve_product(cmd).await?)
            }
            Command::CancelProductReservation(cmd) => {
                into_parts(id, self.products.cancel_reservation(cmd).await?)
            }
            Command::ProcessPayment(cmd) => {
                into_parts(id, self.payments.process_payment(cmd).await?)
            }
        };

        self.events.publish(&envelopes).await;
        Ok(response)
    }
}

fn into_parts<A: domain::Aggregate>(
    id: AggregateId,
    result: CommandResult<A>,
) -> (CommandResponse, Vec<EventEnvelope>) {
    (CommandResponse::from_result(id, &result), result.envelopes)
}

/// Routes commands to the aggregate services.
///
/// Commands for one aggregate are serialized on a single partition, so two
/// commands for the same identifier are never validated against the same
/// state. Committed events are published to the [`EventBus`] from that same
/// partition, in commit order.
pub struct CommandBus<S: EventStore> {
    router: Arc<Router<S>>,
    executor: PartitionedExecutor,
    config: CommandBusConfig,
}

impl<S> CommandBus<S>
where
    S: EventStore + Clone + 'static,
{
    /// Builds the bus and spawns its workers on the current runtime.
    pub fn new(
        store: S,
        lookup: Arc<dyn ProductLookup>,
        events: EventBus,
        config: CommandBusConfig,
    ) -> Self {
        let router = Router {
            orders: OrderService::with_retry_policy(store.clone(), config.retry),
            products: ProductService::with_options(store.clone(), lookup, config.retry),
            payments: PaymentService::with_retry_policy(store, config.retry),
            events,
        };

        Self {
            router: Arc::new(router),
            executor: PartitionedExecutor::new("command-bus", config.partitions),
            config,
        }
    }

    pub fn config(&self) -> &CommandBusConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.router.events
    }

    pub fn orders(&self) -> &OrderService<S> {
        &self.router.orders
    }

    pub fn products(&self) -> &ProductService<S> {
        &self.router.products
    }

    pub fn payments(&self) -> &PaymentService<S> {
        &self.router.payments
    }

    fn submit(
        &self,
        command: Command,
        reply: oneshot::Sender<std::result::Result<CommandResponse, DomainError>>,
    ) -> Result<()> {
        let key = command.target_id().clone();
        let router = Arc::clone(&self.router);

        self.executor.submit(&key, async move {
            let command_type = command.command_type();
            let target = command.target_id().clone();
            let result = router.route(command).await;

            let outcome = match &result {
                Ok(_) => "accepted",
                Err(e) if e.is_validation() => "rejected",
                Err(_) => "failed",
            };
            metrics::counter!(
                "commands_dispatched_total",
                "command" => command_type,
                "outcome" => outcome
            )
            .increment(1);

            if let Err(error) = &result {
                tracing::debug!(command = command_type, aggregate_id = %target, %error, "command failed");
            }
            // The caller may have timed out and gone away.
            let _ = reply.send(result);
        })
    }
}

#[async_trait]
impl<S> CommandGateway for CommandBus<S>
where
    S: EventStore + Clone + 'static,
{
    #[tracing::instrument(skip(self, command), fields(command = command.command_type(), aggregate_id = %command.target_id()))]
    async fn dispatch(&self, command: Command) -> Result<CommandResponse> {
        let command_type = command.command_type();
        let (tx, rx) = oneshot::channel();
        self.submit(command, tx)?;

        match tokio::time::timeout(self.config.dispatch_timeout, rx).await {
            Ok(Ok(result)) => result.map_err(BusError::from),
            Ok(Err(_)) => Err(BusError::Dropped {
                command: command_type,
            }),
            Err(_) => Err(BusError::Timeout {
                command: command_type,
                timeout: self.config.dispatch_timeout,
            }),
        }
    }
}
