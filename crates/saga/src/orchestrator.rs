//! Order fulfillment saga orchestration.
//!
//! The orchestrator subscribes to the event bus, turns the facts it cares
//! about into [`SagaInput`]s and queues them on a partition keyed by order
//! id, so each saga instance handles one input at a time. Fired payment
//! deadlines and command retries are fed into the same queues.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::AggregateId;
use domain::order::{OrderApprovedData, OrderCreatedData, OrderRejectedData};
use domain::payment::PaymentProcessedData;
use domain::product::{ProductReservationCancelledData, ProductReservedData};
use domain::{
    Aggregate, ApproveOrder, CancelProductReservation, Order, OrderEvent, OrderStatus, Payment,
    PaymentEvent, ProcessPayment, Product, ProductEvent, RejectOrder, ReserveProduct,
};
use event_store::EventEnvelope;
use messaging::{
    BusError, Command, CommandGateway, EventSubscriber, PartitionedExecutor, SubscriberError,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::deadline::{DeadlineScheduler, DeadlineToken, FiredDeadline};
use crate::error::{Result, SagaError};
use crate::instance::OrderSaga;
use crate::notifier::{CompletionNotifier, OrderSummary};
use crate::order_fulfillment::{
    PAYMENT_DEADLINE, PAYMENT_DEADLINE_SECS, REASON_NO_PAYMENT_DETAILS, REASON_ORDER_REJECTED,
    REASON_PAYMENT_FAILED, REASON_PAYMENT_TIMEOUT, RETRY_DEADLINE, SAGA_TYPE,
};
use crate::services::PaymentDetailsLookup;
use crate::state::SagaState;
use crate::store::SagaStore;

/// Saga tuning.
#[derive(Debug, Clone)]
pub struct SagaConfig {
    /// Number of saga partition workers.
    pub partitions: usize,

    /// How long a saga waits for `PaymentProcessed` once payment was issued.
    pub payment_deadline: Duration,

    /// Upper bound on the payment details lookup.
    pub lookup_timeout: Duration,

    /// Delay before a command that could not be delivered is issued again.
    pub retry_delay: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            partitions: 8,
            payment_deadline: Duration::from_secs(PAYMENT_DEADLINE_SECS),
            lookup_timeout: Duration::from_secs(5),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Everything a saga instance acts through.
#[derive(Clone)]
pub struct SagaContext {
    pub commands: Arc<dyn CommandGateway>,
    pub users: Arc<dyn PaymentDetailsLookup>,
    pub deadlines: Arc<dyn DeadlineScheduler<SagaDeadline>>,
    pub notifier: CompletionNotifier,
}

/// What a saga deadline carries back when it fires.
#[derive(Debug, Clone)]
pub enum SagaDeadline {
    /// The payment deadline, guarding this reservation.
    Payment(ProductReservedData),

    /// A command that did not get through, to be issued again.
    Retry {
        order_id: AggregateId,
        command: Command,
    },
}

impl SagaDeadline {
    pub fn order_id(&self) -> &AggregateId {
        match self {
            SagaDeadline::Payment(reserved) => &reserved.order_id,
            SagaDeadline::Retry { order_id, .. } => order_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SagaDeadline::Payment(_) => PAYMENT_DEADLINE,
            SagaDeadline::Retry { .. } => RETRY_DEADLINE,
        }
    }
}

/// A fact the saga reacts to.
#[derive(Debug, Clone)]
pub enum SagaEvent {
    OrderCreated(OrderCreatedData),
    ProductReserved(ProductReservedData),
    PaymentProcessed(PaymentProcessedData),
    ProductReservationCancelled(ProductReservationCancelledData),
    OrderApproved(OrderApprovedData),
    OrderRejected(OrderRejectedData),
}

impl SagaEvent {
    /// Decodes an envelope. Returns `None` for facts the saga ignores.
    pub fn from_envelope(
        envelope: &EventEnvelope,
    ) -> std::result::Result<Option<Self>, serde_json::Error> {
        let aggregate_type = envelope.aggregate_type.as_str();

        let event = if aggregate_type == Order::aggregate_type() {
            match envelope.decode::<OrderEvent>()? {
                OrderEvent::OrderCreated(data) => SagaEvent::OrderCreated(data),
                OrderEvent::OrderApproved(data) => SagaEvent::OrderApproved(data),
                OrderEvent::OrderRejected(data) => SagaEvent::OrderRejected(data),
            }
        } else if aggregate_type == Product::aggregate_type() {
            match envelope.decode::<ProductEvent>()? {
                ProductEvent::ProductCreated(_) => return Ok(None),
                ProductEvent::ProductReserved(data) => SagaEvent::ProductReserved(data),
                ProductEvent::ProductReservationCancelled(data) => {
                    SagaEvent::ProductReservationCancelled(data)
                }
            }
        } else if aggregate_type == Payment::aggregate_type() {
            match envelope.decode::<PaymentEvent>()? {
                PaymentEvent::PaymentProcessed(data) => SagaEvent::PaymentProcessed(data),
            }
        } else {
            return Ok(None);
        };

        Ok(Some(event))
    }

    /// The order this fact is associated with.
    pub fn order_id(&self) -> &AggregateId {
        match self {
            SagaEvent::OrderCreated(data) => &data.order_id,
            SagaEvent::ProductReserved(data) => &data.order_id,
            SagaEvent::PaymentProcessed(data) => &data.order_id,
            SagaEvent::ProductReservationCancelled(data) => &data.order_id,
            SagaEvent::OrderApproved(data) => &data.order_id,
            SagaEvent::OrderRejected(data) => &data.order_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::OrderCreated(_) => "OrderCreated",
            SagaEvent::ProductReserved(_) => "ProductReserved",
            SagaEvent::PaymentProcessed(_) => "PaymentProcessed",
            SagaEvent::ProductReservationCancelled(_) => "ProductReservationCancelled",
            SagaEvent::OrderApproved(_) => "OrderApproved",
            SagaEvent::OrderRejected(_) => "OrderRejected",
        }
    }
}

/// One unit of work for a saga instance.
#[derive(Debug, Clone)]
pub enum SagaInput {
    Event(SagaEvent),

    /// A payment deadline ran out or a retry is due.
    Deadline(FiredDeadline<SagaDeadline>),
}

impl SagaInput {
    pub fn order_id(&self) -> &AggregateId {
        match self {
            SagaInput::Event(event) => event.order_id(),
            SagaInput::Deadline(fired) => fired.payload.order_id(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SagaInput::Event(event) => event.event_type(),
            SagaInput::Deadline(fired) => fired.payload.name(),
        }
    }
}

struct Inner {
    store: Arc<dyn SagaStore>,
    context: SagaContext,
    config: SagaConfig,
    executor: PartitionedExecutor,
}

/// Drives one [`OrderSaga`] per order.
///
/// ```text
/// OrderCreated                 ─► ReserveProduct        (RejectOrder on failure)
/// ProductReserved              ─► fetch payment details, schedule deadline,
///                                 ProcessPayment        (release on failure)
/// PaymentProcessed             ─► cancel deadline, ApproveOrder
/// deadline fired               ─► release reservation ("Payment timeout")
/// ProductReservationCancelled  ─► RejectOrder(reason)
/// OrderApproved / OrderRejected ─► notify, end
/// ProductReserved after rejection ─► release reservation
/// ```
///
/// Once stock is reserved, the order is only rejected after
/// `ProductReservationCancelled` has been observed. A command the saga
/// depends on that fails for any reason other than validation is issued
/// again after [`SagaConfig::retry_delay`], until it gets through or the
/// saga ends.
#[derive(Clone)]
pub struct SagaOrchestrator {
    inner: Arc<Inner>,
}

impl SagaOrchestrator {
    /// Builds the orchestrator and spawns its workers on the current runtime.
    pub fn new(store: Arc<dyn SagaStore>, context: SagaContext, config: SagaConfig) -> Self {
        let executor = PartitionedExecutor::new("saga", config.partitions);
        Self {
            inner: Arc::new(Inner {
                store,
                context,
                config,
                executor,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn SagaStore> {
        &self.inner.store
    }

    pub fn notifier(&self) -> &CompletionNotifier {
        &self.inner.context.notifier
    }

    pub fn config(&self) -> &SagaConfig {
        &self.inner.config
    }

    /// Queues an input behind every earlier input for the same order.
    pub fn submit(&self, input: SagaInput) -> Result<()> {
        let order_id = input.order_id().clone();
        let inner = Arc::clone(&self.inner);

        self.inner
            .executor
            .submit(&order_id, async move {
                let kind = input.kind();
                let order_id = input.order_id().clone();
                if let Err(error) = inner.process(input).await {
                    tracing::error!(%order_id, input = kind, %error, "saga step failed");
                }
            })
            .map_err(|_| SagaError::QueueClosed { order_id })
    }

    /// Forwards fired deadlines into the saga queues until the scheduler is
    /// dropped.
    pub fn spawn_deadline_pump(
        &self,
        mut fired: mpsc::UnboundedReceiver<FiredDeadline<SagaDeadline>>,
    ) -> JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            while let Some(deadline) = fired.recv().await {
                if let Err(error) = orchestrator.submit(SagaInput::Deadline(deadline)) {
                    tracing::error!(%error, "fired deadline not queued");
                }
            }
        })
    }
}

#[async_trait]
impl EventSubscriber for SagaOrchestrator {
    fn name(&self) -> &str {
        SAGA_TYPE
    }

    async fn handle(&self, envelope: &EventEnvelope) -> std::result::Result<(), SubscriberError> {
        if let Some(event) = SagaEvent::from_envelope(envelope)? {
            self.submit(SagaInput::Event(event))?;
        }
        Ok(())
    }
}

impl Inner {
    #[tracing::instrument(
        skip(self, input),
        fields(saga_type = SAGA_TYPE, order_id = %input.order_id(), input = input.kind())
    )]
    async fn process(&self, input: SagaInput) -> Result<()> {
        let Some(mut saga) = self.store.load(input.order_id()).await? else {
            return match input {
                SagaInput::Event(SagaEvent::OrderCreated(data)) => self.start(data).await,
                _ => {
                    tracing::debug!("no saga for order, ignoring");
                    Ok(())
                }
            };
        };

        if saga.is_ended() {
            return self.on_ended(&mut saga, input).await;
        }

        match input {
            SagaInput::Event(SagaEvent::OrderCreated(_)) => {
                tracing::debug!("saga already started, ignoring");
                Ok(())
            }
            SagaInput::Event(SagaEvent::ProductReserved(data)) => {
                self.on_product_reserved(&mut saga, data).await
            }
            SagaInput::Event(SagaEvent::PaymentProcessed(_)) => {
                self.on_payment_processed(&mut saga).await
            }
            SagaInput::Event(SagaEvent::ProductReservationCancelled(data)) => {
                self.on_reservation_cancelled(&mut saga, data).await
            }
            SagaInput::Event(SagaEvent::OrderApproved(_)) => {
                self.finish(&mut saga, SagaState::Approved, String::new())
                    .await
            }
            SagaInput::Event(SagaEvent::OrderRejected(data)) => {
                self.finish(&mut saga, SagaState::Rejected, data.reason)
                    .await
            }
            SagaInput::Deadline(fired) => self.on_deadline(&mut saga, fired).await,
        }
    }

    /// Ended sagas only release reservations that committed too late and
    /// finish retries they issued.
    async fn on_ended(&self, saga: &mut OrderSaga, input: SagaInput) -> Result<()> {
        match input {
            SagaInput::Event(SagaEvent::ProductReserved(reserved))
                if saga.state() == SagaState::Rejected =>
            {
                self.release_late_reservation(saga, &reserved).await
            }
            SagaInput::Deadline(FiredDeadline {
                token,
                payload: SagaDeadline::Retry { command, .. },
                ..
            }) => self.on_retry(saga, &token, command).await,
            _ => {
                tracing::debug!(state = %saga.state(), "saga already ended, ignoring");
                Ok(())
            }
        }
    }

    async fn start(&self, order: OrderCreatedData) -> Result<()> {
        let mut saga = OrderSaga::start(order.order_id.clone());
        self.store.save(&saga).await?;

        metrics::counter!("saga_started_total", "saga_type" => SAGA_TYPE).increment(1);
        tracing::info!(
            product_id = %order.product_id,
            quantity = order.quantity,
            "saga started, reserving stock"
        );

        let reserve = ReserveProduct::new(
            order.product_id,
            order.order_id.clone(),
            order.user_id,
            order.quantity,
        );
        if let Err(error) = self.context.commands.dispatch(reserve.into()).await {
            tracing::warn!(%error, "reservation failed, rejecting order");
            let reason = error.to_string();
            saga.begin_compensation(&reason);
            self.store.save(&saga).await?;
            self.issue(&mut saga, RejectOrder::new(order.order_id, reason).into())
                .await?;
        }
        Ok(())
    }

    async fn on_product_reserved(
        &self,
        saga: &mut OrderSaga,
        reserved: ProductReservedData,
    ) -> Result<()> {
        if saga.state() != SagaState::AwaitingReservation {
            tracing::debug!(state = %saga.state(), "reservation already handled, ignoring");
            return Ok(());
        }
        if saga.is_compensating() {
            // The reservation committed after its dispatch had already failed.
            return self.release_late_reservation(saga, &reserved).await;
        }

        saga.reservation_confirmed();
        self.store.save(saga).await?;
        tracing::info!(product_id = %reserved.product_id, "stock reserved, fetching payment details");

        let lookup = tokio::time::timeout(
            self.config.lookup_timeout,
            self.context.users.fetch_payment_details(&reserved.user_id),
        )
        .await;

        let user = match lookup {
            Ok(Ok(Some(user))) => user,
            Ok(Ok(None)) => {
                return self
                    .release_reservation(saga, &reserved, REASON_NO_PAYMENT_DETAILS)
                    .await;
            }
            Ok(Err(error)) => {
                return self
                    .release_reservation(saga, &reserved, &error.to_string())
                    .await;
            }
            Err(_) => {
                let reason = format!(
                    "Payment details lookup timed out after {:?}",
                    self.config.lookup_timeout
                );
                return self.release_reservation(saga, &reserved, &reason).await;
            }
        };

        self.cancel_deadline(saga);
        let token = self.context.deadlines.schedule(
            self.config.payment_deadline,
            PAYMENT_DEADLINE,
            SagaDeadline::Payment(reserved.clone()),
        );
        saga.set_deadline(token);
        self.store.save(saga).await?;

        let payment_id = AggregateId::new();
        let process =
            ProcessPayment::new(payment_id, saga.order_id().clone(), user.payment_details);

        match self.context.commands.dispatch(process.into()).await {
            Ok(response) => match response.result_id() {
                Some(payment_id) => {
                    tracing::info!(%payment_id, "payment submitted");
                    Ok(())
                }
                None => {
                    self.release_reservation(saga, &reserved, REASON_PAYMENT_FAILED)
                        .await
                }
            },
            Err(error) => {
                self.release_reservation(saga, &reserved, &error.to_string())
                    .await
            }
        }
    }

    async fn on_payment_processed(&self, saga: &mut OrderSaga) -> Result<()> {
        if saga.payment_processed() {
            tracing::debug!("payment already handled, ignoring");
            return Ok(());
        }
        if saga.is_compensating() {
            tracing::warn!(
                reason = saga.compensation_reason(),
                "payment processed after compensation started, ignoring"
            );
            return Ok(());
        }

        saga.mark_payment_processed();
        self.cancel_deadline(saga);
        self.store.save(saga).await?;

        tracing::info!("payment processed, approving order");
        let order_id = saga.order_id().clone();
        self.issue(saga, ApproveOrder::new(order_id).into()).await
    }

    async fn on_reservation_cancelled(
        &self,
        saga: &mut OrderSaga,
        cancelled: ProductReservationCancelledData,
    ) -> Result<()> {
        tracing::info!(reason = %cancelled.reason, "reservation released, rejecting order");
        let order_id = saga.order_id().clone();
        self.issue(saga, RejectOrder::new(order_id, cancelled.reason).into())
            .await
    }

    async fn on_deadline(
        &self,
        saga: &mut OrderSaga,
        fired: FiredDeadline<SagaDeadline>,
    ) -> Result<()> {
        let reserved = match fired.payload {
            SagaDeadline::Payment(reserved) => reserved,
            SagaDeadline::Retry { command, .. } => {
                return self.on_retry(saga, &fired.token, command).await;
            }
        };

        if saga.deadline() != Some(&fired.token) {
            tracing::debug!(token = %fired.token, "stale deadline, ignoring");
            return Ok(());
        }

        saga.take_deadline();
        if saga.payment_processed() {
            self.store.save(saga).await?;
            return Ok(());
        }

        self.release_reservation(saga, &reserved, REASON_PAYMENT_TIMEOUT)
            .await
    }

    async fn on_retry(
        &self,
        saga: &mut OrderSaga,
        token: &DeadlineToken,
        command: Command,
    ) -> Result<()> {
        if !saga.take_retry(token) {
            tracing::debug!(%token, "stale retry, ignoring");
            return Ok(());
        }
        self.store.save(saga).await?;

        tracing::info!(command = command.command_type(), "retrying command");
        self.issue(saga, command).await
    }

    /// Releases stock reserved for an order that is already being rejected.
    async fn release_late_reservation(
        &self,
        saga: &mut OrderSaga,
        reserved: &ProductReservedData,
    ) -> Result<()> {
        let reason = saga
            .compensation_reason()
            .unwrap_or(REASON_ORDER_REJECTED)
            .to_string();
        tracing::warn!(
            product_id = %reserved.product_id,
            quantity = reserved.quantity,
            "reservation arrived for a rejected order, releasing"
        );

        let cancel = CancelProductReservation::new(
            reserved.product_id.clone(),
            reserved.order_id.clone(),
            reserved.user_id.clone(),
            reserved.quantity,
            reason,
        );
        self.issue(saga, cancel.into()).await
    }

    /// Issues `CancelProductReservation` for the order's reservation. Only
    /// the first release of a saga is issued; an undelivered one is retried.
    async fn release_reservation(
        &self,
        saga: &mut OrderSaga,
        reserved: &ProductReservedData,
        reason: &str,
    ) -> Result<()> {
        if saga.is_compensating() {
            tracing::debug!(reason, "reservation release already issued, ignoring");
            return Ok(());
        }

        self.cancel_deadline(saga);
        saga.begin_compensation(reason);
        self.store.save(saga).await?;

        metrics::counter!("saga_compensations_total", "reason" => reason.to_string())
            .increment(1);
        tracing::warn!(
            product_id = %reserved.product_id,
            quantity = reserved.quantity,
            reason,
            "releasing reservation"
        );

        let cancel = CancelProductReservation::new(
            reserved.product_id.clone(),
            reserved.order_id.clone(),
            reserved.user_id.clone(),
            reserved.quantity,
            reason,
        );
        self.issue(saga, cancel.into()).await
    }

    async fn finish(&self, saga: &mut OrderSaga, state: SagaState, message: String) -> Result<()> {
        self.cancel_deadline(saga);
        for token in saga.take_retries() {
            self.context.deadlines.cancel(&token, RETRY_DEADLINE);
        }
        saga.end(state);
        self.store.save(saga).await?;

        let order_status = match state {
            SagaState::Approved => OrderStatus::Approved,
            _ => OrderStatus::Rejected,
        };

        let elapsed = (Utc::now() - saga.started_at())
            .to_std()
            .unwrap_or_default();
        metrics::histogram!("saga_duration_seconds").record(elapsed.as_secs_f64());
        metrics::counter!("saga_completed_total", "status" => order_status.as_str()).increment(1);
        tracing::info!(status = %order_status, message = %message, "saga ended");

        self.context.notifier.notify(OrderSummary {
            order_id: saga.order_id().clone(),
            order_status,
            message,
        });
        Ok(())
    }

    fn cancel_deadline(&self, saga: &mut OrderSaga) {
        if let Some(token) = saga.take_deadline() {
            if !self.context.deadlines.cancel(&token, PAYMENT_DEADLINE) {
                tracing::debug!(%token, "deadline already fired");
            }
        }
    }

    /// Dispatches a command the saga cannot do without. Rejections are
    /// returned; any other failure schedules the command again.
    async fn issue(&self, saga: &mut OrderSaga, command: Command) -> Result<()> {
        let command_type = command.command_type();
        let error = match self.context.commands.dispatch(command.clone()).await {
            Ok(_) => return Ok(()),
            Err(error) => error,
        };

        if !is_retryable(&error) {
            return Err(SagaError::Dispatch {
                command: command_type,
                source: error,
            });
        }

        metrics::counter!("saga_command_retries_total", "command" => command_type).increment(1);
        tracing::warn!(
            command = command_type,
            %error,
            delay = ?self.config.retry_delay,
            "command not delivered, retrying later"
        );

        let token = self.context.deadlines.schedule(
            self.config.retry_delay,
            RETRY_DEADLINE,
            SagaDeadline::Retry {
                order_id: saga.order_id().clone(),
                command,
            },
        );
        saga.add_retry(token);
        self.store.save(saga).await
    }
}

/// Rejected commands and broken histories will fail the same way again.
fn is_retryable(error: &BusError) -> bool {
    match error {
        BusError::Domain(domain) => !(domain.is_validation() || domain.is_fatal()),
        BusError::Timeout { .. } | BusError::Closed { .. } | BusError::Dropped { .. } => true,
    }
}
