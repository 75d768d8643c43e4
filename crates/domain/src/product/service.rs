//! Product service.

use std::sync::Arc;

use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult, RetryPolicy};
use crate::error::DomainError;

use super::{
    CancelProductReservation, CreateProduct, InMemoryProductLookup, Product, ProductError,
    ProductLookup, ProductLookupEntry, ReserveProduct,
};

/// Service for managing products and their stock.
pub struct ProductService<S: EventStore> {
    handler: CommandHandler<S, Product>,
    lookup: Arc<dyn ProductLookup>,
}

impl<S: EventStore> ProductService<S> {
    /// Creates a product service with an in-memory uniqueness lookup.
    pub fn new(store: S) -> Self {
        Self::with_lookup(store, Arc::new(InMemoryProductLookup::new()))
    }

    pub fn with_lookup(store: S, lookup: Arc<dyn ProductLookup>) -> Self {
        Self::with_options(store, lookup, RetryPolicy::default())
    }

    pub fn with_options(store: S, lookup: Arc<dyn ProductLookup>, retry: RetryPolicy) -> Self {
        Self {
            handler: CommandHandler::with_retry_policy(store, retry),
            lookup,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Product> {
        &self.handler
    }

    pub fn lookup(&self) -> &Arc<dyn ProductLookup> {
        &self.lookup
    }

    /// Creates a product after checking that neither its identifier nor its
    /// title is taken.
    ///
    /// The lookup entry is claimed before the append and released again if
    /// the append fails, so two concurrent creations with the same title
    /// cannot both commit.
    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id))]
    pub async fn create_product(
        &self,
        cmd: CreateProduct,
    ) -> Result<CommandResult<Product>, DomainError> {
        let already_exists = || ProductError::AlreadyExists {
            product_id: cmd.product_id.clone(),
            title: cmd.title.clone(),
        };

        if self.lookup.find(&cmd.product_id, &cmd.title).is_some() {
            return Err(already_exists().into());
        }

        let claimed = self.lookup.claim(ProductLookupEntry {
            product_id: cmd.product_id.clone(),
            title: cmd.title.clone(),
        });
        if !claimed {
            return Err(already_exists().into());
        }

        let result = self
            .handler
            .execute_with_snapshot(&cmd.product_id, |product| {
                product.create(&cmd.product_id, &cmd.title, cmd.price, cmd.quantity)
            })
            .await;

        if result.is_err() {
            self.lookup.release(&cmd.product_id);
        }
        result
    }

    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id, order_id = %cmd.order_id))]
    pub async fn reserve_product(
        &self,
        cmd: ReserveProduct,
    ) -> Result<CommandResult<Product>, DomainError> {
        self.handler
            .execute_with_snapshot(&cmd.product_id, |product| {
                product.reserve(&cmd.product_id, &cmd.order_id, &cmd.user_id, cmd.quantity)
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(product_id = %cmd.product_id, order_id = %cmd.order_id))]
    pub async fn cancel_reservation(
        &self,
        cmd: CancelProductReservation,
    ) -> Result<CommandResult<Product>, DomainError> {
        self.handler
            .execute_with_snapshot(&cmd.product_id, |product| {
                product.cancel_reservation(&cmd.product_id, &cmd.order_id, &cmd.user_id, &cmd.reason)
            })
            .await
    }

    /// Loads a product by ID. Returns None if the product doesn't exist.
    pub async fn get_product(
        &self,
        product_id: &AggregateId,
    ) -> Result<Option<Product>, DomainError> {
        self.handler.load_existing(product_id).await
    }
}
