//! Product aggregate implementation.

use std::collections::BTreeMap;

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::value_objects::Money;

use super::{
    ProductError, ProductEvent,
    events::{ProductCreatedData, ProductReservationCancelledData, ProductReservedData},
};

/// Product aggregate root: a catalogue entry with reservable stock.
///
/// Stock only changes through reservation and cancellation events. The
/// non-negative stock rule is enforced when a reservation is requested;
/// applying an already-committed reservation never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    title: String,
    price: Money,

    /// Quantity currently available for new reservations.
    quantity: u32,

    /// Outstanding reservations keyed by order.
    reservations: BTreeMap<AggregateId, u32>,
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> Option<&AggregateId> {
        self.id.as_ref()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProductEvent::ProductCreated(data) => {
                self.id = Some(data.product_id);
                self.title = data.title;
                self.price = data.price;
                self.quantity = data.quantity;
            }
            ProductEvent::ProductReserved(data) => {
                self.quantity = self.quantity.saturating_sub(data.quantity);
                *self.reservations.entry(data.order_id).or_default() += data.quantity;
            }
            ProductEvent::ProductReservationCancelled(data) => {
                self.quantity += data.quantity;
                self.reservations.remove(&data.order_id);
            }
        }
    }
}

impl SnapshotCapable for Product {
    fn snapshot_interval() -> usize {
        3
    }
}

// Query methods
impl Product {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn price(&self) -> Money {
        self.price
    }

    /// Returns the quantity available for new reservations.
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Returns the quantity reserved for an order, if any.
    pub fn reserved_for(&self, order_id: &AggregateId) -> Option<u32> {
        self.reservations.get(order_id).copied()
    }

    pub fn outstanding_reservations(&self) -> usize {
        self.reservations.len()
    }
}

// Command methods (return events)
impl Product {
    /// Adds the product to the catalogue.
    pub fn create(
        &self,
        product_id: &AggregateId,
        title: &str,
        price: Money,
        quantity: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        if self.exists() {
            return Err(ProductError::AlreadyCreated {
                product_id: product_id.clone(),
            });
        }
        if title.trim().is_empty() {
            return Err(ProductError::BlankTitle);
        }
        if !price.is_positive() {
            return Err(ProductError::InvalidPrice {
                price: price.cents(),
            });
        }
        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity });
        }

        Ok(vec![ProductEvent::ProductCreated(ProductCreatedData {
            product_id: product_id.clone(),
            title: title.to_string(),
            price,
            quantity,
        })])
    }

    /// Reserves stock for an order.
    ///
    /// A second reservation for an order that already holds one is accepted
    /// without producing an event.
    pub fn reserve(
        &self,
        product_id: &AggregateId,
        order_id: &AggregateId,
        user_id: &str,
        quantity: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        self.ensure_exists(product_id)?;

        if quantity == 0 {
            return Err(ProductError::InvalidQuantity { quantity });
        }
        if self.reservations.contains_key(order_id) {
            return Ok(vec![]);
        }
        if self.quantity < quantity {
            return Err(ProductError::InsufficientStock {
                available: self.quantity,
                requested: quantity,
            });
        }

        Ok(vec![ProductEvent::ProductReserved(ProductReservedData {
            product_id: product_id.clone(),
            order_id: order_id.clone(),
            user_id: user_id.to_string(),
            quantity,
        })])
    }

    /// Releases an order's reservation and returns exactly the reserved
    /// quantity to stock. Cancelling a reservation that is not outstanding is
    /// a no-op.
    pub fn cancel_reservation(
        &self,
        product_id: &AggregateId,
        order_id: &AggregateId,
        user_id: &str,
        reason: &str,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        self.ensure_exists(product_id)?;

        let Some(&reserved) = self.reservations.get(order_id) else {
            return Ok(vec![]);
        };

        Ok(vec![ProductEvent::ProductReservationCancelled(
            ProductReservationCancelledData {
                product_id: product_id.clone(),
                order_id: order_id.clone(),
                user_id: user_id.to_string(),
                quantity: reserved,
                reason: reason.to_string(),
            },
        )])
    }

    fn ensure_exists(&self, product_id: &AggregateId) -> Result<(), ProductError> {
        if self.exists() {
            Ok(())
        } else {
            Err(ProductError::NotFound {
                product_id: product_id.clone(),
            })
        }
    }
}
