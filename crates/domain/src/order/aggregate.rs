//! Order aggregate implementation.

use chrono::Utc;
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    OrderError, OrderEvent, OrderStatus,
    events::{OrderApprovedData, OrderCreatedData, OrderRejectedData},
};

/// Order aggregate root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    product_id: Option<AggregateId>,
    user_id: String,
    quantity: u32,
    address_id: String,
    status: OrderStatus,

    /// Set once the order is rejected.
    rejection_reason: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::OrderCreated(data) => {
                self.id = Some(data.order_id);
                self.product_id = Some(data.product_id);
                self.user_id = data.user_id;
                self.quantity = data.quantity;
                self.address_id = data.address_id;
                self.status = OrderStatus::Created;
            }
            OrderEvent::OrderApproved(_) => {
                self.status = OrderStatus::Approved;
            }
            OrderEvent::OrderRejected(data) => {
                self.status = OrderStatus::Rejected;
                self.rejection_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn product_id(&self) -> Option<&AggregateId> {
        self.product_id.as_ref()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn address_id(&self) -> &str {
        &self.address_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order.
    pub fn create(
        &self,
        order_id: &AggregateId,
        product_id: &AggregateId,
        user_id: &str,
        quantity: u32,
        address_id: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.exists() {
            return Err(OrderError::AlreadyCreated {
                order_id: order_id.clone(),
            });
        }
        if product_id.is_blank() {
            return Err(OrderError::MissingField("productId"));
        }
        if user_id.trim().is_empty() {
            return Err(OrderError::MissingField("userId"));
        }
        if address_id.trim().is_empty() {
            return Err(OrderError::MissingField("addressId"));
        }
        if quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity });
        }

        Ok(vec![OrderEvent::OrderCreated(OrderCreatedData {
            order_id: order_id.clone(),
            product_id: product_id.clone(),
            user_id: user_id.to_string(),
            quantity,
            address_id: address_id.to_string(),
            created_at: Utc::now(),
        })])
    }

    /// Approves the order. Approving an approved order is a no-op.
    pub fn approve(&self, order_id: &AggregateId) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_exists(order_id)?;

        match self.status {
            OrderStatus::Created => Ok(vec![OrderEvent::OrderApproved(OrderApprovedData {
                order_id: order_id.clone(),
                approved_at: Utc::now(),
            })]),
            OrderStatus::Approved => Ok(vec![]),
            OrderStatus::Rejected => Err(OrderError::InvalidStatusTransition {
                current: self.status,
                action: "approve",
            }),
        }
    }

    /// Rejects the order. Rejecting a rejected order is a no-op.
    pub fn reject(
        &self,
        order_id: &AggregateId,
        reason: &str,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_exists(order_id)?;

        match self.status {
            OrderStatus::Created => Ok(vec![OrderEvent::OrderRejected(OrderRejectedData {
                order_id: order_id.clone(),
                reason: reason.to_string(),
                rejected_at: Utc::now(),
            })]),
            OrderStatus::Rejected => Ok(vec![]),
            OrderStatus::Approved => Err(OrderError::InvalidStatusTransition {
                current: self.status,
                action: "reject",
            }),
        }
    }

    fn ensure_exists(&self, order_id: &AggregateId) -> Result<(), OrderError> {
        if self.exists() {
            Ok(())
        } else {
            Err(OrderError::NotFound {
                order_id: order_id.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created_order() -> (AggregateId, Order) {
        let order_id = AggregateId::from("O-1");
        let mut order = Order::default();
        let events = order
            .create(&order_id, &AggregateId::from("P-1"), "U-1", 2, "A-1")
            .unwrap();
        order.apply_events(events);
        (order_id, order)
    }

    #[test]
    fn create_sets_all_fields() {
        let (order_id, order) = created_order();

        assert_eq!(order.id(), Some(&order_id));
        assert_eq!(order.product_id(), Some(&AggregateId::from("P-1")));
        assert_eq!(order.user_id(), "U-1");
        assert_eq!(order.quantity(), 2);
        assert_eq!(order.address_id(), "A-1");
        assert_eq!(order.status(), OrderStatus::Created);
    }

    #[test]
    fn create_twice_fails() {
        let (order_id, order) = created_order();
        let result = order.create(&order_id, &AggregateId::from("P-1"), "U-1", 1, "A-1");
        assert!(matches!(result, Err(OrderError::AlreadyCreated { .. })));
    }

    #[test]
    fn create_rejects_zero_quantity_and_blank_fields() {
        let order = Order::default();
        let id = AggregateId::from("O-1");
        let product = AggregateId::from("P-1");

        assert!(matches!(
            order.create(&id, &product, "U-1", 0, "A-1"),
            Err(OrderError::InvalidQuantity { quantity: 0 })
        ));
        assert!(matches!(
            order.create(&id, &AggregateId::from(" "), "U-1", 1, "A-1"),
            Err(OrderError::MissingField("productId"))
        ));
        assert!(matches!(
            order.create(&id, &product, "U-1", 1, ""),
            Err(OrderError::MissingField("addressId"))
        ));
    }

    #[test]
    fn approve_then_approve_again_is_noop() {
        let (order_id, mut order) = created_order();

        let events = order.approve(&order_id).unwrap();
        assert_eq!(events.len(), 1);
        order.apply_events(events);
        assert_eq!(order.status(), OrderStatus::Approved);

        assert!(order.approve(&order_id).unwrap().is_empty());
    }

    #[test]
    fn reject_records_reason() {
        let (order_id, mut order) = created_order();

        order.apply_events(order.reject(&order_id, "Payment timeout").unwrap());

        assert_eq!(order.status(), OrderStatus::Rejected);
        assert_eq!(order.rejection_reason(), Some("Payment timeout"));
        assert!(order.reject(&order_id, "again").unwrap().is_empty());
    }

    #[test]
    fn terminal_statuses_are_exclusive() {
        let (order_id, mut order) = created_order();
        order.apply_events(order.reject(&order_id, "nope").unwrap());

        assert!(matches!(
            order.approve(&order_id),
            Err(OrderError::InvalidStatusTransition {
                current: OrderStatus::Rejected,
                ..
            })
        ));

        let (order_id, mut order) = created_order();
        order.apply_events(order.approve(&order_id).unwrap());
        assert!(order.reject(&order_id, "late").is_err());
    }

    #[test]
    fn commands_on_missing_order_fail() {
        let order = Order::default();
        let id = AggregateId::from("O-404");
        assert!(matches!(order.approve(&id), Err(OrderError::NotFound { .. })));
        assert!(matches!(order.reject(&id, "x"), Err(OrderError::NotFound { .. })));
    }
}
