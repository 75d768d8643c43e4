//! Payment commands.

use common::AggregateId;

use crate::command::Command;

use super::{Payment, PaymentDetails};

/// Command to charge an order's payment.
#[derive(Debug, Clone)]
pub struct ProcessPayment {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub details: PaymentDetails,
}

impl ProcessPayment {
    pub fn new(payment_id: AggregateId, order_id: AggregateId, details: PaymentDetails) -> Self {
        Self {
            payment_id,
            order_id,
            details,
        }
    }
}

impl Command for ProcessPayment {
    type Aggregate = Payment;

    fn aggregate_id(&self) -> &AggregateId {
        &self.payment_id
    }

    fn command_type(&self) -> &'static str {
        "ProcessPayment"
    }
}
