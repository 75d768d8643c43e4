//! Payment aggregate implementation.

use chrono::Utc;
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{PaymentDetails, PaymentError, PaymentEvent, events::PaymentProcessedData};

/// Payment aggregate root. One payment is created per order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    id: Option<AggregateId>,

    #[serde(default)]
    version: Version,

    order_id: Option<AggregateId>,
    details: Option<PaymentDetails>,
}

impl Aggregate for Payment {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
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
            PaymentEvent::PaymentProcessed(data) => {
                self.id = Some(data.payment_id);
                self.order_id = Some(data.order_id);
                self.details = Some(data.details);
            }
        }
    }
}

impl Payment {
    pub fn order_id(&self) -> Option<&AggregateId> {
        self.order_id.as_ref()
    }

    pub fn details(&self) -> Option<&PaymentDetails> {
        self.details.as_ref()
    }

    /// Returns true once the payment has been processed.
    pub fn is_processed(&self) -> bool {
        self.exists()
    }

    /// Processes the payment for an order.
    ///
    /// Re-processing the same payment for the same order is a no-op.
    pub fn process(
        &self,
        payment_id: &AggregateId,
        order_id: &AggregateId,
        details: &PaymentDetails,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        if let Some(existing) = &self.order_id {
            if existing == order_id {
                return Ok(vec![]);
            }
            return Err(PaymentError::AlreadyProcessed {
                payment_id: payment_id.clone(),
                order_id: existing.clone(),
            });
        }
        if order_id.is_blank() {
            return Err(PaymentError::MissingOrderId);
        }
        details
            .validate()
            .map_err(|reason| PaymentError::InvalidPaymentDetails(reason.to_string()))?;

        Ok(vec![PaymentEvent::PaymentProcessed(PaymentProcessedData {
            payment_id: payment_id.clone(),
            order_id: order_id.clone(),
            details: details.clone(),
            processed_at: Utc::now(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> PaymentDetails {
        PaymentDetails {
            name: "JHON DOE".to_string(),
            card_number: "123Card".to_string(),
            valid_until_month: 12,
            valid_until_year: 2030,
            cvv: "123".to_string(),
        }
    }

    #[test]
    fn process_creates_payment() {
        let mut payment = Payment::default();
        let payment_id = AggregateId::from("PAY-1");
        let order_id = AggregateId::from("O-1");

        payment.apply_events(payment.process(&payment_id, &order_id, &details()).unwrap());

        assert!(payment.is_processed());
        assert_eq!(payment.order_id(), Some(&order_id));
        assert_eq!(payment.details().map(|d| d.cvv.as_str()), Some("123"));
    }

    #[test]
    fn reprocessing_same_order_is_noop() {
        let mut payment = Payment::default();
        let payment_id = AggregateId::from("PAY-1");
        let order_id = AggregateId::from("O-1");
        payment.apply_events(payment.process(&payment_id, &order_id, &details()).unwrap());

        assert!(payment.process(&payment_id, &order_id, &details()).unwrap().is_empty());
        assert!(matches!(
            payment.process(&payment_id, &AggregateId::from("O-2"), &details()),
            Err(PaymentError::AlreadyProcessed { .. })
        ));
    }

    #[test]
    fn invalid_details_are_rejected() {
        let mut bad = details();
        bad.card_number.clear();

        let err = Payment::default()
            .process(&AggregateId::from("PAY-1"), &AggregateId::from("O-1"), &bad)
            .unwrap_err();

        assert!(matches!(err, PaymentError::InvalidPaymentDetails(_)));
    }
}
