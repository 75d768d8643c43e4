//! Order fulfillment saga constants.

/// The saga type identifier for order fulfillment.
pub const SAGA_TYPE: &str = "OrderFulfillment";

/// Name the payment deadline is scheduled under.
pub const PAYMENT_DEADLINE: &str = "payment-processing-deadline";

/// Default time a saga waits for `PaymentProcessed`.
pub const PAYMENT_DEADLINE_SECS: u64 = 120;

/// Compensation reason when the payment deadline runs out.
pub const REASON_PAYMENT_TIMEOUT: &str = "Payment timeout";

/// Compensation reason when the user has no payment details.
pub const REASON_NO_PAYMENT_DETAILS: &str = "Could not fetch user payment details";

/// Compensation reason when payment processing produced no payment.
pub const REASON_PAYMENT_FAILED: &str =
    "Could not proccess user payment with provided payment details";

/// Compensation reason for a reservation that commits after its order was
/// rejected without one.
pub const REASON_ORDER_REJECTED: &str = "Order rejected";

/// Name command retries are scheduled under.
pub const RETRY_DEADLINE: &str = "command-retry";
