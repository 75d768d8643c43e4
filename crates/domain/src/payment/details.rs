//! Card details a payment is charged against.

use serde::{Deserialize, Serialize};

/// Card details on file for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub name: String,
    pub card_number: String,
    pub valid_until_month: u32,
    pub valid_until_year: i32,
    pub cvv: String,
}

impl PaymentDetails {
    /// Returns the first problem with these details, if any.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("cardholder name is required");
        }
        if self.card_number.trim().is_empty() {
            return Err("card number is required");
        }
        if !(1..=12).contains(&self.valid_until_month) {
            return Err("expiry month must be between 1 and 12");
        }
        if self.cvv.trim().is_empty() {
            return Err("cvv is required");
        }
        Ok(())
    }
}
