//! HTTP route handlers.

pub mod management;
pub mod ops;
pub mod orders;
pub mod payments;
pub mod products;

use common::AggregateId;

use crate::error::ApiError;

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let id = AggregateId::from(id);
    if id.is_blank() {
        return Err(ApiError::BadRequest("Identifier must not be blank".to_string()));
    }
    Ok(id)
}

pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be blank")));
    }
    Ok(())
}

pub(crate) fn require_quantity(quantity: u32) -> Result<(), ApiError> {
    if !(1..=5).contains(&quantity) {
        return Err(ApiError::BadRequest(format!(
            "quantity must be between 1 and 5, got {quantity}"
        )));
    }
    Ok(())
}
