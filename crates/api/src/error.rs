//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError, PaymentError, ProductError};
use messaging::BusError;
use projections::ProjectionError;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// A command was rejected or could not be delivered.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A read model could not be queried or rebuilt.
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// The workflow did not finish in time.
    #[error("{0}")]
    Timeout(String),

    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Bus(err) => bus_error_status(err),
            ApiError::Projection(ProjectionError::UnknownProjection(_)) => StatusCode::NOT_FOUND,
            ApiError::Projection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error = %message, %status, "request failed");
        } else {
            tracing::debug!(error = %message, %status, "request rejected");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn bus_error_status(err: &BusError) -> StatusCode {
    match err {
        BusError::Domain(domain) => domain_error_status(domain),
        BusError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        BusError::Closed { .. } => StatusCode::SERVICE_UNAVAILABLE,
        BusError::Dropped { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_error_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Order(OrderError::NotFound { .. })
        | DomainError::Product(ProductError::NotFound { .. }) => StatusCode::NOT_FOUND,
        DomainError::Order(OrderError::AlreadyCreated { .. })
        | DomainError::Order(OrderError::InvalidStatusTransition { .. })
        | DomainError::Product(ProductError::AlreadyCreated { .. })
        | DomainError::Product(ProductError::AlreadyExists { .. })
        | DomainError::Payment(PaymentError::AlreadyProcessed { .. }) => StatusCode::CONFLICT,
        DomainError::ConcurrencyRetriesExhausted { .. } => StatusCode::CONFLICT,
        _ if err.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use common::AggregateId;

    use super::*;

    #[test]
    fn duplicate_product_is_a_conflict() {
        let err = ApiError::from(BusError::Domain(DomainError::Product(
            ProductError::AlreadyExists {
                product_id: AggregateId::from("P-1"),
                title: "Keyboard".to_string(),
            },
        )));

        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(
            err.to_string(),
            "Product with productId P-1 or title Keyboard already exist"
        );
    }

    #[test]
    fn validation_failures_are_bad_requests() {
        let err = ApiError::from(BusError::Domain(DomainError::Order(
            OrderError::MissingField("addressId"),
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = ApiError::from(BusError::Domain(DomainError::Product(
            ProductError::InsufficientStock {
                available: 1,
                requested: 2,
            },
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn timeouts_and_unknown_projections() {
        let err = ApiError::from(BusError::Timeout {
            command: "CreateOrder",
            timeout: Duration::from_millis(10),
        });
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);

        let err = ApiError::from(ProjectionError::UnknownProjection("nope".to_string()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            err.to_string(),
            "The event processor with name [nope] is not exists"
        );
    }
}
