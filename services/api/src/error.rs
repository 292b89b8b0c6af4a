//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each
//! failure is rendered into the response envelope.

use crate::config::ConfigError;
use crate::web::response::send;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use shop_core::cart::CartError;
use shop_core::ports::PortError;
use shop_core::Quantity;
use std::collections::BTreeMap;
use tracing::error;

/// Field name → human readable messages, in a stable order.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a rejected cart operation.
    #[error("Cart Error: {0}")]
    Cart(#[from] CartError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request body failed validation; nothing was written.
    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but as the wrong kind of principal.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Some guest cart lines could not be moved; retrying is safe.
    /// `retry_hint` is the only part the client sees.
    #[error("Storage failure: {detail}")]
    StorageFailure { detail: String, retry_hint: &'static str },

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    /// A validation error for a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Cart(CartError::InvalidQuantity | CartError::QuantityLimit) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::NotFound(_)
            | Self::Cart(CartError::ProductNotFound(_))
            | Self::Port(PortError::NotFound(_))
            | Self::Cart(CartError::Port(PortError::NotFound(_))) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_)
            | Self::Port(PortError::Unauthorized)
            | Self::Cart(CartError::Port(PortError::Unauthorized)) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_)
            | Self::Port(PortError::Conflict(_))
            | Self::Cart(CartError::Port(PortError::Conflict(_))) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Don't expose internal error details to clients
        if status.is_server_error() {
            error!(error = %self, "Request failed");
            let message = match &self {
                Self::StorageFailure { retry_hint, .. } => *retry_hint,
                _ => "Internal server error",
            };
            return send::<()>(status, message, None);
        }

        match self {
            Self::Validation(errors) => send(status, "Validation failed", Some(json!({ "errors": errors }))),
            Self::Cart(CartError::InvalidQuantity) => send(
                status,
                "Validation failed",
                Some(json!({ "errors": { "quantity": ["The quantity must be at least 1."] } })),
            ),
            Self::Cart(CartError::QuantityLimit) => send(
                status,
                "Validation failed",
                Some(json!({
                    "errors": {
                        "quantity": [format!("A cart line may not hold more than {} items.", Quantity::MAX)]
                    }
                })),
            ),
            Self::NotFound(message)
            | Self::Unauthorized(message)
            | Self::Forbidden(message)
            | Self::Conflict(message) => send::<()>(status, message, None),
            Self::Cart(e) => send::<()>(status, e.to_string(), None),
            Self::Port(e) => send::<()>(status, e.to_string(), None),
            other => send::<()>(status, other.to_string(), None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_codes_follow_the_error_taxonomy() {
        assert_eq!(ApiError::field("name", "required").status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::Cart(CartError::InvalidQuantity).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(ApiError::Cart(CartError::ProductNotFound(1)).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Port(PortError::NotFound("x".into())).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Port(PortError::Unauthorized).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden("no".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Port(PortError::Conflict("dup".into())).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::Cart(CartError::Port(PortError::Conflict("race".into()))).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(ApiError::Cart(CartError::QuantityLimit).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            ApiError::StorageFailure {
                detail: "partial".into(),
                retry_hint: "please retry",
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn validation_errors_are_listed_per_field() {
        let (status, body) = body_json(ApiError::field("product_id", "The product id field is required.")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status_code"], 422);
        assert_eq!(
            body["data"]["errors"]["product_id"][0],
            "The product id field is required."
        );
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let (status, body) = body_json(ApiError::Internal("password for db is hunter2".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["data"], Value::Null);
    }

    #[tokio::test]
    async fn quantity_limit_is_a_field_error() {
        let (status, body) = body_json(ApiError::Cart(CartError::QuantityLimit)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body["data"]["errors"]["quantity"][0],
            "A cart line may not hold more than 1000000 items."
        );
    }

    #[tokio::test]
    async fn partial_cart_transfer_shows_only_the_retry_hint() {
        let (status, body) = body_json(ApiError::StorageFailure {
            detail: "1 of the guest cart lines for user 4 were not moved".into(),
            retry_hint: "please log in to retry",
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "please log in to retry");
    }
}
