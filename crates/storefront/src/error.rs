//! Unified error handling with Sentry integration.
//!
//! Every public operation of the cart, checkout, and location components
//! returns `Result<T, StoreError>`. Transport failures never escape as
//! [`ApiError`]; they are converted into [`StoreError::Remote`] at the
//! component boundary, carrying the server's message when it sent one.

use thiserror::Error;

use crate::api::ApiError;

/// Storefront-level error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A precondition on the caller's input was not met.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation is not allowed in the component's current state.
    #[error("Invalid state: {operation} requires {required}")]
    InvalidState {
        /// Operation that was rejected.
        operation: &'static str,
        /// State the operation needs first.
        required: String,
    },

    /// The backend rejected or failed the call.
    #[error("{0}")]
    Remote(String),
}

impl StoreError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build an invalid-state error.
    pub fn invalid_state(operation: &'static str, required: impl Into<String>) -> Self {
        Self::InvalidState {
            operation,
            required: required.into(),
        }
    }

    /// Convert a transport error, preferring the server-supplied message.
    #[must_use]
    pub fn remote(err: &ApiError, fallback: &str) -> Self {
        Self::Remote(
            err.server_message()
                .map_or_else(|| fallback.to_string(), str::to_string),
        )
    }

    /// Whether this error was caused by the backend rather than the caller.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Report an error to Sentry and the log.
///
/// Only backend failures are captured; validation and state errors are
/// user mistakes and only logged at debug level.
pub fn report(err: &StoreError) {
    if err.is_remote() {
        let event_id = sentry::capture_error(err);
        tracing::error!(
            error = %err,
            sentry_event_id = %event_id,
            "Storefront operation failed"
        );
    } else {
        tracing::debug!(error = %err, "Storefront operation rejected");
    }
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart and
/// checkout actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", &[("product_id", "7")]);
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::validation("missing coordinates");
        assert_eq!(err.to_string(), "Validation error: missing coordinates");

        let err = StoreError::invalid_state("place_order", "shipping_set");
        assert_eq!(
            err.to_string(),
            "Invalid state: place_order requires shipping_set"
        );
    }

    #[test]
    fn test_remote_prefers_server_message() {
        let err = ApiError::Api {
            status: 400,
            message: Some("Insufficient stock".to_string()),
        };
        assert_eq!(
            StoreError::remote(&err, "Failed to add to cart"),
            StoreError::Remote("Insufficient stock".to_string())
        );
    }

    #[test]
    fn test_remote_falls_back_without_server_message() {
        let err = ApiError::Api {
            status: 502,
            message: None,
        };
        let store_err = StoreError::remote(&err, "Failed to add to cart");
        assert_eq!(store_err.to_string(), "Failed to add to cart");
        assert!(store_err.is_remote());

        assert_eq!(
            StoreError::remote(&ApiError::Unauthorized, "Failed to load cart").to_string(),
            "Failed to load cart"
        );
    }
}
