//! Typed gateway to the storefront REST backend.
//!
//! # Architecture
//!
//! - The backend is the source of truth - NO local persistence, direct API calls
//! - Five resource groups, one trait each: [`CartApi`], [`CheckoutApi`],
//!   [`AddressApi`], [`LocationApi`], [`StoreApi`]
//! - [`ApiClient`] implements all of them over JSON/HTTP with `reqwest`
//! - Location option lists are cached in memory via `moka`; they never
//!   change while a session is open
//!
//! The gateway is pure I/O. Ordering, invalidation, and fail-safe rules live
//! in the components that own state (`CartStore`, `CheckoutSession`,
//! `LocationCascade`).

mod cache;
mod client;
mod list;
pub mod types;

pub use client::ApiClient;
pub use list::extract_list;
pub use types::*;

use async_trait::async_trait;
use palengke_core::{
    AddressId, CityId, DeliveryMethod, OrderId, PaymentMethod, ProductId, ProvinceId, StoreId,
};
use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("API error: {status} - {}", .message.as_deref().unwrap_or("(no message)"))]
    Api {
        status: u16,
        /// Server-supplied `detail`/`message`, when the body carried one.
        message: Option<String>,
    },

    /// Credentials were missing or rejected. The held token has been cleared.
    #[error("Unauthorized")]
    Unauthorized,

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Server-supplied error text, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api {
                message: Some(message),
                ..
            } => Some(message.as_str()),
            _ => None,
        }
    }

    /// Whether the backend reported the resource as missing.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Cart resource group.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Fetch the full cart snapshot.
    async fn get_cart(&self) -> Result<Cart, ApiError>;
    /// Add `quantity` units of a product.
    async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError>;
    /// Set the quantity of a product already in the cart.
    async fn update_item(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError>;
    /// Delete a product's line from the cart.
    async fn remove_item(&self, product_id: ProductId) -> Result<(), ApiError>;
    /// Remove every line from the cart.
    async fn clear_cart(&self) -> Result<(), ApiError>;
}

/// Checkout resource group.
#[async_trait]
pub trait CheckoutApi: Send + Sync {
    /// Fetch the server-side checkout session.
    async fn get_details(&self) -> Result<CheckoutDetails, ApiError>;
    /// Choose the delivery address.
    async fn set_address(&self, address_id: AddressId) -> Result<(), ApiError>;
    /// Choose the delivery method; the response carries the shipping fee.
    async fn set_shipping(&self, selection: &ShippingSelection) -> Result<ShippingQuote, ApiError>;
    /// Quote a shipping fee without changing the session.
    async fn calculate_shipping(
        &self,
        address_id: AddressId,
        method: DeliveryMethod,
    ) -> Result<ShippingQuote, ApiError>;
    /// Submit the order.
    async fn place_order(&self, payment_method: PaymentMethod) -> Result<PlacedOrder, ApiError>;
    /// Confirm an out-of-band payment.
    async fn confirm_payment(
        &self,
        order_id: OrderId,
        transaction_id: &str,
    ) -> Result<(), ApiError>;
}

/// Address resource group.
#[async_trait]
pub trait AddressApi: Send + Sync {
    async fn list_addresses(&self) -> Result<Vec<Address>, ApiError>;
    async fn get_address(&self, address_id: AddressId) -> Result<Address, ApiError>;
    async fn create_address(&self, input: &AddressInput) -> Result<Address, ApiError>;
    async fn update_address(
        &self,
        address_id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, ApiError>;
    async fn delete_address(&self, address_id: AddressId) -> Result<(), ApiError>;
    async fn set_default_address(&self, address_id: AddressId) -> Result<(), ApiError>;
}

/// Location resource group (province → city → barangay).
#[async_trait]
pub trait LocationApi: Send + Sync {
    async fn list_provinces(&self) -> Result<Vec<Province>, ApiError>;
    async fn list_cities(&self, province_id: ProvinceId) -> Result<Vec<City>, ApiError>;
    async fn list_barangays(&self, city_id: CityId) -> Result<Vec<Barangay>, ApiError>;
}

/// Store resource group (pickup locations).
#[async_trait]
pub trait StoreApi: Send + Sync {
    async fn list_stores(&self, search: Option<&str>) -> Result<Vec<Store>, ApiError>;
    async fn get_store(&self, store_id: StoreId) -> Result<Store, ApiError>;
}

/// A backend that serves all five resource groups.
pub trait Backend: CartApi + CheckoutApi + AddressApi + LocationApi + StoreApi {}

impl<T> Backend for T where T: CartApi + CheckoutApi + AddressApi + LocationApi + StoreApi {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::Api {
            status: 422,
            message: Some("Quantity must be positive".to_string()),
        };
        assert_eq!(err.to_string(), "API error: 422 - Quantity must be positive");

        let err = ApiError::Api {
            status: 500,
            message: None,
        };
        assert_eq!(err.to_string(), "API error: 500 - (no message)");
        assert_eq!(err.server_message(), None);
    }

    #[test]
    fn test_not_found_detection() {
        let err = ApiError::Api {
            status: 404,
            message: None,
        };
        assert!(err.is_not_found());
        assert!(!ApiError::Unauthorized.is_not_found());
    }
}
