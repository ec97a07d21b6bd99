//! Storefront context shared by everything that touches the cart or checkout.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::info;

use crate::addresses::{AddressBook, AddressForm};
use crate::api::{AddressApi, ApiClient, ApiError, Backend, LocationApi};
use crate::cart::CartStore;
use crate::checkout::CheckoutSession;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::location::LocationCascade;

/// Owns the one cart and the one checkout session of a customer session.
///
/// This struct is cheaply cloneable via `Arc`; clones share the same cart
/// and checkout state.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    cart: Arc<CartStore>,
    checkout: CheckoutSession,
    addresses: AddressBook,
    address_api: Arc<dyn AddressApi>,
    locations: Arc<dyn LocationApi>,
    /// Set when backed by HTTP, for token changes.
    client: Option<ApiClient>,
}

impl Storefront {
    /// Connect to the REST backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn connect(config: &StorefrontConfig) -> std::result::Result<Self, ApiError> {
        let client = ApiClient::new(config)?;
        Ok(Self::build(Arc::new(client.clone()), Some(client)))
    }

    /// Build a storefront over any backend implementation.
    #[must_use]
    pub fn new<B: Backend + 'static>(backend: Arc<B>) -> Self {
        Self::build(backend, None)
    }

    fn build<B: Backend + 'static>(backend: Arc<B>, client: Option<ApiClient>) -> Self {
        let cart = Arc::new(CartStore::new(backend.clone()));
        let checkout = CheckoutSession::new(backend.clone(), backend.clone(), cart.clone());

        Self {
            inner: Arc::new(StorefrontInner {
                cart,
                checkout,
                addresses: AddressBook::new(backend.clone()),
                address_api: backend.clone(),
                locations: backend,
                client,
            }),
        }
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn checkout(&self) -> &CheckoutSession {
        &self.inner.checkout
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressBook {
        &self.inner.addresses
    }

    /// A fresh location selector, e.g. for a store-finder dropdown.
    #[must_use]
    pub fn location_cascade(&self) -> LocationCascade {
        LocationCascade::new(self.inner.locations.clone())
    }

    /// A fresh address form with its own location selector.
    #[must_use]
    pub fn address_form(&self) -> AddressForm {
        AddressForm::new(self.inner.address_api.clone(), self.inner.locations.clone())
    }

    /// Re-sync after the signed-in customer changed.
    ///
    /// The cart is re-fetched for the new identity and any checkout in
    /// progress is dropped.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the cart cannot be fetched.
    pub async fn on_auth_changed(&self) -> Result<()> {
        self.inner.checkout.reset();
        self.inner.cart.refresh().await
    }

    /// Sign in with a bearer token and load the customer's cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the cart cannot be fetched.
    pub async fn sign_in(&self, token: SecretString) -> Result<()> {
        if let Some(client) = &self.inner.client {
            client.set_token(Some(token));
        }
        info!("Customer signed in");
        self.on_auth_changed().await
    }

    /// Drop credentials and all local state without calling the backend.
    pub fn logout(&self) {
        if let Some(client) = &self.inner.client {
            client.set_token(None);
        }
        self.inner.cart.discard();
        self.inner.checkout.reset();
        info!("Customer signed out");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use palengke_core::{AddressId, CheckoutStep, DeliveryMethod, PaymentMethod, ProductId};

    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn test_full_checkout_through_context() {
        let backend = Arc::new(FakeBackend::seeded());
        let storefront = Storefront::new(backend.clone());
        storefront.on_auth_changed().await.unwrap();

        storefront.cart().add(ProductId::new(7), 2).await.unwrap();
        storefront.cart().add(ProductId::new(9), 1).await.unwrap();
        assert_eq!(storefront.cart().count(), 3);

        let checkout = storefront.checkout();
        checkout.set_address(AddressId::new(1)).await.unwrap();
        checkout
            .set_shipping(DeliveryMethod::Delivery, None)
            .await
            .unwrap();
        let order = checkout.place_order(PaymentMethod::Online).await.unwrap();
        checkout.confirm_payment(order.order_id, "tx-1").await.unwrap();

        assert_eq!(checkout.step(), CheckoutStep::Confirmed);
        assert!(storefront.cart().is_empty());
    }

    #[tokio::test]
    async fn test_logout_drops_local_state() {
        let backend = Arc::new(FakeBackend::seeded());
        let storefront = Storefront::new(backend.clone());
        storefront.cart().add(ProductId::new(7), 1).await.unwrap();
        storefront
            .checkout()
            .set_address(AddressId::new(1))
            .await
            .unwrap();
        backend.clear_calls();

        storefront.logout();
        assert!(storefront.cart().is_empty());
        assert_eq!(storefront.checkout().step(), CheckoutStep::Empty);
        assert!(backend.calls().is_empty());

        storefront.on_auth_changed().await.unwrap();
        assert_eq!(storefront.cart().count(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let storefront = Storefront::new(Arc::new(FakeBackend::seeded()));
        let other = storefront.clone();

        storefront.cart().add(ProductId::new(9), 4).await.unwrap();
        assert_eq!(other.cart().count(), 4);
    }

    #[tokio::test]
    async fn test_forms_get_independent_cascades() {
        let storefront = Storefront::new(Arc::new(FakeBackend::seeded()));
        let first = storefront.location_cascade();
        let form = storefront.address_form();

        first
            .select_province(palengke_core::ProvinceId::new(1))
            .await
            .unwrap();
        assert!(form.cascade().draft().province_id.is_none());
    }

    #[test]
    fn test_connect_builds_http_client() {
        let config = StorefrontConfig::for_base_url("http://127.0.0.1:9/api").unwrap();
        let storefront = Storefront::connect(&config).unwrap();
        storefront.logout();
        assert!(storefront.cart().is_empty());
    }
}
