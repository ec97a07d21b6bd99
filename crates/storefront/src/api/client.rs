//! HTTP implementation of the backend gateway.
//!
//! Uses `reqwest` for JSON over HTTP. Every request carries a fresh
//! `X-Request-Id` and, when signed in, a bearer token. Location lists are
//! cached with `moka` because they never change during a session.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use moka::future::Cache;
use palengke_core::{
    AddressId, CityId, DeliveryMethod, OrderId, PaymentMethod, ProductId, ProvinceId, StoreId,
};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::cache::{CacheKey, CacheValue};
use super::list::extract_list;
use super::types::{
    AddItemRequest, Address, AddressInput, Barangay, Cart, CheckoutDetails, City,
    ConfirmPaymentRequest, PlacedOrder, Province, ShippingQuote, ShippingSelection, Store,
    UpdateItemRequest,
};
use super::{AddressApi, ApiError, CartApi, CheckoutApi, LocationApi, StoreApi};
use crate::config::StorefrontConfig;

/// Maximum number of cached location lists.
const LOCATION_CACHE_CAPACITY: u64 = 2_000;

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the storefront REST backend.
///
/// Cheap to clone; clones share the connection pool, token, and cache.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
    locations: Cache<CacheKey, CacheValue>,
}

impl ApiClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        if let Some(agent) = &config.user_agent {
            headers.insert(
                USER_AGENT,
                HeaderValue::from_str(agent)
                    .map_err(|e| ApiError::Parse(format!("Invalid user agent: {e}")))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let locations = Cache::builder()
            .max_capacity(LOCATION_CACHE_CAPACITY)
            .time_to_live(config.location_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_base_url.clone(),
                token: RwLock::new(config.api_token.clone()),
                locations,
            }),
        })
    }

    /// Replace the bearer token (sign-in) or drop it (sign-out).
    pub fn set_token(&self, token: Option<SecretString>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Whether a bearer token is currently held.
    #[must_use]
    pub fn has_token(&self) -> bool {
        self.inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop all cached location lists.
    pub fn invalidate_location_cache(&self) {
        self.inner.locations.invalidate_all();
    }

    /// Build a URL by appending path segments to the base URL.
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Parse("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .inner
            .client
            .request(method, url)
            .header("X-Request-Id", Uuid::new_v4().to_string());

        let token = self
            .inner
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|t| t.expose_secret().to_string());

        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send a request and map non-success statuses to `ApiError`.
    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            // Stored credentials are stale; drop them so later calls go out anonymous
            self.set_token(None);
            warn!(url = %response.url(), "Backend rejected credentials, token cleared");
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Backend returned non-success status"
            );
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        Ok(response)
    }

    /// Send a request and decode the JSON body.
    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse backend response"
            );
            ApiError::Parse(e.to_string())
        })
    }

    /// Send a request and decode a list that may be bare or wrapped.
    async fn fetch_list<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        field: &str,
    ) -> Result<Vec<T>, ApiError> {
        let value: Value = self.fetch(request).await?;
        extract_list(value, field)
    }

    /// Send a request whose body is an acknowledgement we don't need.
    async fn execute(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send(request).await.map(|_| ())
    }

    fn get(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.request(Method::GET, self.url(segments)?))
    }

    fn delete(&self, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        Ok(self.request(Method::DELETE, self.url(segments)?))
    }

    fn with_body<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<RequestBuilder, ApiError> {
        Ok(self.request(method, self.url(segments)?).json(body))
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"detail": "..."}`, `{"message": "..."}`, and validation
/// error lists of the form `{"detail": [{"msg": "..."}]}`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;

    match value.get("detail").or_else(|| value.get("message"))? {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

// =============================================================================
// Resource Groups
// =============================================================================

#[async_trait]
impl CartApi for ApiClient {
    #[instrument(skip(self))]
    async fn get_cart(&self) -> Result<Cart, ApiError> {
        self.fetch(self.get(&["cart"])?).await
    }

    #[instrument(skip(self))]
    async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        let body = AddItemRequest {
            product_id,
            quantity,
        };
        self.execute(self.with_body(Method::POST, &["cart", "items"], &body)?)
            .await
    }

    #[instrument(skip(self))]
    async fn update_item(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        let id = product_id.to_string();
        let body = UpdateItemRequest { quantity };
        self.execute(self.with_body(Method::PUT, &["cart", "items", &id], &body)?)
            .await
    }

    #[instrument(skip(self))]
    async fn remove_item(&self, product_id: ProductId) -> Result<(), ApiError> {
        let id = product_id.to_string();
        self.execute(self.delete(&["cart", "items", &id])?).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.execute(self.delete(&["cart"])?).await
    }
}

#[async_trait]
impl CheckoutApi for ApiClient {
    #[instrument(skip(self))]
    async fn get_details(&self) -> Result<CheckoutDetails, ApiError> {
        self.fetch(self.get(&["checkout", "details"])?).await
    }

    #[instrument(skip(self))]
    async fn set_address(&self, address_id: AddressId) -> Result<(), ApiError> {
        let body = serde_json::json!({ "address_id": address_id });
        self.execute(self.with_body(Method::POST, &["checkout", "address"], &body)?)
            .await
    }

    #[instrument(skip(self))]
    async fn set_shipping(&self, selection: &ShippingSelection) -> Result<ShippingQuote, ApiError> {
        self.fetch(self.with_body(Method::POST, &["checkout", "shipping"], selection)?)
            .await
    }

    #[instrument(skip(self))]
    async fn calculate_shipping(
        &self,
        address_id: AddressId,
        method: DeliveryMethod,
    ) -> Result<ShippingQuote, ApiError> {
        let mut url = self.url(&["checkout", "calculate-shipping"])?;
        url.query_pairs_mut()
            .append_pair("address_id", &address_id.to_string())
            .append_pair("delivery_method", method.as_str());
        self.fetch(self.request(Method::GET, url)).await
    }

    #[instrument(skip(self))]
    async fn place_order(&self, payment_method: PaymentMethod) -> Result<PlacedOrder, ApiError> {
        let body = serde_json::json!({ "payment_method": payment_method });
        self.fetch(self.with_body(Method::POST, &["checkout", "payment"], &body)?)
            .await
    }

    #[instrument(skip(self))]
    async fn confirm_payment(
        &self,
        order_id: OrderId,
        transaction_id: &str,
    ) -> Result<(), ApiError> {
        let body = ConfirmPaymentRequest {
            order_id,
            transaction_id: transaction_id.to_string(),
        };
        self.execute(self.with_body(Method::POST, &["checkout", "confirm-payment"], &body)?)
            .await
    }
}

#[async_trait]
impl AddressApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_addresses(&self) -> Result<Vec<Address>, ApiError> {
        self.fetch_list(self.get(&["addresses"])?, "addresses").await
    }

    #[instrument(skip(self))]
    async fn get_address(&self, address_id: AddressId) -> Result<Address, ApiError> {
        let id = address_id.to_string();
        self.fetch(self.get(&["addresses", &id])?).await
    }

    #[instrument(skip(self, input))]
    async fn create_address(&self, input: &AddressInput) -> Result<Address, ApiError> {
        self.fetch(self.with_body(Method::POST, &["addresses"], input)?)
            .await
    }

    #[instrument(skip(self, input))]
    async fn update_address(
        &self,
        address_id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        let id = address_id.to_string();
        self.fetch(self.with_body(Method::PUT, &["addresses", &id], input)?)
            .await
    }

    #[instrument(skip(self))]
    async fn delete_address(&self, address_id: AddressId) -> Result<(), ApiError> {
        let id = address_id.to_string();
        self.execute(self.delete(&["addresses", &id])?).await
    }

    #[instrument(skip(self))]
    async fn set_default_address(&self, address_id: AddressId) -> Result<(), ApiError> {
        let id = address_id.to_string();
        self.execute(self.request(Method::POST, self.url(&["addresses", &id, "default"])?))
            .await
    }
}

#[async_trait]
impl LocationApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_provinces(&self) -> Result<Vec<Province>, ApiError> {
        if let Some(CacheValue::Provinces(provinces)) =
            self.inner.locations.get(&CacheKey::Provinces).await
        {
            debug!("Cache hit for provinces");
            return Ok(provinces);
        }

        let provinces: Vec<Province> = self
            .fetch_list(self.get(&["locations", "provinces"])?, "provinces")
            .await?;
        self.inner
            .locations
            .insert(CacheKey::Provinces, CacheValue::Provinces(provinces.clone()))
            .await;
        Ok(provinces)
    }

    #[instrument(skip(self))]
    async fn list_cities(&self, province_id: ProvinceId) -> Result<Vec<City>, ApiError> {
        let key = CacheKey::Cities(province_id);
        if let Some(CacheValue::Cities(cities)) = self.inner.locations.get(&key).await {
            debug!(%province_id, "Cache hit for cities");
            return Ok(cities);
        }

        let id = province_id.to_string();
        let cities: Vec<City> = self
            .fetch_list(self.get(&["locations", "provinces", &id, "cities"])?, "cities")
            .await?;
        self.inner
            .locations
            .insert(key, CacheValue::Cities(cities.clone()))
            .await;
        Ok(cities)
    }

    #[instrument(skip(self))]
    async fn list_barangays(&self, city_id: CityId) -> Result<Vec<Barangay>, ApiError> {
        let key = CacheKey::Barangays(city_id);
        if let Some(CacheValue::Barangays(barangays)) = self.inner.locations.get(&key).await {
            debug!(%city_id, "Cache hit for barangays");
            return Ok(barangays);
        }

        let id = city_id.to_string();
        let barangays: Vec<Barangay> = self
            .fetch_list(
                self.get(&["locations", "cities", &id, "barangays"])?,
                "barangays",
            )
            .await?;
        self.inner
            .locations
            .insert(key, CacheValue::Barangays(barangays.clone()))
            .await;
        Ok(barangays)
    }
}

#[async_trait]
impl StoreApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_stores(&self, search: Option<&str>) -> Result<Vec<Store>, ApiError> {
        let mut url = self.url(&["stores"])?;
        if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
            url.query_pairs_mut().append_pair("search", search);
        }
        self.fetch_list(self.request(Method::GET, url), "stores")
            .await
    }

    #[instrument(skip(self))]
    async fn get_store(&self, store_id: StoreId) -> Result<Store, ApiError> {
        let id = store_id.to_string();
        self.fetch(self.get(&["stores", &id])?).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::new(&StorefrontConfig::for_base_url(base).unwrap()).unwrap()
    }

    #[test]
    fn test_url_appends_segments() {
        let client = client("https://shop.example.ph/api");
        let url = client.url(&["cart", "items", "7"]).unwrap();
        assert_eq!(url.as_str(), "https://shop.example.ph/api/cart/items/7");
    }

    #[test]
    fn test_url_handles_trailing_slash() {
        let client = client("https://shop.example.ph/api/");
        let url = client.url(&["locations", "provinces"]).unwrap();
        assert_eq!(url.as_str(), "https://shop.example.ph/api/locations/provinces");
    }

    #[test]
    fn test_url_escapes_segments() {
        let client = client("https://shop.example.ph/api");
        let url = client.url(&["stores", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://shop.example.ph/api/stores/a%2Fb");
    }

    #[test]
    fn test_token_lifecycle() {
        let client = client("https://shop.example.ph/api");
        assert!(!client.has_token());

        client.set_token(Some(SecretString::from("tok_123".to_string())));
        assert!(client.has_token());

        client.set_token(None);
        assert!(!client.has_token());
    }

    #[test]
    fn test_error_message_detail_string() {
        assert_eq!(
            error_message(r#"{"detail": "Insufficient stock"}"#).as_deref(),
            Some("Insufficient stock")
        );
    }

    #[test]
    fn test_error_message_message_field() {
        assert_eq!(
            error_message(r#"{"message": "Failed to confirm payment."}"#).as_deref(),
            Some("Failed to confirm payment.")
        );
    }

    #[test]
    fn test_error_message_validation_list() {
        let body = r#"{"detail": [{"loc": ["body", "quantity"], "msg": "must be positive"}, {"msg": "bad id"}]}"#;
        assert_eq!(
            error_message(body).as_deref(),
            Some("must be positive; bad id")
        );
    }

    #[test]
    fn test_error_message_absent() {
        assert_eq!(error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(error_message(r#"{"detail": ""}"#), None);
        assert_eq!(error_message(r#"{"error": "x"}"#), None);
    }
}
