//! Integration test harness for the Palengke storefront core.
//!
//! [`StubServer`] serves the storefront REST contract from an in-memory
//! [`FakeBackend`] on an ephemeral port, so the real `ApiClient` can be
//! exercised end-to-end: URL building, bearer auth, wrapped and bare list
//! responses, error bodies, and field aliases.
//!
//! # Running Tests
//!
//! ```bash
//! # Stub-backed tests
//! cargo test -p palengke-integration-tests
//!
//! # Live backend tests (needs PALENGKE_API_BASE_URL and PALENGKE_API_TOKEN)
//! cargo test -p palengke-integration-tests -- --ignored
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use palengke_core::{
    AddressId, CityId, DeliveryMethod, PaymentMethod, ProductId, ProvinceId, StoreId,
};
use palengke_storefront::api::{
    AddItemRequest, AddressApi, AddressInput, ApiError, CartApi, CheckoutApi,
    ConfirmPaymentRequest, LocationApi, ShippingSelection, StoreApi, UpdateItemRequest,
};
use palengke_storefront::config::StorefrontConfig;
use palengke_storefront::testing::FakeBackend;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// Token the stub accepts.
pub const TEST_TOKEN: &str = "test-token";

type Backend = Arc<FakeBackend>;

// =============================================================================
// Stub Server
// =============================================================================

/// Running stub backend. Aborted on drop.
pub struct StubServer {
    pub addr: SocketAddr,
    pub backend: Arc<FakeBackend>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Start a stub over a seeded backend.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        Self::with_backend(Arc::new(FakeBackend::seeded())).await
    }

    /// Start a stub over the given backend.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn with_backend(backend: Arc<FakeBackend>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub listener address");

        let app = router(backend.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            backend,
            handle,
        }
    }

    /// Base URL of the stub API.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration pointing at the stub, signed in.
    ///
    /// # Panics
    ///
    /// Panics if the stub URL is rejected.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        let mut config =
            StorefrontConfig::for_base_url(&self.base_url()).expect("stub base URL is valid");
        config.api_token = Some(SecretString::from(TEST_TOKEN.to_string()));
        config
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn router(backend: Backend) -> Router {
    let api = Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/{id}", put(update_item).delete(remove_item))
        .route("/checkout/details", get(checkout_details))
        .route("/checkout/address", post(set_address))
        .route("/checkout/shipping", post(set_shipping))
        .route("/checkout/calculate-shipping", get(calculate_shipping))
        .route("/checkout/payment", post(place_order))
        .route("/checkout/confirm-payment", post(confirm_payment))
        .route("/addresses", get(list_addresses).post(create_address))
        .route(
            "/addresses/{id}",
            get(get_address).put(update_address).delete(delete_address),
        )
        .route("/addresses/{id}/default", post(set_default_address))
        .route("/locations/provinces", get(list_provinces))
        .route("/locations/provinces/{id}/cities", get(list_cities))
        .route("/locations/cities/{id}/barangays", get(list_barangays))
        .route("/stores", get(list_stores))
        .route("/stores/{id}", get(get_store))
        .route_layer(middleware::from_fn(require_token))
        .with_state(backend);

    Router::new().nest("/api", api)
}

async fn require_token(request: Request, next: Next) -> Response {
    let expected = format!("Bearer {TEST_TOKEN}");
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == expected);

    if authorized {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Not authenticated"})),
        )
            .into_response()
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

struct StubError(ApiError);

impl From<ApiError> for StubError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for StubError {
    fn into_response(self) -> Response {
        match self.0 {
            ApiError::Api { status, message } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                Json(json!({"detail": message})),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": other.to_string()})),
            )
                .into_response(),
        }
    }
}

type StubResult = Result<Json<Value>, StubError>;

fn ok(message: &str) -> StubResult {
    Ok(Json(json!({"message": message})))
}

fn to_json<T: serde::Serialize>(value: &T) -> StubResult {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| StubError(ApiError::Parse(e.to_string())))
}

// =============================================================================
// Cart
// =============================================================================

async fn get_cart(State(backend): State<Backend>) -> StubResult {
    to_json(&backend.get_cart().await?)
}

async fn add_item(State(backend): State<Backend>, Json(body): Json<AddItemRequest>) -> StubResult {
    backend.add_item(body.product_id, body.quantity).await?;
    ok("Item added to cart")
}

async fn update_item(
    State(backend): State<Backend>,
    Path(id): Path<ProductId>,
    Json(body): Json<UpdateItemRequest>,
) -> StubResult {
    backend.update_item(id, body.quantity).await?;
    ok("Cart updated")
}

async fn remove_item(State(backend): State<Backend>, Path(id): Path<ProductId>) -> StubResult {
    backend.remove_item(id).await?;
    ok("Item removed")
}

async fn clear_cart(State(backend): State<Backend>) -> StubResult {
    backend.clear_cart().await?;
    ok("Cart cleared")
}

// =============================================================================
// Checkout
// =============================================================================

#[derive(Deserialize)]
struct AddressBody {
    address_id: AddressId,
}

#[derive(Deserialize)]
struct PaymentBody {
    payment_method: PaymentMethod,
}

#[derive(Deserialize)]
struct ShippingQuery {
    address_id: AddressId,
    delivery_method: DeliveryMethod,
}

async fn checkout_details(State(backend): State<Backend>) -> StubResult {
    to_json(&backend.get_details().await?)
}

async fn set_address(State(backend): State<Backend>, Json(body): Json<AddressBody>) -> StubResult {
    backend.set_address(body.address_id).await?;
    ok("Address set")
}

async fn set_shipping(
    State(backend): State<Backend>,
    Json(body): Json<ShippingSelection>,
) -> StubResult {
    let quote = backend.set_shipping(&body).await?;
    // Older backend builds name the fee `delivery_fee`
    Ok(Json(json!({"delivery_fee": quote.shipping_fee.to_string()})))
}

async fn calculate_shipping(
    State(backend): State<Backend>,
    Query(query): Query<ShippingQuery>,
) -> StubResult {
    to_json(
        &backend
            .calculate_shipping(query.address_id, query.delivery_method)
            .await?,
    )
}

async fn place_order(State(backend): State<Backend>, Json(body): Json<PaymentBody>) -> StubResult {
    let order = backend.place_order(body.payment_method).await?;
    Ok(Json(json!({
        "order_id": order.order_id,
        "payment_url": order.redirect_url,
        "total": order.total.map(|t| t.to_string()),
    })))
}

async fn confirm_payment(
    State(backend): State<Backend>,
    Json(body): Json<ConfirmPaymentRequest>,
) -> StubResult {
    backend
        .confirm_payment(body.order_id, &body.transaction_id)
        .await?;
    ok("Payment confirmed")
}

// =============================================================================
// Addresses
// =============================================================================

async fn list_addresses(State(backend): State<Backend>) -> StubResult {
    let addresses = backend.list_addresses().await?;
    Ok(Json(json!({"addresses": addresses, "count": addresses.len()})))
}

async fn get_address(State(backend): State<Backend>, Path(id): Path<AddressId>) -> StubResult {
    to_json(&backend.get_address(id).await?)
}

async fn create_address(
    State(backend): State<Backend>,
    Json(body): Json<AddressInput>,
) -> Result<(StatusCode, Json<Value>), StubError> {
    let address = backend.create_address(&body).await?;
    Ok((StatusCode::CREATED, to_json(&address)?))
}

async fn update_address(
    State(backend): State<Backend>,
    Path(id): Path<AddressId>,
    Json(body): Json<AddressInput>,
) -> StubResult {
    to_json(&backend.update_address(id, &body).await?)
}

async fn delete_address(State(backend): State<Backend>, Path(id): Path<AddressId>) -> StubResult {
    backend.delete_address(id).await?;
    ok("Address deleted")
}

async fn set_default_address(
    State(backend): State<Backend>,
    Path(id): Path<AddressId>,
) -> StubResult {
    backend.set_default_address(id).await?;
    ok("Default address updated")
}

// =============================================================================
// Locations & Stores
// =============================================================================

async fn list_provinces(State(backend): State<Backend>) -> StubResult {
    let provinces: Vec<Value> = backend
        .list_provinces()
        .await?
        .into_iter()
        .map(|p| json!({"province_id": p.id, "province_name": p.name}))
        .collect();
    Ok(Json(json!({"provinces": provinces})))
}

async fn list_cities(State(backend): State<Backend>, Path(id): Path<ProvinceId>) -> StubResult {
    to_json(&backend.list_cities(id).await?)
}

async fn list_barangays(State(backend): State<Backend>, Path(id): Path<CityId>) -> StubResult {
    let barangays = backend.list_barangays(id).await?;
    Ok(Json(json!({"data": barangays})))
}

#[derive(Deserialize)]
struct StoreQuery {
    search: Option<String>,
}

async fn list_stores(State(backend): State<Backend>, Query(query): Query<StoreQuery>) -> StubResult {
    to_json(&backend.list_stores(query.search.as_deref()).await?)
}

async fn get_store(State(backend): State<Backend>, Path(id): Path<StoreId>) -> StubResult {
    to_json(&backend.get_store(id).await?)
}
