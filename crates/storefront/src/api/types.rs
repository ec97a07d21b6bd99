//! Wire types for the storefront REST backend.
//!
//! Field names follow the backend's snake_case JSON. Where the backend is
//! known to use more than one name for a field (e.g. `price` vs
//! `unit_price`), the alternatives are accepted as serde aliases.

use chrono::{DateTime, Utc};
use palengke_core::{
    AddressId, BarangayId, CityId, DeliveryMethod, OrderId, PaymentMethod, ProductId, ProvinceId,
    StoreId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Cart Types
// =============================================================================

/// A single cart line.
///
/// `quantity` is always positive; removing a product deletes the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    #[serde(alias = "item_total")]
    pub line_total: Decimal,
}

/// Cart snapshot as returned by `GET /cart`.
///
/// `subtotal` is the sum of line totals. `total` may include fees that are
/// only known to the backend and is never computed locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub total: Decimal,
}

impl Cart {
    /// An empty cart with zero totals.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of item quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |sum, item| sum.saturating_add(item.quantity))
    }

    /// Sum of line totals; equals `subtotal` on a consistent snapshot.
    #[must_use]
    pub fn line_total_sum(&self) -> Decimal {
        self.items.iter().map(|item| item.line_total).sum()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }
}

/// Body of `POST /cart/items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of `PUT /cart/items/{product_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

// =============================================================================
// Location Types
// =============================================================================

/// An entry in a province, city, or barangay dropdown.
///
/// The backend names the fields after the level (`province_id`,
/// `province_name`, ...); generic `id`/`name` are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOption<I> {
    #[serde(alias = "province_id", alias = "city_id", alias = "barangay_id")]
    pub id: I,
    #[serde(
        alias = "province_name",
        alias = "city_name",
        alias = "barangay_name"
    )]
    pub name: String,
}

pub type Province = LocationOption<ProvinceId>;
pub type City = LocationOption<CityId>;
pub type Barangay = LocationOption<BarangayId>;

// =============================================================================
// Address Types
// =============================================================================

/// A saved delivery address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(alias = "id")]
    pub address_id: AddressId,
    pub province_id: ProvinceId,
    pub city_id: CityId,
    pub barangay_id: BarangayId,
    /// House number, street, building.
    #[serde(default, alias = "street_info")]
    pub additional_info: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub province_name: Option<String>,
    #[serde(default)]
    pub city_name: Option<String>,
    #[serde(default)]
    pub barangay_name: Option<String>,
}

/// Body of `POST /addresses` and `PUT /addresses/{id}`.
///
/// Coordinates are mandatory: the delivery fee is computed from the pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressInput {
    pub additional_info: String,
    pub province_id: ProvinceId,
    pub city_id: CityId,
    pub barangay_id: BarangayId,
    pub phone_number: String,
    pub is_default: bool,
    pub latitude: f64,
    pub longitude: f64,
}

// =============================================================================
// Store Types
// =============================================================================

/// A physical store that accepts pickup orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(alias = "id")]
    pub store_id: StoreId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

// =============================================================================
// Checkout Types
// =============================================================================

/// Server-side checkout session (`GET /checkout/details`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutDetails {
    #[serde(default)]
    pub address_id: Option<AddressId>,
    #[serde(default)]
    pub delivery_method: Option<DeliveryMethod>,
    #[serde(default)]
    pub store_id: Option<StoreId>,
    #[serde(default)]
    pub shipping_fee: Option<Decimal>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

/// Body of `POST /checkout/shipping`. `store_id` is sent as `null` for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    pub delivery_method: DeliveryMethod,
    pub store_id: Option<StoreId>,
}

/// Shipping fee computed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    #[serde(alias = "delivery_fee", alias = "fee")]
    pub shipping_fee: Decimal,
}

/// Result of `POST /checkout/payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    /// Hosted payment page for asynchronous payment methods.
    #[serde(default, alias = "payment_url", alias = "checkout_url")]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub total: Option<Decimal>,
}

/// Body of `POST /checkout/confirm-payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub order_id: OrderId,
    pub transaction_id: String,
}

/// A payment confirmation recorded by the checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_accepts_numeric_amounts_and_aliases() {
        let cart: Cart = serde_json::from_str(
            r#"{
                "items": [
                    {"product_id": 7, "quantity": 2, "price": 45.5, "item_total": 91},
                    {"product_id": 9, "product_name": "Eggs", "quantity": 1, "unit_price": "12.25", "line_total": "12.25"}
                ],
                "subtotal": 103.25,
                "total": 103.25
            }"#,
        )
        .unwrap();

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.item_count(), 3);
        assert_eq!(cart.line_total_sum(), cart.subtotal);
        assert_eq!(
            cart.item(ProductId::new(9)).unwrap().product_name.as_deref(),
            Some("Eggs")
        );
    }

    #[test]
    fn test_cart_missing_fields_default_to_empty() {
        let cart: Cart = serde_json::from_str("{}").unwrap();
        assert_eq!(cart, Cart::empty());
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn test_location_option_accepts_level_specific_names() {
        let province: Province =
            serde_json::from_str(r#"{"province_id": 1, "province_name": "Cebu"}"#).unwrap();
        assert_eq!(province.id, ProvinceId::new(1));
        assert_eq!(province.name, "Cebu");

        let city: City = serde_json::from_str(r#"{"id": 5, "name": "Lapu-Lapu"}"#).unwrap();
        assert_eq!(city.id, CityId::new(5));
    }

    #[test]
    fn test_placed_order_redirect_aliases() {
        let order: PlacedOrder = serde_json::from_str(
            r#"{"order_id": 42, "payment_url": "https://pay.example.test/42"}"#,
        )
        .unwrap();
        assert_eq!(order.order_id, OrderId::new(42));
        assert_eq!(
            order.redirect_url.as_deref(),
            Some("https://pay.example.test/42")
        );
    }

    #[test]
    fn test_shipping_selection_serializes_null_store() {
        let body = serde_json::to_value(ShippingSelection {
            delivery_method: DeliveryMethod::Delivery,
            store_id: None,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"delivery_method": "delivery", "store_id": null})
        );
    }
}
