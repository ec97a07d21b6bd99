//! In-memory backend for tests.
//!
//! [`FakeBackend`] implements every resource group with the server-side
//! rules the storefront depends on: stock limits, "set an address first",
//! order numbering, single payment confirmation per order. It records each
//! call so tests can assert that a rejected operation never reached the
//! backend, and supports injected failures and response delays (per parent
//! for location lists, per operation for checkout steps).

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use palengke_core::{
    AddressId, BarangayId, CityId, DeliveryMethod, OrderId, PaymentMethod, ProductId, ProvinceId,
    StoreId,
};
use rust_decimal::Decimal;

use crate::api::{
    Address, AddressApi, AddressInput, ApiError, Barangay, Cart, CartApi, CartItem, CheckoutApi,
    CheckoutDetails, City, LocationApi, LocationOption, PlacedOrder, Province, ShippingQuote,
    ShippingSelection, Store, StoreApi,
};

/// Delivery fee charged by the fake for every address.
pub const DELIVERY_FEE: Decimal = Decimal::from_parts(49, 0, 0, false, 0);

#[derive(Debug, Clone)]
struct Product {
    name: String,
    price: Decimal,
    stock: u32,
}

#[derive(Debug, Clone, Copy)]
struct OrderRecord {
    payment_method: PaymentMethod,
    paid: bool,
}

#[derive(Debug, Default)]
struct FakeState {
    products: HashMap<ProductId, Product>,
    cart: Vec<(ProductId, u32)>,
    provinces: Vec<Province>,
    cities: HashMap<ProvinceId, Vec<City>>,
    barangays: HashMap<CityId, Vec<Barangay>>,
    addresses: Vec<Address>,
    next_address_id: i32,
    stores: Vec<Store>,
    checkout: CheckoutDetails,
    orders: HashMap<OrderId, OrderRecord>,
    next_order_id: i32,
    failures: HashMap<String, String>,
    city_delays: HashMap<ProvinceId, Duration>,
    barangay_delays: HashMap<CityId, Duration>,
    step_delays: HashMap<String, Duration>,
    calls: Vec<String>,
}

/// In-memory storefront backend.
#[derive(Debug)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    /// An empty backend: no products, locations, stores, or addresses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                next_address_id: 1,
                next_order_id: 1,
                ..FakeState::default()
            }),
        }
    }

    /// A backend with a small Cebu/Manila catalog.
    ///
    /// - products 7 (rice, 45.50, stock 10), 9 (eggs, 12.25, stock 30),
    ///   11 (calamansi, 30.00, stock 3)
    /// - provinces Cebu (1) and Manila (2) with their cities and barangays;
    ///   Lapu-Lapu is city 11 and Pajo is barangay 110
    /// - pickup stores 1 and 2
    /// - one default address (1) pinned in Pajo
    /// - the next order is number 42
    #[must_use]
    pub fn seeded() -> Self {
        let backend = Self::new();
        backend
            .with_product(7, "Jasmine Rice 1kg", Decimal::new(4550, 2), 10)
            .with_product(9, "Fresh Eggs (dozen)", Decimal::new(1225, 2), 30)
            .with_product(11, "Calamansi 250g", Decimal::new(3000, 2), 3);

        {
            let mut state = backend.lock();
            state.provinces = vec![option(1, "Cebu"), option(2, "Manila")];
            state.cities.insert(
                ProvinceId::new(1),
                vec![
                    option(10, "Cebu City"),
                    option(11, "Lapu-Lapu"),
                    option(12, "Mandaue"),
                ],
            );
            state.cities.insert(
                ProvinceId::new(2),
                vec![option(20, "Quezon City"), option(21, "Makati")],
            );
            for (city, barangays) in [
                (10, vec![option(100, "Lahug"), option(101, "Mabolo")]),
                (
                    11,
                    vec![option(110, "Pajo"), option(111, "Gun-ob"), option(112, "Basak")],
                ),
                (12, vec![option(120, "Subangdaku")]),
                (20, vec![option(200, "Diliman")]),
                (21, vec![option(210, "Poblacion")]),
            ] {
                state.barangays.insert(CityId::new(city), barangays);
            }
            state.stores = vec![
                Store {
                    store_id: StoreId::new(1),
                    name: "Palengke Lapu-Lapu".to_string(),
                    address: Some("M.L. Quezon Hwy, Pajo".to_string()),
                    latitude: Some(10.312),
                    longitude: Some(123.951),
                },
                Store {
                    store_id: StoreId::new(2),
                    name: "Palengke Mabolo".to_string(),
                    address: Some("Juan Luna Ave, Mabolo".to_string()),
                    latitude: Some(10.319),
                    longitude: Some(123.913),
                },
            ];
            state.addresses.push(Address {
                address_id: AddressId::new(1),
                province_id: ProvinceId::new(1),
                city_id: CityId::new(11),
                barangay_id: BarangayId::new(110),
                additional_info: "12 M.L. Quezon Hwy".to_string(),
                phone_number: "09171234567".to_string(),
                is_default: true,
                latitude: Some(10.31),
                longitude: Some(123.95),
                province_name: Some("Cebu".to_string()),
                city_name: Some("Lapu-Lapu".to_string()),
                barangay_name: Some("Pajo".to_string()),
            });
            state.next_address_id = 2;
            state.next_order_id = 42;
        }

        backend
    }

    /// Add a product to the catalog.
    pub fn with_product(&self, id: i32, name: &str, price: Decimal, stock: u32) -> &Self {
        self.lock().products.insert(
            ProductId::new(id),
            Product {
                name: name.to_string(),
                price,
                stock,
            },
        );
        self
    }

    /// Number assigned to the next placed order.
    pub fn set_next_order_id(&self, id: i32) {
        self.lock().next_order_id = id;
    }

    /// Make the next call to `operation` fail with a 400 carrying `message`.
    pub fn fail_next(&self, operation: &str, message: &str) {
        self.lock()
            .failures
            .insert(operation.to_string(), message.to_string());
    }

    /// Delay the city list for one province.
    pub fn delay_cities(&self, province_id: ProvinceId, delay: Duration) {
        self.lock().city_delays.insert(province_id, delay);
    }

    /// Delay the barangay list for one city.
    pub fn delay_barangays(&self, city_id: CityId, delay: Duration) {
        self.lock().barangay_delays.insert(city_id, delay);
    }

    /// Delay every call to a checkout `operation` (`set_address`,
    /// `set_shipping`, `place_order`, `confirm_payment`). The call is recorded
    /// before the delay and applied after it.
    pub fn delay(&self, operation: &str, delay: Duration) {
        self.lock().step_delays.insert(operation.to_string(), delay);
    }

    /// Every call received so far, by operation name.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// How many times `operation` was called.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Whether the backend considers `order_id` paid.
    #[must_use]
    pub fn is_paid(&self, order_id: OrderId) -> bool {
        self.lock().orders.get(&order_id).is_some_and(|o| o.paid)
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call, apply any injected failure, then wait out any delay
    /// configured for `operation`.
    async fn begin_delayed(&self, operation: &str) -> Result<(), ApiError> {
        let delay = self.begin(operation)?.step_delays.get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Record the call and apply any injected failure.
    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        match state.failures.remove(operation) {
            Some(message) => Err(rejected(400, &message)),
            None => Ok(state),
        }
    }
}

fn option<I: From<i32>>(id: i32, name: &str) -> LocationOption<I> {
    LocationOption {
        id: I::from(id),
        name: name.to_string(),
    }
}

fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Api {
        status,
        message: Some(message.to_string()),
    }
}

impl FakeState {
    fn cart_snapshot(&self) -> Cart {
        let items: Vec<CartItem> = self
            .cart
            .iter()
            .filter_map(|(product_id, quantity)| {
                let product = self.products.get(product_id)?;
                Some(CartItem {
                    product_id: *product_id,
                    product_name: Some(product.name.clone()),
                    quantity: *quantity,
                    unit_price: product.price,
                    line_total: product.price * Decimal::from(*quantity),
                })
            })
            .collect();
        let subtotal = items.iter().map(|item| item.line_total).sum();

        Cart {
            items,
            subtotal,
            total: subtotal,
        }
    }

    fn check_stock(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        let product = self
            .products
            .get(&product_id)
            .ok_or_else(|| rejected(404, "Product not found"))?;
        if quantity > product.stock {
            return Err(rejected(400, "Insufficient stock"));
        }
        Ok(())
    }

    fn address(&self, address_id: AddressId) -> Result<&Address, ApiError> {
        self.addresses
            .iter()
            .find(|a| a.address_id == address_id)
            .ok_or_else(|| rejected(404, "Address not found"))
    }

    fn fee(&self, method: DeliveryMethod) -> Decimal {
        match method {
            DeliveryMethod::Delivery => DELIVERY_FEE,
            DeliveryMethod::Pickup => Decimal::ZERO,
        }
    }
}

#[async_trait]
impl CartApi for FakeBackend {
    async fn get_cart(&self) -> Result<Cart, ApiError> {
        Ok(self.begin("get_cart")?.cart_snapshot())
    }

    async fn add_item(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        let mut state = self.begin("add_item")?;
        if quantity == 0 {
            return Err(rejected(422, "Quantity must be positive"));
        }
        let existing = state
            .cart
            .iter()
            .find(|(id, _)| *id == product_id)
            .map_or(0, |(_, q)| *q);
        state.check_stock(product_id, existing.saturating_add(quantity))?;

        match state.cart.iter_mut().find(|(id, _)| *id == product_id) {
            Some((_, q)) => *q += quantity,
            None => state.cart.push((product_id, quantity)),
        }
        Ok(())
    }

    async fn update_item(&self, product_id: ProductId, quantity: u32) -> Result<(), ApiError> {
        let mut state = self.begin("update_item")?;
        if quantity == 0 {
            return Err(rejected(422, "Quantity must be positive"));
        }
        state.check_stock(product_id, quantity)?;
        let (_, q) = state
            .cart
            .iter_mut()
            .find(|(id, _)| *id == product_id)
            .ok_or_else(|| rejected(404, "Item not in cart"))?;
        *q = quantity;
        Ok(())
    }

    async fn remove_item(&self, product_id: ProductId) -> Result<(), ApiError> {
        let mut state = self.begin("remove_item")?;
        let before = state.cart.len();
        state.cart.retain(|(id, _)| *id != product_id);
        if state.cart.len() == before {
            return Err(rejected(404, "Item not in cart"));
        }
        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), ApiError> {
        self.begin("clear_cart")?.cart.clear();
        Ok(())
    }
}

#[async_trait]
impl CheckoutApi for FakeBackend {
    async fn get_details(&self) -> Result<CheckoutDetails, ApiError> {
        Ok(self.begin("get_details")?.checkout.clone())
    }

    async fn set_address(&self, address_id: AddressId) -> Result<(), ApiError> {
        self.begin_delayed("set_address").await?;
        let mut state = self.lock();
        state.address(address_id)?;
        state.checkout = CheckoutDetails {
            address_id: Some(address_id),
            ..CheckoutDetails::default()
        };
        Ok(())
    }

    async fn set_shipping(&self, selection: &ShippingSelection) -> Result<ShippingQuote, ApiError> {
        self.begin_delayed("set_shipping").await?;
        let mut state = self.lock();
        if state.checkout.address_id.is_none() {
            return Err(rejected(400, "Set an address first"));
        }
        if let Some(store_id) = selection.store_id
            && !state.stores.iter().any(|s| s.store_id == store_id)
        {
            return Err(rejected(404, "Store not found"));
        }

        let fee = state.fee(selection.delivery_method);
        state.checkout.delivery_method = Some(selection.delivery_method);
        state.checkout.store_id = selection.store_id;
        state.checkout.shipping_fee = Some(fee);
        Ok(ShippingQuote { shipping_fee: fee })
    }

    async fn calculate_shipping(
        &self,
        address_id: AddressId,
        method: DeliveryMethod,
    ) -> Result<ShippingQuote, ApiError> {
        let state = self.begin("calculate_shipping")?;
        state.address(address_id)?;
        Ok(ShippingQuote {
            shipping_fee: state.fee(method),
        })
    }

    async fn place_order(&self, payment_method: PaymentMethod) -> Result<PlacedOrder, ApiError> {
        self.begin_delayed("place_order").await?;
        let mut state = self.lock();
        if state.cart.is_empty() {
            return Err(rejected(400, "Cart is empty"));
        }
        let Some(fee) = state.checkout.shipping_fee else {
            return Err(rejected(400, "Shipping not set"));
        };

        let order_id = OrderId::new(state.next_order_id);
        state.next_order_id += 1;
        let total = state.cart_snapshot().subtotal + fee;
        state.orders.insert(
            order_id,
            OrderRecord {
                payment_method,
                paid: false,
            },
        );
        state.checkout.payment_method = Some(payment_method);

        // Cash orders are final immediately; online orders wait for payment
        if !payment_method.is_asynchronous() {
            state.cart.clear();
            state.checkout = CheckoutDetails::default();
        }

        Ok(PlacedOrder {
            order_id,
            redirect_url: payment_method
                .is_asynchronous()
                .then(|| format!("https://pay.example.test/checkout/{order_id}")),
            total: Some(total),
        })
    }

    async fn confirm_payment(
        &self,
        order_id: OrderId,
        _transaction_id: &str,
    ) -> Result<(), ApiError> {
        self.begin_delayed("confirm_payment").await?;
        let mut state = self.lock();
        let order = state
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| rejected(404, "Order not found"))?;
        if order.paid {
            return Err(rejected(400, "Order already paid"));
        }
        if !order.payment_method.is_asynchronous() {
            return Err(rejected(400, "Order does not use online payment"));
        }
        order.paid = true;
        state.checkout = CheckoutDetails::default();
        Ok(())
    }
}

#[async_trait]
impl AddressApi for FakeBackend {
    async fn list_addresses(&self) -> Result<Vec<Address>, ApiError> {
        Ok(self.begin("list_addresses")?.addresses.clone())
    }

    async fn get_address(&self, address_id: AddressId) -> Result<Address, ApiError> {
        self.begin("get_address")?.address(address_id).cloned()
    }

    async fn create_address(&self, input: &AddressInput) -> Result<Address, ApiError> {
        let mut state = self.begin("create_address")?;
        let address_id = AddressId::new(state.next_address_id);
        state.next_address_id += 1;

        let is_default = input.is_default || state.addresses.is_empty();
        if is_default {
            for address in &mut state.addresses {
                address.is_default = false;
            }
        }
        let address = address_from_input(address_id, input, is_default);
        state.addresses.push(address.clone());
        Ok(address)
    }

    async fn update_address(
        &self,
        address_id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        let mut state = self.begin("update_address")?;
        state.address(address_id)?;
        if input.is_default {
            for address in &mut state.addresses {
                address.is_default = false;
            }
        }
        let updated = address_from_input(address_id, input, input.is_default);
        for address in &mut state.addresses {
            if address.address_id == address_id {
                *address = updated.clone();
            }
        }
        Ok(updated)
    }

    async fn delete_address(&self, address_id: AddressId) -> Result<(), ApiError> {
        let mut state = self.begin("delete_address")?;
        state.address(address_id)?;
        state.addresses.retain(|a| a.address_id != address_id);
        Ok(())
    }

    async fn set_default_address(&self, address_id: AddressId) -> Result<(), ApiError> {
        let mut state = self.begin("set_default_address")?;
        state.address(address_id)?;
        for address in &mut state.addresses {
            address.is_default = address.address_id == address_id;
        }
        Ok(())
    }
}

fn address_from_input(address_id: AddressId, input: &AddressInput, is_default: bool) -> Address {
    Address {
        address_id,
        province_id: input.province_id,
        city_id: input.city_id,
        barangay_id: input.barangay_id,
        additional_info: input.additional_info.clone(),
        phone_number: input.phone_number.clone(),
        is_default,
        latitude: Some(input.latitude),
        longitude: Some(input.longitude),
        province_name: None,
        city_name: None,
        barangay_name: None,
    }
}

#[async_trait]
impl LocationApi for FakeBackend {
    async fn list_provinces(&self) -> Result<Vec<Province>, ApiError> {
        Ok(self.begin("list_provinces")?.provinces.clone())
    }

    async fn list_cities(&self, province_id: ProvinceId) -> Result<Vec<City>, ApiError> {
        let delay = self.begin("list_cities")?.city_delays.get(&province_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .lock()
            .cities
            .get(&province_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_barangays(&self, city_id: CityId) -> Result<Vec<Barangay>, ApiError> {
        let delay = self
            .begin("list_barangays")?
            .barangay_delays
            .get(&city_id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .lock()
            .barangays
            .get(&city_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl StoreApi for FakeBackend {
    async fn list_stores(&self, search: Option<&str>) -> Result<Vec<Store>, ApiError> {
        let state = self.begin("list_stores")?;
        let needle = search.map(str::to_lowercase).unwrap_or_default();
        Ok(state
            .stores
            .iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn get_store(&self, store_id: StoreId) -> Result<Store, ApiError> {
        self.begin("get_store")?
            .stores
            .iter()
            .find(|s| s.store_id == store_id)
            .cloned()
            .ok_or_else(|| rejected(404, "Store not found"))
    }
}
