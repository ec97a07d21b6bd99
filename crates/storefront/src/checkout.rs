//! Multi-step checkout pipeline.
//!
//! # Steps
//!
//! ```text
//! Empty ──set_address──▶ AddressSet ──set_shipping──▶ ShippingSet ──place_order──▶ Placed
//!   │                        ▲  ▲                          │                          │
//!   │                        │  └────────set_address───────┘                          │
//!   │                        └───────────set_shipping (correction)                    │
//!   └──────────────────────confirm_payment (redirect landing)────────────▶ Confirmed ◀┘
//! ```
//!
//! Re-running an earlier step clears everything that depended on it: a new
//! address drops the shipping choice and fee, a new shipping choice drops the
//! previous fee before the backend is asked for the new one.
//!
//! Every step records a session revision before its backend call and only
//! applies the response if the revision is unchanged when it lands. While an
//! order is being placed, address and shipping changes are rejected, and an
//! address response that lands after the order is placed is rejected too.
//!
//! # Payment confirmation
//!
//! Confirmations are recorded per order. Repeating a confirmation with the
//! same `(order_id, transaction_id)` returns the recorded result without
//! calling the backend or clearing the cart again. A different transaction
//! for an already-confirmed order is rejected. Confirmations run one at a
//! time, so a duplicate that overlaps the first waits for it and then gets
//! the recorded result.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use palengke_core::{AddressId, CheckoutStep, DeliveryMethod, OrderId, PaymentMethod, StoreId};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::{
    CheckoutApi, CheckoutDetails, PaymentConfirmation, PlacedOrder, ShippingSelection, Store,
    StoreApi,
};
use crate::cart::CartStore;
use crate::error::{Result, StoreError, add_breadcrumb, report};

/// Public view of the checkout session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutState {
    pub step: CheckoutStep,
    pub address_id: Option<AddressId>,
    pub delivery_method: Option<DeliveryMethod>,
    pub store_id: Option<StoreId>,
    pub shipping_fee: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub order: Option<PlacedOrder>,
}

impl CheckoutState {
    /// Rebuild local state from the backend's session details.
    fn from_details(details: CheckoutDetails) -> Self {
        let shipping_ready = details.address_id.is_some()
            && details.delivery_method.is_some()
            && details.shipping_fee.is_some();

        let step = if shipping_ready {
            CheckoutStep::ShippingSet
        } else if details.address_id.is_some() {
            CheckoutStep::AddressSet
        } else {
            CheckoutStep::Empty
        };

        if shipping_ready {
            Self {
                step,
                address_id: details.address_id,
                delivery_method: details.delivery_method,
                store_id: details.store_id,
                shipping_fee: details.shipping_fee,
                payment_method: details.payment_method,
                order: None,
            }
        } else {
            Self {
                step,
                address_id: details.address_id,
                ..Self::default()
            }
        }
    }

    fn clear_shipping(&mut self) {
        self.step = CheckoutStep::AddressSet;
        self.delivery_method = None;
        self.store_id = None;
        self.shipping_fee = None;
        self.payment_method = None;
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current: CheckoutState,
    /// Bumped by every step that replaces or invalidates the session.
    revision: u64,
    /// An order submission is in flight.
    placing: bool,
    confirmations: HashMap<OrderId, PaymentConfirmation>,
}

impl SessionState {
    /// Address and shipping may change until an order is placed or in flight.
    const fn is_open(&self) -> bool {
        !self.placing && matches!(
            self.current.step,
            CheckoutStep::Empty | CheckoutStep::AddressSet | CheckoutStep::ShippingSet
        )
    }

    fn closed_error(&self, operation: &'static str) -> StoreError {
        let current = if self.placing {
            "an order in flight".to_string()
        } else {
            self.current.step.to_string()
        };
        StoreError::invalid_state(
            operation,
            format!("a checkout that is not yet placed (currently {current})"),
        )
    }
}

/// Clears the in-flight order flag when dropped.
struct PlacingGuard<'a>(&'a CheckoutSession);

impl Drop for PlacingGuard<'_> {
    fn drop(&mut self) {
        self.0.write(|s| s.placing = false);
    }
}

/// The customer's checkout session.
pub struct CheckoutSession {
    api: Arc<dyn CheckoutApi>,
    stores: Arc<dyn StoreApi>,
    cart: Arc<CartStore>,
    state: RwLock<SessionState>,
    confirming: Mutex<()>,
}

impl CheckoutSession {
    #[must_use]
    pub fn new(api: Arc<dyn CheckoutApi>, stores: Arc<dyn StoreApi>, cart: Arc<CartStore>) -> Self {
        Self {
            api,
            stores,
            cart,
            state: RwLock::new(SessionState::default()),
            confirming: Mutex::new(()),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.state.write().unwrap_or_else(PoisonError::into_inner))
    }

    /// Snapshot of the session.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        self.read(|s| s.current.clone())
    }

    #[must_use]
    pub fn step(&self) -> CheckoutStep {
        self.read(|s| s.current.step)
    }

    #[must_use]
    pub fn shipping_fee(&self) -> Option<Decimal> {
        self.read(|s| s.current.shipping_fee)
    }

    /// The order placed in this session, if any.
    #[must_use]
    pub fn order(&self) -> Option<PlacedOrder> {
        self.read(|s| s.current.order.clone())
    }

    // =========================================================================
    // Steps
    // =========================================================================

    /// Choose the delivery address.
    ///
    /// Allowed until the order is placed. On success any shipping choice and
    /// fee are dropped; they must be recomputed for the new address. A shipping
    /// fee still in flight when this is called is not applied.
    ///
    /// If a newer address, a reset, or a resume lands while this call is in
    /// flight, the response is not applied.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidState` once an order is placed or in
    /// flight, including when the order is placed while this call waits on
    /// the backend. Returns `StoreError::Remote` if the backend rejects the
    /// address. The session is unchanged on error.
    #[instrument(skip(self))]
    pub async fn set_address(&self, address_id: AddressId) -> Result<()> {
        let revision = self.write(|s| {
            if !s.is_open() {
                return Err(s.closed_error("set_address"));
            }
            s.revision += 1;
            Ok(s.revision)
        })?;

        self.api.set_address(address_id).await.map_err(|e| {
            let err = StoreError::remote(&e, "Failed to set delivery address");
            report(&err);
            err
        })?;

        let applied = self.write(|s| {
            if !s.is_open() {
                return Err(s.closed_error("set_address"));
            }
            if s.revision != revision {
                debug!(revision, current = s.revision, "Discarding superseded address");
                return Ok(false);
            }
            s.revision += 1;
            s.current = CheckoutState {
                step: CheckoutStep::AddressSet,
                address_id: Some(address_id),
                ..CheckoutState::default()
            };
            Ok(true)
        })?;

        if applied {
            let address = address_id.to_string();
            add_breadcrumb("checkout", "Address set", &[("address_id", address.as_str())]);
        }
        Ok(())
    }

    /// Choose delivery or pickup and fetch the shipping fee.
    ///
    /// The previous fee is cleared before the backend is called. If a newer
    /// address or shipping choice lands while this call is in flight, its
    /// result is returned but not applied.
    ///
    /// # Errors
    ///
    /// - `StoreError::Validation` if a store is missing for pickup or given
    ///   for delivery
    /// - `StoreError::InvalidState` before an address is set or after the
    ///   order is placed
    /// - `StoreError::Remote` if the backend rejects the choice
    #[instrument(skip(self))]
    pub async fn set_shipping(
        &self,
        method: DeliveryMethod,
        store_id: Option<StoreId>,
    ) -> Result<Decimal> {
        match (method.requires_store(), store_id) {
            (true, None) => {
                return Err(StoreError::validation("Please select a pickup store"));
            }
            (false, Some(_)) => {
                return Err(StoreError::validation(
                    "A store can only be chosen for pickup",
                ));
            }
            _ => {}
        }

        let revision = self.write(|s| {
            if s.placing
                || !matches!(
                    s.current.step,
                    CheckoutStep::AddressSet | CheckoutStep::ShippingSet
                )
            {
                return Err(StoreError::invalid_state(
                    "set_shipping",
                    CheckoutStep::AddressSet.to_string(),
                ));
            }
            s.revision += 1;
            s.current.clear_shipping();
            Ok(s.revision)
        })?;

        let selection = ShippingSelection {
            delivery_method: method,
            store_id,
        };
        let quote = self.api.set_shipping(&selection).await.map_err(|e| {
            let err = StoreError::remote(&e, "Failed to set shipping method");
            report(&err);
            err
        })?;

        self.write(|s| {
            if s.revision == revision {
                s.current.step = CheckoutStep::ShippingSet;
                s.current.delivery_method = Some(method);
                s.current.store_id = store_id;
                s.current.shipping_fee = Some(quote.shipping_fee);
            } else {
                debug!(revision, current = s.revision, "Discarding superseded shipping fee");
            }
        });

        add_breadcrumb("checkout", "Shipping set", &[("method", method.as_str())]);
        Ok(quote.shipping_fee)
    }

    /// Quote the shipping fee for the current address without changing the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidState` if no address is set, or
    /// `StoreError::Remote` if the backend cannot compute the fee.
    #[instrument(skip(self))]
    pub async fn quote_shipping(&self, method: DeliveryMethod) -> Result<Decimal> {
        let address_id = self
            .read(|s| {
                matches!(
                    s.current.step,
                    CheckoutStep::AddressSet | CheckoutStep::ShippingSet
                )
                .then_some(s.current.address_id)
                .flatten()
            })
            .ok_or_else(|| {
                StoreError::invalid_state("quote_shipping", CheckoutStep::AddressSet.to_string())
            })?;

        self.api
            .calculate_shipping(address_id, method)
            .await
            .map(|quote| quote.shipping_fee)
            .map_err(|e| StoreError::remote(&e, "Failed to calculate shipping fee"))
    }

    /// Submit the order.
    ///
    /// For cash payments the backend empties the cart at once, so the cart is
    /// refreshed. For online payments the cart is kept until the payment is
    /// confirmed and the returned order carries the redirect target.
    ///
    /// Address and shipping changes are rejected while the order is in
    /// flight. If the session is reset or resumed meanwhile, the order is
    /// returned but not recorded in the session; it can still be confirmed
    /// from the fresh session.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidState` unless shipping is set and no other
    /// order is in flight, or `StoreError::Remote` if the backend rejects the
    /// order.
    #[instrument(skip(self))]
    pub async fn place_order(&self, payment_method: PaymentMethod) -> Result<PlacedOrder> {
        let revision = self.write(|s| {
            if s.placing || s.current.step != CheckoutStep::ShippingSet {
                return Err(StoreError::invalid_state(
                    "place_order",
                    CheckoutStep::ShippingSet.to_string(),
                ));
            }
            s.placing = true;
            s.revision += 1;
            Ok(s.revision)
        })?;
        let placing = PlacingGuard(self);

        let order = self.api.place_order(payment_method).await.map_err(|e| {
            let err = StoreError::remote(&e, "Failed to place order");
            report(&err);
            err
        })?;

        let recorded = self.write(|s| {
            if s.revision != revision {
                return false;
            }
            s.revision += 1;
            s.current.step = CheckoutStep::Placed;
            s.current.payment_method = Some(payment_method);
            s.current.order = Some(order.clone());
            true
        });
        drop(placing);

        if !recorded {
            warn!(
                order_id = %order.order_id,
                "Checkout changed while the order was placed; order not recorded in this session"
            );
        }
        info!(
            order_id = %order.order_id,
            payment_method = %payment_method,
            redirect = order.redirect_url.is_some(),
            "Order placed"
        );

        if !payment_method.is_asynchronous()
            && let Err(err) = self.cart.refresh().await
        {
            warn!(error = %err, "Cart refresh after order failed");
        }

        Ok(order)
    }

    /// Confirm an out-of-band payment from the redirect landing page.
    ///
    /// Callable on a fresh session (the landing page may be a new process),
    /// right after placing the order, or again after a confirmation. On
    /// success the cart is cleared.
    ///
    /// # Errors
    ///
    /// - `StoreError::Validation` for an empty transaction id, a transaction
    ///   that differs from an earlier confirmation of the same order, or an
    ///   order that does not match the one placed in this session
    /// - `StoreError::InvalidState` while the checkout is still being filled in
    /// - `StoreError::Remote` if the backend rejects the confirmation
    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        order_id: OrderId,
        transaction_id: &str,
    ) -> Result<PaymentConfirmation> {
        let transaction_id = transaction_id.trim();
        if transaction_id.is_empty() {
            return Err(StoreError::validation("Invalid payment confirmation link."));
        }
        let _confirming = self.confirming.lock().await;

        let recorded = self.read(|s| {
            if let Some(confirmation) = s.confirmations.get(&order_id) {
                return Some(if confirmation.transaction_id == transaction_id {
                    Ok(confirmation.clone())
                } else {
                    Err(StoreError::validation(format!(
                        "Order {order_id} was already confirmed with a different transaction"
                    )))
                });
            }

            match s.current.step {
                CheckoutStep::AddressSet | CheckoutStep::ShippingSet => {
                    Some(Err(StoreError::invalid_state(
                        "confirm_payment",
                        CheckoutStep::Placed.to_string(),
                    )))
                }
                CheckoutStep::Placed
                    if s.current.order.as_ref().map(|o| o.order_id) != Some(order_id) =>
                {
                    Some(Err(StoreError::validation(
                        "Payment confirmation does not match the placed order",
                    )))
                }
                _ => None,
            }
        });
        if let Some(outcome) = recorded {
            if outcome.is_ok() {
                debug!(%order_id, "Payment already confirmed");
            }
            return outcome;
        }

        self.api
            .confirm_payment(order_id, transaction_id)
            .await
            .map_err(|e| {
                let err = StoreError::remote(&e, "Failed to confirm payment.");
                report(&err);
                err
            })?;

        let confirmation = PaymentConfirmation {
            order_id,
            transaction_id: transaction_id.to_string(),
            confirmed_at: Utc::now(),
        };
        self.write(|s| {
            s.confirmations.insert(order_id, confirmation.clone());
            s.revision += 1;
            s.current.step = CheckoutStep::Confirmed;
        });
        info!(%order_id, "Payment confirmed");

        if let Err(err) = self.cart.clear().await {
            warn!(%order_id, error = %err, "Failed to clear cart after payment");
        }

        Ok(confirmation)
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Rebuild the session from the backend (page reload).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the session cannot be fetched.
    #[instrument(skip(self))]
    pub async fn resume(&self) -> Result<CheckoutState> {
        let details = self
            .api
            .get_details()
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to load checkout details"))?;

        let state = CheckoutState::from_details(details);
        self.write(|s| {
            s.revision += 1;
            s.current = state.clone();
        });
        debug!(step = %state.step, "Checkout resumed");
        Ok(state)
    }

    /// Start over. Recorded payment confirmations are kept.
    pub fn reset(&self) {
        self.write(|s| {
            s.revision += 1;
            s.current = CheckoutState::default();
        });
    }

    /// Stores that accept pickup orders.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the list cannot be fetched.
    pub async fn pickup_stores(&self, search: Option<&str>) -> Result<Vec<Store>> {
        self.stores
            .list_stores(search)
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to load stores"))
    }

    /// A single pickup store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the store cannot be fetched.
    pub async fn store(&self, store_id: StoreId) -> Result<Store> {
        self.stores
            .get_store(store_id)
            .await
            .map_err(|e| StoreError::remote(&e, "Failed to load store"))
    }
}
