//! Cached cart with fetch-after-write mutations.
//!
//! The backend owns the cart. [`CartStore`] keeps the last snapshot it
//! fetched and replaces it wholesale after every successful mutation; it
//! never patches the snapshot locally. A failed fetch leaves an empty cart
//! rather than stale lines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use palengke_core::ProductId;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use crate::api::{ApiError, Cart, CartApi};
use crate::error::{Result, StoreError, add_breadcrumb, report};

/// Counts in-flight cart calls for [`CartStore::is_loading`].
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The customer's cart.
///
/// Concurrent mutations are not serialized: two overlapping calls each
/// refresh, and whichever refresh lands last wins.
pub struct CartStore {
    api: Arc<dyn CartApi>,
    snapshot: RwLock<Cart>,
    in_flight: AtomicUsize,
}

impl CartStore {
    /// Create a store with an empty snapshot. Call [`refresh`](Self::refresh)
    /// to load the backend cart.
    #[must_use]
    pub fn new(api: Arc<dyn CartApi>) -> Self {
        Self {
            api,
            snapshot: RwLock::new(Cart::empty()),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn replace(&self, cart: Cart) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = cart;
    }

    fn read<R>(&self, f: impl FnOnce(&Cart) -> R) -> R {
        f(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    // =========================================================================
    // Read Side
    // =========================================================================

    /// A copy of the latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.read(Clone::clone)
    }

    /// Total quantity across all lines, derived from the latest snapshot.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.read(Cart::item_count)
    }

    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.read(|cart| cart.subtotal)
    }

    /// Server-computed total; may include fees not itemized in the cart.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.read(|cart| cart.total)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(Cart::is_empty)
    }

    /// Whether any cart call is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Replace the snapshot with the backend cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the cart cannot be fetched. The
    /// snapshot is then empty.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<()> {
        let _loading = LoadingGuard::enter(&self.in_flight);

        match self.api.get_cart().await {
            Ok(cart) => {
                let line_sum = cart.line_total_sum();
                if line_sum != cart.subtotal {
                    warn!(
                        subtotal = %cart.subtotal,
                        line_sum = %line_sum,
                        "Cart subtotal does not match line totals"
                    );
                }
                debug!(lines = cart.items.len(), count = cart.item_count(), "Cart refreshed");
                self.replace(cart);
                Ok(())
            }
            Err(e) => {
                self.replace(Cart::empty());
                let err = StoreError::remote(&e, "Failed to load cart");
                report(&err);
                Err(err)
            }
        }
    }

    /// Drop the local snapshot without calling the backend (sign-out).
    pub fn discard(&self) {
        self.replace(Cart::empty());
    }

    /// Finish a mutation: on success, re-read the cart.
    ///
    /// A failed follow-up refresh does not fail the mutation; the snapshot is
    /// already empty and the next refresh will recover it.
    async fn settle(
        &self,
        action: &str,
        result: std::result::Result<(), ApiError>,
        fallback: &str,
    ) -> Result<()> {
        if let Err(e) = result {
            let err = StoreError::remote(&e, fallback);
            report(&err);
            return Err(err);
        }

        if let Err(err) = self.refresh().await {
            warn!(action, error = %err, "Cart mutation succeeded but refresh failed");
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add `quantity` units of a product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` for a zero quantity, or
    /// `StoreError::Remote` if the backend rejects the change.
    #[instrument(skip(self))]
    pub async fn add(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(StoreError::validation("Quantity must be at least 1"));
        }
        let _loading = LoadingGuard::enter(&self.in_flight);

        let (product, quantity_str) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Add item",
            &[("product_id", product.as_str()), ("quantity", quantity_str.as_str())],
        );
        let result = self.api.add_item(product_id, quantity).await;
        self.settle("add", result, "Failed to add to cart").await
    }

    /// Set the quantity of a product already in the cart.
    ///
    /// Use [`remove`](Self::remove) to delete a line.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` for a zero quantity, or
    /// `StoreError::Remote` if the backend rejects the change.
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            return Err(StoreError::validation(
                "Quantity must be at least 1; remove the item instead",
            ));
        }
        let _loading = LoadingGuard::enter(&self.in_flight);

        let (product, quantity_str) = (product_id.to_string(), quantity.to_string());
        add_breadcrumb(
            "cart",
            "Update quantity",
            &[("product_id", product.as_str()), ("quantity", quantity_str.as_str())],
        );
        let result = self.api.update_item(product_id, quantity).await;
        self.settle("set_quantity", result, "Failed to update cart")
            .await
    }

    /// Delete a product's line.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the backend rejects the change.
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: ProductId) -> Result<()> {
        let _loading = LoadingGuard::enter(&self.in_flight);

        let product = product_id.to_string();
        add_breadcrumb("cart", "Remove item", &[("product_id", product.as_str())]);
        let result = self.api.remove_item(product_id).await;
        self.settle("remove", result, "Failed to remove item").await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Remote` if the backend rejects the change.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let _loading = LoadingGuard::enter(&self.in_flight);

        add_breadcrumb("cart", "Clear cart", &[]);
        let result = self.api.clear_cart().await;
        self.settle("clear", result, "Failed to clear cart").await
    }
}
