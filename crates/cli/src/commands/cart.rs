//! Cart commands.
//!
//! Every mutation goes through `CartStore`, so the printed cart is always the
//! backend's snapshot taken right after the change.

use palengke_core::{Price, ProductId};
use palengke_storefront::Storefront;
use palengke_storefront::cart::CartStore;
use palengke_storefront::error::Result;

/// Log the current cart snapshot.
fn print(cart: &CartStore) {
    let snapshot = cart.snapshot();
    if snapshot.is_empty() {
        tracing::info!("Cart is empty");
        return;
    }

    for item in &snapshot.items {
        tracing::info!(
            "{:>6}  {:<32} x{:<3} {:>12}",
            item.product_id,
            item.product_name.as_deref().unwrap_or("-"),
            item.quantity,
            Price::php(item.line_total).display()
        );
    }
    tracing::info!(
        "{} item(s)  subtotal {}  total {}",
        cart.count(),
        Price::php(snapshot.subtotal),
        Price::php(snapshot.total)
    );
}

pub async fn show(storefront: &Storefront) -> Result<()> {
    storefront.cart().refresh().await?;
    print(storefront.cart());
    Ok(())
}

pub async fn add(storefront: &Storefront, product: ProductId, quantity: u32) -> Result<()> {
    storefront.cart().add(product, quantity).await?;
    print(storefront.cart());
    Ok(())
}

pub async fn set(storefront: &Storefront, product: ProductId, quantity: u32) -> Result<()> {
    storefront.cart().set_quantity(product, quantity).await?;
    print(storefront.cart());
    Ok(())
}

pub async fn remove(storefront: &Storefront, product: ProductId) -> Result<()> {
    storefront.cart().remove(product).await?;
    print(storefront.cart());
    Ok(())
}

pub async fn clear(storefront: &Storefront) -> Result<()> {
    storefront.cart().clear().await?;
    tracing::info!("Cart cleared");
    Ok(())
}
