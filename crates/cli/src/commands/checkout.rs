//! Checkout commands.

use palengke_core::{AddressId, DeliveryMethod, OrderId, PaymentMethod, Price, StoreId};
use palengke_storefront::Storefront;
use palengke_storefront::error::Result;

/// Run address → shipping → order in one go.
pub async fn run(
    storefront: &Storefront,
    address: AddressId,
    method: DeliveryMethod,
    store: Option<StoreId>,
    payment: PaymentMethod,
) -> Result<()> {
    storefront.cart().refresh().await?;
    tracing::info!(
        "Cart: {} item(s), subtotal {}",
        storefront.cart().count(),
        Price::php(storefront.cart().subtotal())
    );

    let checkout = storefront.checkout();
    checkout.set_address(address).await?;
    let fee = checkout.set_shipping(method, store).await?;
    tracing::info!("Shipping ({method}): {}", Price::php(fee));

    let order = checkout.place_order(payment).await?;
    match order.total {
        Some(total) => tracing::info!("Order {} placed, total {}", order.order_id, Price::php(total)),
        None => tracing::info!("Order {} placed", order.order_id),
    }
    if let Some(url) = &order.redirect_url {
        tracing::info!("Complete payment at: {url}");
        tracing::info!(
            "Then run: palengke confirm --order {} --transaction <id>",
            order.order_id
        );
    }
    Ok(())
}

pub async fn confirm(storefront: &Storefront, order: OrderId, transaction: &str) -> Result<()> {
    let confirmation = storefront
        .checkout()
        .confirm_payment(order, transaction)
        .await?;
    tracing::info!(
        "Payment for order {} confirmed at {}",
        confirmation.order_id,
        confirmation.confirmed_at.to_rfc3339()
    );
    Ok(())
}

pub async fn stores(storefront: &Storefront, search: Option<&str>) -> Result<()> {
    let stores = storefront.checkout().pickup_stores(search).await?;
    if stores.is_empty() {
        tracing::info!("No stores found");
    }
    for store in stores {
        tracing::info!(
            "{:>4}  {}  {}",
            store.store_id,
            store.name,
            store.address.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
