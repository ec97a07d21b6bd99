//! Smoke tests against a real backend.
//!
//! Run with `cargo test -p palengke-integration-tests -- --ignored` after
//! setting `PALENGKE_API_BASE_URL` and `PALENGKE_API_TOKEN`.

#![allow(clippy::unwrap_used)]

use palengke_storefront::Storefront;
use palengke_storefront::config::StorefrontConfig;

fn live_storefront() -> Storefront {
    let config = StorefrontConfig::from_env().unwrap();
    Storefront::connect(&config).unwrap()
}

#[tokio::test]
#[ignore = "requires a running backend (PALENGKE_API_BASE_URL)"]
async fn test_live_cart_snapshot_is_consistent() {
    let storefront = live_storefront();
    storefront.cart().refresh().await.unwrap();

    let cart = storefront.cart().snapshot();
    assert_eq!(cart.line_total_sum(), cart.subtotal);
}

#[tokio::test]
#[ignore = "requires a running backend (PALENGKE_API_BASE_URL)"]
async fn test_live_location_cascade() {
    let storefront = live_storefront();
    let cascade = storefront.location_cascade();
    cascade.load_provinces().await.unwrap();

    let Some(province) = cascade.provinces().into_iter().next() else {
        return;
    };
    cascade.select_province(province.id).await.unwrap();
    assert_eq!(cascade.draft().province_id, Some(province.id));
}

#[tokio::test]
#[ignore = "requires a running backend (PALENGKE_API_BASE_URL)"]
async fn test_live_pickup_stores() {
    let storefront = live_storefront();
    let stores = storefront.checkout().pickup_stores(None).await.unwrap();
    for store in stores {
        assert!(!store.name.is_empty());
    }
}
