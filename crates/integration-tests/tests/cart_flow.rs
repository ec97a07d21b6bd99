//! Cart synchronization through the HTTP client.

#![allow(clippy::unwrap_used)]

use palengke_core::ProductId;
use palengke_integration_tests::StubServer;
use palengke_storefront::{StoreError, Storefront};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_add_then_snapshot_matches_server() {
    let server = StubServer::start().await;
    let storefront = Storefront::connect(&server.config()).unwrap();

    storefront.cart().refresh().await.unwrap();
    assert!(storefront.cart().is_empty());

    storefront.cart().add(ProductId::new(7), 2).await.unwrap();
    storefront.cart().add(ProductId::new(9), 1).await.unwrap();

    let cart = storefront.cart().snapshot();
    assert_eq!(storefront.cart().count(), 3);
    assert_eq!(cart.subtotal, Decimal::new(10325, 2));
    assert_eq!(cart.line_total_sum(), cart.subtotal);
    assert_eq!(
        cart.item(ProductId::new(7)).unwrap().unit_price,
        Decimal::new(4550, 2)
    );
}

#[tokio::test]
async fn test_server_detail_surfaces_as_remote_error() {
    let server = StubServer::start().await;
    let storefront = Storefront::connect(&server.config()).unwrap();
    storefront.cart().add(ProductId::new(11), 2).await.unwrap();

    let err = storefront
        .cart()
        .add(ProductId::new(11), 5)
        .await
        .unwrap_err();

    assert_eq!(err, StoreError::Remote("Insufficient stock".to_string()));
    assert_eq!(storefront.cart().count(), 2);
}

#[tokio::test]
async fn test_set_quantity_remove_and_clear() {
    let server = StubServer::start().await;
    let storefront = Storefront::connect(&server.config()).unwrap();
    let cart = storefront.cart();

    cart.add(ProductId::new(7), 1).await.unwrap();
    cart.add(ProductId::new(9), 1).await.unwrap();
    cart.set_quantity(ProductId::new(9), 6).await.unwrap();
    assert_eq!(cart.count(), 7);

    cart.remove(ProductId::new(7)).await.unwrap();
    assert_eq!(cart.count(), 6);
    assert!(cart.snapshot().item(ProductId::new(7)).is_none());

    let err = cart.remove(ProductId::new(7)).await.unwrap_err();
    assert_eq!(err, StoreError::Remote("Item not in cart".to_string()));

    cart.clear().await.unwrap();
    assert!(cart.is_empty());
    assert_eq!(cart.subtotal(), Decimal::ZERO);
}

#[tokio::test]
async fn test_two_contexts_converge_on_refresh() {
    let server = StubServer::start().await;
    let phone = Storefront::connect(&server.config()).unwrap();
    let laptop = Storefront::connect(&server.config()).unwrap();

    phone.cart().add(ProductId::new(9), 3).await.unwrap();
    assert_eq!(laptop.cart().count(), 0);

    laptop.cart().refresh().await.unwrap();
    assert_eq!(laptop.cart().snapshot(), phone.cart().snapshot());
}
