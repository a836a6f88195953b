//! Browsing, reviewing and checking out against the in-process backend.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use trendmart_core::{OrderStatus, Price, ProductId, ProductSort};
use trendmart_integration_tests::{PASSWORD, TestShop, product};
use trendmart_storefront::db::collections;
use trendmart_storefront::db::products::ProductFilter;
use trendmart_storefront::services::catalog::{CatalogError, DEFAULT_RELATED_LIMIT};
use trendmart_storefront::services::checkout::CheckoutError;
use trendmart_storefront::services::reviews::ReviewError;

fn stocked_shop() -> TestShop {
    let shop = TestShop::new();
    shop.seed_products(&[
        product("p-tee", "Basic Tee", "19.99", "Tops"),
        product("p-hoodie", "Zip Hoodie", "54.50", "Tops"),
        product("p-socks", "Wool Socks", "5.00", "Accessories"),
        product("p-jacket", "Rain Jacket", "120.40", "Outerwear"),
    ]);
    shop
}

#[tokio::test]
async fn test_browse_catalog() {
    let shop = stocked_shop();
    let catalog = shop.state.catalog();

    assert_eq!(
        catalog.categories().await.unwrap(),
        ["Accessories", "Outerwear", "Tops"]
    );
    assert_eq!(catalog.max_price().await.unwrap(), Price::from_cents(12100));

    let tops = catalog
        .list_products(&ProductFilter {
            category: Some("Tops".to_owned()),
            sort: Some(ProductSort::PriceDesc),
            ..ProductFilter::default()
        })
        .await
        .unwrap();
    let names: Vec<&str> = tops.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Zip Hoodie", "Basic Tee"]);

    let tee = catalog.get_product(&ProductId::new("p-tee")).await.unwrap();
    let related = catalog
        .related_products(&tee, DEFAULT_RELATED_LIMIT)
        .await
        .unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(related[0].id.as_str(), "p-hoodie");

    let missing = catalog.get_product(&ProductId::new("p-gone")).await;
    assert!(matches!(missing, Err(CatalogError::NotFound(_))));
}

#[tokio::test]
async fn test_reviews_require_sign_in_and_valid_input() {
    let shop = stocked_shop();
    let reviews = shop.state.reviews();
    let tee = ProductId::new("p-tee");

    let anonymous = reviews.submit_review(&tee, 5, "Great fit").await;
    assert!(matches!(anonymous, Err(ReviewError::NotAuthenticated)));

    shop.session()
        .sign_up("sam@example.com", PASSWORD, "sam")
        .await
        .unwrap();

    let zero = reviews.submit_review(&tee, 0, "Meh").await;
    assert!(matches!(zero, Err(ReviewError::InvalidRating(0))));
    let six = reviews.submit_review(&tee, 6, "Wow").await;
    assert!(matches!(six, Err(ReviewError::InvalidRating(6))));
    let blank = reviews.submit_review(&tee, 4, "   ").await;
    assert!(matches!(blank, Err(ReviewError::EmptyComment)));

    assert!(reviews.list_reviews(&tee).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_review_returns_refreshed_list() {
    let shop = stocked_shop();
    let reviews = shop.state.reviews();
    let tee = ProductId::new("p-tee");
    let user = shop
        .session()
        .sign_up("tara@example.com", PASSWORD, "tara")
        .await
        .unwrap();

    let first = reviews.submit_review(&tee, 4, "  Soft and light  ").await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].comment, "Soft and light");
    assert_eq!(first[0].rating, 4);
    assert_eq!(first[0].user_id, user.id);

    let second = reviews.submit_review(&tee, 5, "Bought another").await.unwrap();
    assert_eq!(second.len(), 2);
    assert!(second.iter().any(|r| r.comment == "Bought another"));

    assert!(
        reviews
            .list_reviews(&ProductId::new("p-socks"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_checkout_turns_cart_into_pending_order() {
    let shop = stocked_shop();
    let checkout = shop.state.checkout();
    let cart = shop.state.cart();
    let catalog = shop.state.catalog();

    assert!(matches!(
        checkout.place_order().await,
        Err(CheckoutError::NotAuthenticated)
    ));

    let user = shop
        .session()
        .sign_up("uma@example.com", PASSWORD, "uma")
        .await
        .unwrap();
    assert!(matches!(
        checkout.place_order().await,
        Err(CheckoutError::EmptyCart)
    ));

    let tee = catalog.get_product(&ProductId::new("p-tee")).await.unwrap();
    let socks = catalog.get_product(&ProductId::new("p-socks")).await.unwrap();
    cart.add_item(&tee);
    cart.add_item(&socks);
    cart.update_quantity(&tee.id, 2);

    let order = checkout.place_order().await.unwrap();

    assert_eq!(order.user_id, user.id);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_price, Price::from_cents(4498));
    assert!(cart.is_empty());

    let items = checkout.order_items(&order).await.unwrap();
    assert_eq!(items.len(), 2);
    let tee_line = items.iter().find(|i| i.product_id == tee.id).unwrap();
    assert_eq!(tee_line.quantity, 2);
    assert_eq!(tee_line.price, Price::from_cents(1999));

    let history = checkout.order_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, order.id);
    assert_eq!(shop.store.rows(collections::ORDER_ITEMS).len(), 2);
}

#[tokio::test]
async fn test_order_items_are_private_to_their_owner() {
    let shop = stocked_shop();
    let session = shop.session();
    let checkout = shop.state.checkout();

    session
        .sign_up("vic@example.com", PASSWORD, "vic")
        .await
        .unwrap();
    shop.state
        .cart()
        .add_item(&product("p-socks", "Wool Socks", "5.00", "Accessories"));
    let order = checkout.place_order().await.unwrap();
    session.sign_out().await.unwrap();

    session
        .sign_up("wen@example.com", PASSWORD, "wen")
        .await
        .unwrap();
    assert!(checkout.order_history().await.unwrap().is_empty());
    assert!(matches!(
        checkout.order_items(&order).await,
        Err(CheckoutError::NotAuthenticated)
    ));
}
