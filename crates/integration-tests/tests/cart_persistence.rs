//! Cart store behavior through durable storage.

#![allow(clippy::unwrap_used)]

use tempfile::TempDir;

use trendmart_core::{Price, ProductId};
use trendmart_integration_tests::{TestShop, product};
use trendmart_storefront::cart::{CartStorage, CartStore, FileCartStorage};

fn cart_in(dir: &TempDir) -> CartStore {
    CartStore::with_storage(FileCartStorage::new(dir.path().join("cart.json")))
}

#[test]
fn test_cart_survives_restart() {
    let dir = TempDir::new().unwrap();
    let tee = product("p-tee", "Basic Tee", "19.99", "Tops");
    let socks = product("p-socks", "Wool Socks", "5.00", "Accessories");

    {
        let cart = cart_in(&dir);
        assert!(cart.add_item(&tee));
        assert!(cart.add_item(&socks));
        cart.update_quantity(&tee.id, 2);
    }

    let restored = cart_in(&dir);
    let items = restored.items();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["p-tee", "p-socks"]);
    assert_eq!(restored.item_count(), 3);
    assert_eq!(restored.total_price(), Price::from_cents(4498));
    assert_eq!(
        restored.find_item(&tee.id).unwrap().image,
        "https://img.trendmart.shop/p-tee.jpg"
    );
}

#[test]
fn test_cleared_cart_is_saved_empty() {
    let dir = TempDir::new().unwrap();
    let cart = cart_in(&dir);
    cart.add_item(&product("p1", "Cap", "12.00", "Accessories"));
    cart.clear_cart();

    let saved = FileCartStorage::new(dir.path().join("cart.json"))
        .load()
        .unwrap()
        .unwrap();
    assert!(saved.is_empty());
    assert!(cart_in(&dir).is_empty());
}

#[test]
fn test_unreadable_saved_cart_starts_empty() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("cart.json"), b"{ not json").unwrap();

    let cart = cart_in(&dir);
    assert!(cart.is_empty());

    // The next mutation overwrites the broken file.
    cart.add_item(&product("p1", "Cap", "12.00", "Accessories"));
    assert_eq!(cart_in(&dir).item_count(), 1);
}

#[test]
fn test_quantity_edits_and_removal() {
    let cart = CartStore::new();
    let jacket = product("p-jacket", "Rain Jacket", "120.40", "Outerwear");
    cart.add_item(&jacket);

    // Adding again leaves the line alone.
    assert!(!cart.add_item(&jacket));
    assert_eq!(cart.item_count(), 1);

    cart.update_quantity(&jacket.id, 3);
    assert_eq!(cart.total_price(), Price::from_cents(36120));

    cart.update_quantity(&ProductId::new("unknown"), 4);
    assert_eq!(cart.items().len(), 1);

    cart.update_quantity(&jacket.id, -1);
    assert!(cart.is_empty());
    assert_eq!(cart.total_price(), Price::ZERO);
}

#[tokio::test]
async fn test_subscribers_see_each_change() {
    let shop = TestShop::new();
    let cart = shop.state.cart();
    let mut changes = cart.subscribe();
    let tee = product("p-tee", "Basic Tee", "19.99", "Tops");

    cart.add_item(&tee);
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().item_count(), 1);

    // No-op mutations do not notify.
    cart.add_item(&tee);
    cart.update_quantity(&tee.id, 1);
    assert!(!changes.has_changed().unwrap());

    cart.remove_item(&tee.id);
    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().is_empty());
}
