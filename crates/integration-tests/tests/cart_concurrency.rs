//! Integration tests for concurrent access to one cart.
//!
//! Mutations of the same cart serialize on the service's per-cart lock, so a
//! pair of racing adds must fold into one row with the summed quantity -
//! never two rows, never a lost update.

use std::sync::Arc;

use verdant_cart::store::CartStore;
use verdant_cart::RequestIdentity;
use verdant_integration_tests::{fresh_token, TestContext, TOOTHBRUSH, TWINE};

#[tokio::test]
async fn test_two_concurrent_adds_fold_into_one_row() {
    let ctx = TestContext::new();
    let cart = ctx
        .service
        .resolve(&RequestIdentity::guest(fresh_token()))
        .await
        .expect("resolve");

    let a = {
        let service = Arc::clone(&ctx.service);
        let cart = cart.clone();
        tokio::spawn(async move { service.add_item(&cart, TOOTHBRUSH, 1).await })
    };
    let b = {
        let service = Arc::clone(&ctx.service);
        let cart = cart.clone();
        tokio::spawn(async move { service.add_item(&cart, TOOTHBRUSH, 1).await })
    };

    a.await.expect("task").expect("add");
    b.await.expect("task").expect("add");

    let items = ctx.store.items(cart.id).await.expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items.first().map(|i| i.quantity), Some(2));
}

#[tokio::test]
async fn test_many_concurrent_adds_never_lose_an_update() {
    let ctx = TestContext::new();
    let cart = ctx
        .service
        .resolve(&RequestIdentity::guest(fresh_token()))
        .await
        .expect("resolve");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&ctx.service);
        let cart = cart.clone();
        tasks.push(tokio::spawn(async move {
            service.add_item(&cart, TWINE, 1).await
        }));
    }
    for task in tasks {
        task.await.expect("task").expect("add");
    }

    let items = ctx.store.items(cart.id).await.expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items.first().map(|i| i.quantity), Some(8));
}

#[tokio::test]
async fn test_concurrent_adds_to_different_carts_are_independent() {
    let ctx = TestContext::new();
    let first = ctx
        .service
        .resolve(&RequestIdentity::guest(fresh_token()))
        .await
        .expect("resolve");
    let second = ctx
        .service
        .resolve(&RequestIdentity::guest(fresh_token()))
        .await
        .expect("resolve");

    let a = {
        let service = Arc::clone(&ctx.service);
        let cart = first.clone();
        tokio::spawn(async move { service.add_item(&cart, TOOTHBRUSH, 2).await })
    };
    let b = {
        let service = Arc::clone(&ctx.service);
        let cart = second.clone();
        tokio::spawn(async move { service.add_item(&cart, TOOTHBRUSH, 3).await })
    };

    a.await.expect("task").expect("add");
    b.await.expect("task").expect("add");

    let first_items = ctx.store.items(first.id).await.expect("items");
    let second_items = ctx.store.items(second.id).await.expect("items");
    assert_eq!(first_items.first().map(|i| i.quantity), Some(2));
    assert_eq!(second_items.first().map(|i| i.quantity), Some(3));
}

#[tokio::test]
async fn test_concurrent_resolves_create_one_cart() {
    let ctx = TestContext::new();
    let identity = RequestIdentity::guest(fresh_token());

    let a = {
        let service = Arc::clone(&ctx.service);
        let identity = identity.clone();
        tokio::spawn(async move { service.resolve(&identity).await })
    };
    let b = {
        let service = Arc::clone(&ctx.service);
        let identity = identity.clone();
        tokio::spawn(async move { service.resolve(&identity).await })
    };

    let first = a.await.expect("task").expect("resolve");
    let second = b.await.expect("task").expect("resolve");
    assert_eq!(first.id, second.id);
}
