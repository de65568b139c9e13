//! In-memory cart store.
//!
//! Intended for tests and development. Every method takes the store-wide
//! lock, so each call is atomic; cross-call sequences are serialized by the
//! service's per-cart locks.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use verdant_core::{CartId, LineItemId, ProductId};

use crate::models::{Cart, CartOwner, LineItem};

use super::{CartStore, MergeOp, StoreError};

#[derive(Debug, Default)]
struct Inner {
    next_cart_id: i32,
    next_item_id: i32,
    carts: HashMap<CartId, Cart>,
    owners: HashMap<CartOwner, CartId>,
    // BTreeMap keeps iteration in id order, which is added order.
    items: BTreeMap<LineItemId, LineItem>,
}

impl Inner {
    fn item_ids_of(&self, cart: CartId) -> Vec<LineItemId> {
        self.items
            .values()
            .filter(|item| item.cart_id == cart)
            .map(|item| item.id)
            .collect()
    }

    fn product_of(&self, cart: CartId, product: ProductId) -> Option<LineItemId> {
        self.items
            .values()
            .find(|item| item.cart_id == cart && item.product_id == product)
            .map(|item| item.id)
    }

    fn touch(&mut self, cart: CartId) {
        if let Some(cart) = self.carts.get_mut(&cart) {
            cart.updated_at = Utc::now();
        }
    }
}

/// In-memory cart store.
#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    inner: RwLock<Inner>,
}

impl InMemoryCartStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_owned()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_owned()))
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .owners
            .get(owner)
            .and_then(|id| inner.carts.get(id))
            .cloned())
    }

    async fn find_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, StoreError> {
        let mut inner = self.write()?;
        if let Some(cart) = inner.owners.get(owner).and_then(|id| inner.carts.get(id)) {
            return Ok(cart.clone());
        }

        inner.next_cart_id += 1;
        let now = Utc::now();
        let cart = Cart {
            id: CartId::new(inner.next_cart_id),
            owner: owner.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.owners.insert(owner.clone(), cart.id);
        inner.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn items(&self, cart: CartId) -> Result<Vec<LineItem>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .items
            .values()
            .filter(|item| item.cart_id == cart)
            .cloned()
            .collect())
    }

    async fn item(
        &self,
        cart: CartId,
        item: LineItemId,
    ) -> Result<Option<LineItem>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .items
            .get(&item)
            .filter(|row| row.cart_id == cart)
            .cloned())
    }

    async fn item_for_product(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> Result<Option<LineItem>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .items
            .values()
            .find(|item| item.cart_id == cart && item.product_id == product)
            .cloned())
    }

    async fn insert_item(
        &self,
        cart: CartId,
        product: ProductId,
        quantity: u32,
    ) -> Result<LineItem, StoreError> {
        if quantity == 0 {
            return Err(StoreError::Conflict(
                "line item quantity must be at least 1".to_owned(),
            ));
        }

        let mut inner = self.write()?;
        if !inner.carts.contains_key(&cart) {
            return Err(StoreError::Conflict(format!("no such cart {cart}")));
        }
        if inner.product_of(cart, product).is_some() {
            return Err(StoreError::Conflict(format!(
                "cart {cart} already has a line item for product {product}"
            )));
        }

        inner.next_item_id += 1;
        let item = LineItem {
            id: LineItemId::new(inner.next_item_id),
            cart_id: cart,
            product_id: product,
            quantity,
            added_at: Utc::now(),
        };
        inner.items.insert(item.id, item.clone());
        inner.touch(cart);
        Ok(item)
    }

    async fn set_item_quantity(
        &self,
        cart: CartId,
        item: LineItemId,
        quantity: u32,
    ) -> Result<Option<LineItem>, StoreError> {
        if quantity == 0 {
            return Err(StoreError::Conflict(
                "line item quantity must be at least 1".to_owned(),
            ));
        }

        let mut inner = self.write()?;
        let Some(row) = inner
            .items
            .get_mut(&item)
            .filter(|row| row.cart_id == cart)
        else {
            return Ok(None);
        };

        row.quantity = quantity;
        let updated = row.clone();
        inner.touch(cart);
        Ok(Some(updated))
    }

    async fn delete_item(&self, cart: CartId, item: LineItemId) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        let owned = inner
            .items
            .get(&item)
            .is_some_and(|row| row.cart_id == cart);
        if !owned {
            return Ok(false);
        }
        inner.items.remove(&item);
        inner.touch(cart);
        Ok(true)
    }

    async fn clear_items(&self, cart: CartId) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let ids = inner.item_ids_of(cart);
        let emptied = !ids.is_empty();
        for id in ids {
            inner.items.remove(&id);
        }
        if emptied {
            inner.touch(cart);
        }
        Ok(())
    }

    async fn commit_merge(
        &self,
        source: CartId,
        dest: CartId,
        ops: &[MergeOp],
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;

        if !inner.carts.contains_key(&source) {
            return Err(StoreError::Conflict(format!("no such cart {source}")));
        }
        if !inner.carts.contains_key(&dest) {
            return Err(StoreError::Conflict(format!("no such cart {dest}")));
        }

        // Validate the whole plan against current state before touching it.
        let mut covered: HashSet<LineItemId> = HashSet::new();
        for op in ops {
            match op {
                MergeOp::Move { item } => {
                    let row = inner
                        .items
                        .get(item)
                        .filter(|row| row.cart_id == source)
                        .ok_or_else(|| {
                            StoreError::Conflict(format!("source item {item} is gone"))
                        })?;
                    if inner.product_of(dest, row.product_id).is_some() {
                        return Err(StoreError::Conflict(format!(
                            "destination already has product {}",
                            row.product_id
                        )));
                    }
                    if !covered.insert(*item) {
                        return Err(StoreError::Conflict(format!(
                            "source item {item} appears twice in the plan"
                        )));
                    }
                }
                MergeOp::Combine {
                    source: source_item,
                    dest: dest_item,
                    quantity,
                } => {
                    if *quantity == 0 {
                        return Err(StoreError::Conflict(
                            "combined quantity must be at least 1".to_owned(),
                        ));
                    }
                    let src_row = inner
                        .items
                        .get(source_item)
                        .filter(|row| row.cart_id == source)
                        .ok_or_else(|| {
                            StoreError::Conflict(format!("source item {source_item} is gone"))
                        })?;
                    let dest_row = inner
                        .items
                        .get(dest_item)
                        .filter(|row| row.cart_id == dest)
                        .ok_or_else(|| {
                            StoreError::Conflict(format!("destination item {dest_item} is gone"))
                        })?;
                    if src_row.product_id != dest_row.product_id {
                        return Err(StoreError::Conflict(format!(
                            "items {source_item} and {dest_item} reference different products"
                        )));
                    }
                    if !covered.insert(*source_item) {
                        return Err(StoreError::Conflict(format!(
                            "source item {source_item} appears twice in the plan"
                        )));
                    }
                }
            }
        }

        let uncovered = inner
            .item_ids_of(source)
            .into_iter()
            .any(|id| !covered.contains(&id));
        if uncovered {
            return Err(StoreError::Conflict(
                "merge plan does not cover all source items".to_owned(),
            ));
        }

        // Plan is consistent; apply it.
        for op in ops {
            match op {
                MergeOp::Move { item } => {
                    if let Some(row) = inner.items.get_mut(item) {
                        row.cart_id = dest;
                    }
                }
                MergeOp::Combine {
                    source: source_item,
                    dest: dest_item,
                    quantity,
                } => {
                    if let Some(row) = inner.items.get_mut(dest_item) {
                        row.quantity = *quantity;
                    }
                    inner.items.remove(source_item);
                }
            }
        }

        if let Some(cart) = inner.carts.remove(&source) {
            inner.owners.remove(&cart.owner);
        }
        inner.touch(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use verdant_core::{SessionToken, UserId};

    use super::*;

    fn guest(token: &str) -> CartOwner {
        CartOwner::Guest(SessionToken::parse(token).expect("valid token"))
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = InMemoryCartStore::new();
        let owner = guest("abc123");

        let first = store.find_or_create_cart(&owner).await.expect("create");
        let second = store.find_or_create_cart(&owner).await.expect("find");
        assert_eq!(first.id, second.id);

        let found = store.find_cart(&owner).await.expect("query");
        assert_eq!(found.map(|c| c.id), Some(first.id));
    }

    #[tokio::test]
    async fn test_one_row_per_product() {
        let store = InMemoryCartStore::new();
        let cart = store
            .find_or_create_cart(&guest("abc123"))
            .await
            .expect("create");

        store
            .insert_item(cart.id, ProductId::new(1), 2)
            .await
            .expect("insert");
        let dup = store.insert_item(cart.id, ProductId::new(1), 1).await;
        assert!(matches!(dup, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_zero_quantity_rejected() {
        let store = InMemoryCartStore::new();
        let cart = store
            .find_or_create_cart(&guest("abc123"))
            .await
            .expect("create");

        assert!(matches!(
            store.insert_item(cart.id, ProductId::new(1), 0).await,
            Err(StoreError::Conflict(_))
        ));

        let item = store
            .insert_item(cart.id, ProductId::new(1), 2)
            .await
            .expect("insert");
        assert!(matches!(
            store.set_item_quantity(cart.id, item.id, 0).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_cross_cart_rows_are_invisible() {
        let store = InMemoryCartStore::new();
        let mine = store
            .find_or_create_cart(&guest("abc123"))
            .await
            .expect("create");
        let theirs = store
            .find_or_create_cart(&guest("def456"))
            .await
            .expect("create");

        let item = store
            .insert_item(theirs.id, ProductId::new(1), 1)
            .await
            .expect("insert");

        assert!(store.item(mine.id, item.id).await.expect("query").is_none());
        assert!(!store.delete_item(mine.id, item.id).await.expect("delete"));
        // The row still exists under its own cart.
        assert!(store.item(theirs.id, item.id).await.expect("query").is_some());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = InMemoryCartStore::new();
        let cart = store
            .find_or_create_cart(&guest("abc123"))
            .await
            .expect("create");

        store
            .insert_item(cart.id, ProductId::new(1), 3)
            .await
            .expect("insert");
        store.clear_items(cart.id).await.expect("clear");
        store.clear_items(cart.id).await.expect("clear again");
        assert!(store.items(cart.id).await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn test_commit_merge_moves_and_combines() {
        let store = InMemoryCartStore::new();
        let source = store
            .find_or_create_cart(&guest("abc123"))
            .await
            .expect("create");
        let dest = store
            .find_or_create_cart(&CartOwner::User(UserId::new(1)))
            .await
            .expect("create");

        let moved = store
            .insert_item(source.id, ProductId::new(1), 2)
            .await
            .expect("insert");
        let src_conflict = store
            .insert_item(source.id, ProductId::new(2), 4)
            .await
            .expect("insert");
        let dest_conflict = store
            .insert_item(dest.id, ProductId::new(2), 3)
            .await
            .expect("insert");

        store
            .commit_merge(
                source.id,
                dest.id,
                &[
                    MergeOp::Move { item: moved.id },
                    MergeOp::Combine {
                        source: src_conflict.id,
                        dest: dest_conflict.id,
                        quantity: 5,
                    },
                ],
            )
            .await
            .expect("merge");

        let items = store.items(dest.id).await.expect("query");
        assert_eq!(items.len(), 2);
        let combined = items
            .iter()
            .find(|i| i.product_id == ProductId::new(2))
            .expect("combined row");
        assert_eq!(combined.quantity, 5);
        assert_eq!(combined.id, dest_conflict.id);

        // Source cart and its owner key are gone.
        assert!(store.find_cart(&guest("abc123")).await.expect("query").is_none());
        assert!(store.items(source.id).await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn test_commit_merge_rejects_uncovered_source_rows() {
        let store = InMemoryCartStore::new();
        let source = store
            .find_or_create_cart(&guest("abc123"))
            .await
            .expect("create");
        let dest = store
            .find_or_create_cart(&CartOwner::User(UserId::new(1)))
            .await
            .expect("create");

        store
            .insert_item(source.id, ProductId::new(1), 2)
            .await
            .expect("insert");

        let err = store.commit_merge(source.id, dest.id, &[]).await;
        assert!(matches!(err, Err(StoreError::Conflict(_))));

        // Nothing changed: the source cart and its row survive.
        assert!(store.find_cart(&guest("abc123")).await.expect("query").is_some());
        assert_eq!(store.items(source.id).await.expect("query").len(), 1);
    }

    #[tokio::test]
    async fn test_commit_merge_rejects_stale_plans() {
        let store = InMemoryCartStore::new();
        let source = store
            .find_or_create_cart(&guest("abc123"))
            .await
            .expect("create");
        let dest = store
            .find_or_create_cart(&CartOwner::User(UserId::new(1)))
            .await
            .expect("create");

        let row = store
            .insert_item(source.id, ProductId::new(1), 2)
            .await
            .expect("insert");
        store.delete_item(source.id, row.id).await.expect("delete");

        let err = store
            .commit_merge(source.id, dest.id, &[MergeOp::Move { item: row.id }])
            .await;
        assert!(matches!(err, Err(StoreError::Conflict(_))));
    }
}
