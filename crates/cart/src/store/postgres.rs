//! `PostgreSQL` cart store.
//!
//! # Schema
//!
//! Tables live in the `storefront` schema (see `migrations/`):
//!
//! - `storefront.cart` - one row per cart; exactly one of `user_id` /
//!   `session_key` is set, each unique where present
//! - `storefront.cart_item` - line items, `UNIQUE (cart_id, product_id)`,
//!   `ON DELETE CASCADE` from the cart
//!
//! Every trait method is a single statement or a single transaction, so each
//! call is atomic on its own. Merge commits lock both cart rows `FOR UPDATE`
//! in ascending id order.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use verdant_core::{CartId, LineItemId, ProductId, SessionToken, UserId};

use crate::models::{Cart, CartOwner, LineItem};

use super::{CartStore, MergeOp, StoreError};

/// Repository over a `PostgreSQL` pool.
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: Option<i32>,
    session_key: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self) -> Result<Cart, StoreError> {
        let owner = match (self.user_id, self.session_key) {
            (Some(user), None) => CartOwner::User(UserId::new(user)),
            (None, Some(key)) => {
                let token = SessionToken::parse(&key).map_err(|e| {
                    StoreError::DataCorruption(format!("invalid session key in database: {e}"))
                })?;
                CartOwner::Guest(token)
            }
            _ => {
                return Err(StoreError::DataCorruption(format!(
                    "cart {} has no single owner",
                    self.id
                )));
            }
        };

        Ok(Cart {
            id: CartId::new(self.id),
            owner,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i32,
    cart_id: i32,
    product_id: i32,
    quantity: i32,
    added_at: DateTime<Utc>,
}

impl ItemRow {
    fn into_item(self) -> Result<LineItem, StoreError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            StoreError::DataCorruption(format!(
                "line item {} has non-positive quantity",
                self.id
            ))
        })?;
        if quantity == 0 {
            return Err(StoreError::DataCorruption(format!(
                "line item {} stored with quantity zero",
                self.id
            )));
        }

        Ok(LineItem {
            id: LineItemId::new(self.id),
            cart_id: CartId::new(self.cart_id),
            product_id: ProductId::new(self.product_id),
            quantity,
            added_at: self.added_at,
        })
    }
}

fn owner_columns(owner: &CartOwner) -> (Option<i32>, Option<&str>) {
    match owner {
        CartOwner::User(user) => (Some(user.as_i32()), None),
        CartOwner::Guest(token) => (None, Some(token.as_str())),
    }
}

fn quantity_to_db(quantity: u32) -> Result<i32, StoreError> {
    i32::try_from(quantity)
        .map_err(|_| StoreError::Conflict(format!("quantity {quantity} out of range")))
}

/// Map unique-index violations to `Conflict`, everything else to `Database`.
fn map_insert_error(e: sqlx::Error, context: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StoreError::Conflict(context.to_owned());
    }
    StoreError::Database(e)
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find_cart(&self, owner: &CartOwner) -> Result<Option<Cart>, StoreError> {
        let (user_id, session_key) = owner_columns(owner);
        let row: Option<CartRow> = sqlx::query_as(
            r"
            SELECT id, user_id, session_key, created_at, updated_at
            FROM storefront.cart
            WHERE user_id IS NOT DISTINCT FROM $1
              AND session_key IS NOT DISTINCT FROM $2
            ",
        )
        .bind(user_id)
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CartRow::into_cart).transpose()
    }

    async fn find_or_create_cart(&self, owner: &CartOwner) -> Result<Cart, StoreError> {
        let (user_id, session_key) = owner_columns(owner);
        let mut tx = self.pool.begin().await?;

        // A concurrent insert for the same owner loses on the partial unique
        // index and falls through to the select.
        let inserted: Option<CartRow> = sqlx::query_as(
            r"
            INSERT INTO storefront.cart (user_id, session_key)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            RETURNING id, user_id, session_key, created_at, updated_at
            ",
        )
        .bind(user_id)
        .bind(session_key)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match inserted {
            Some(row) => row,
            None => {
                sqlx::query_as(
                    r"
                    SELECT id, user_id, session_key, created_at, updated_at
                    FROM storefront.cart
                    WHERE user_id IS NOT DISTINCT FROM $1
                      AND session_key IS NOT DISTINCT FROM $2
                    ",
                )
                .bind(user_id)
                .bind(session_key)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        row.into_cart()
    }

    async fn items(&self, cart: CartId) -> Result<Vec<LineItem>, StoreError> {
        let rows: Vec<ItemRow> = sqlx::query_as(
            r"
            SELECT id, cart_id, product_id, quantity, added_at
            FROM storefront.cart_item
            WHERE cart_id = $1
            ORDER BY id
            ",
        )
        .bind(cart.as_i32())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ItemRow::into_item).collect()
    }

    async fn item(
        &self,
        cart: CartId,
        item: LineItemId,
    ) -> Result<Option<LineItem>, StoreError> {
        let row: Option<ItemRow> = sqlx::query_as(
            r"
            SELECT id, cart_id, product_id, quantity, added_at
            FROM storefront.cart_item
            WHERE id = $1 AND cart_id = $2
            ",
        )
        .bind(item.as_i32())
        .bind(cart.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ItemRow::into_item).transpose()
    }

    async fn item_for_product(
        &self,
        cart: CartId,
        product: ProductId,
    ) -> Result<Option<LineItem>, StoreError> {
        let row: Option<ItemRow> = sqlx::query_as(
            r"
            SELECT id, cart_id, product_id, quantity, added_at
            FROM storefront.cart_item
            WHERE cart_id = $1 AND product_id = $2
            ",
        )
        .bind(cart.as_i32())
        .bind(product.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ItemRow::into_item).transpose()
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

        let mut tx = self.pool.begin().await?;
        let row: ItemRow = sqlx::query_as(
            r"
            INSERT INTO storefront.cart_item (cart_id, product_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, cart_id, product_id, quantity, added_at
            ",
        )
        .bind(cart.as_i32())
        .bind(product.as_i32())
        .bind(quantity_to_db(quantity)?)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, "cart already has a line item for this product"))?;

        touch_cart(&mut tx, cart).await?;
        tx.commit().await?;
        row.into_item()
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

        let mut tx = self.pool.begin().await?;
        let row: Option<ItemRow> = sqlx::query_as(
            r"
            UPDATE storefront.cart_item
            SET quantity = $1
            WHERE id = $2 AND cart_id = $3
            RETURNING id, cart_id, product_id, quantity, added_at
            ",
        )
        .bind(quantity_to_db(quantity)?)
        .bind(item.as_i32())
        .bind(cart.as_i32())
        .fetch_optional(&mut *tx)
        .await?;

        if row.is_some() {
            touch_cart(&mut tx, cart).await?;
        }
        tx.commit().await?;
        row.map(ItemRow::into_item).transpose()
    }

    async fn delete_item(&self, cart: CartId, item: LineItemId) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_item
            WHERE id = $1 AND cart_id = $2
            ",
        )
        .bind(item.as_i32())
        .bind(cart.as_i32())
        .execute(&mut *tx)
        .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            touch_cart(&mut tx, cart).await?;
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn clear_items(&self, cart: CartId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            DELETE FROM storefront.cart_item
            WHERE cart_id = $1
            ",
        )
        .bind(cart.as_i32())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() > 0 {
            touch_cart(&mut tx, cart).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn commit_merge(
        &self,
        source: CartId,
        dest: CartId,
        ops: &[MergeOp],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock both cart rows in ascending id order to keep concurrent
        // merges deadlock-free.
        let mut lock_order = [source, dest];
        lock_order.sort_unstable();
        for id in lock_order {
            let locked = sqlx::query("SELECT id FROM storefront.cart WHERE id = $1 FOR UPDATE")
                .bind(id.as_i32())
                .fetch_optional(&mut *tx)
                .await?;
            if locked.is_none() {
                return Err(StoreError::Conflict(format!("no such cart {id}")));
            }
        }

        let source_rows: Vec<ItemRow> = sqlx::query_as(
            r"
            SELECT id, cart_id, product_id, quantity, added_at
            FROM storefront.cart_item
            WHERE cart_id = $1
            ORDER BY id
            ",
        )
        .bind(source.as_i32())
        .fetch_all(&mut *tx)
        .await?;

        let source_ids: HashSet<i32> = source_rows.iter().map(|row| row.id).collect();
        let mut covered: HashSet<i32> = HashSet::new();

        for op in ops {
            match op {
                MergeOp::Move { item } => {
                    if !source_ids.contains(&item.as_i32()) || !covered.insert(item.as_i32()) {
                        return Err(StoreError::Conflict(format!(
                            "source item {item} is gone or duplicated in the plan"
                        )));
                    }
                    // The (cart_id, product_id) unique index rejects a move
                    // that would duplicate a destination product.
                    sqlx::query(
                        r"
                        UPDATE storefront.cart_item
                        SET cart_id = $1
                        WHERE id = $2 AND cart_id = $3
                        ",
                    )
                    .bind(dest.as_i32())
                    .bind(item.as_i32())
                    .bind(source.as_i32())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        map_insert_error(e, "destination already has this product")
                    })?;
                }
                MergeOp::Combine {
                    source: source_item,
                    dest: dest_item,
                    quantity,
                } => {
                    if !source_ids.contains(&source_item.as_i32())
                        || !covered.insert(source_item.as_i32())
                    {
                        return Err(StoreError::Conflict(format!(
                            "source item {source_item} is gone or duplicated in the plan"
                        )));
                    }

                    let updated = sqlx::query(
                        r"
                        UPDATE storefront.cart_item
                        SET quantity = $1
                        WHERE id = $2
                          AND cart_id = $3
                          AND product_id = (
                              SELECT product_id FROM storefront.cart_item WHERE id = $4
                          )
                        ",
                    )
                    .bind(quantity_to_db(*quantity)?)
                    .bind(dest_item.as_i32())
                    .bind(dest.as_i32())
                    .bind(source_item.as_i32())
                    .execute(&mut *tx)
                    .await?;
                    if updated.rows_affected() != 1 {
                        return Err(StoreError::Conflict(format!(
                            "destination item {dest_item} is gone or references another product"
                        )));
                    }

                    sqlx::query("DELETE FROM storefront.cart_item WHERE id = $1 AND cart_id = $2")
                        .bind(source_item.as_i32())
                        .bind(source.as_i32())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        if covered.len() != source_ids.len() {
            return Err(StoreError::Conflict(
                "merge plan does not cover all source items".to_owned(),
            ));
        }

        sqlx::query("DELETE FROM storefront.cart WHERE id = $1")
            .bind(source.as_i32())
            .execute(&mut *tx)
            .await?;
        touch_cart(&mut tx, dest).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn touch_cart(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    cart: CartId,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE storefront.cart SET updated_at = now() WHERE id = $1")
        .bind(cart.as_i32())
        .execute(&mut **tx)
        .await?;
    Ok(())
}
