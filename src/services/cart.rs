use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, IntoCondition},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    context::GuestContext,
    entities::{
        cart::{self, draft_key, CartStatus},
        cart_item, item,
    },
    errors::{is_unique_violation, ServiceError},
    services::{catalog::find_orderable_item, money},
};

/// Largest quantity a single cart line may hold
pub const MAX_LINE_QUANTITY: i32 = 999;

/// Times a write re-resolves the draft after losing it to a concurrent submission
const DRAFT_LOCK_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub item_id: Uuid,
    pub name: String,
    pub unit: String,
    pub price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Rendered state of a draft cart
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub cart_id: Uuid,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
    /// Sum of quantities, shown on the cart badge
    pub item_count: i64,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Draft cart management for a guest room.
///
/// Every operation takes the caller's [`GuestContext`]; the cart is the single DRAFT cart of
/// that context's (hotel, room, stay) slot and is created on first access.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Returns the DRAFT cart for the guest's slot, creating it if absent.
    ///
    /// Concurrent first access is resolved by the unique `draft_key`: the loser of the
    /// insert race re-reads the winner's row.
    #[instrument(skip(self, ctx), fields(room_id = %ctx.room_id()))]
    pub async fn get_or_create_cart(&self, ctx: &GuestContext) -> Result<cart::Model, ServiceError> {
        let db = &*self.db;
        let key = draft_key(ctx.hotel_id(), ctx.room_id(), ctx.stay_id);

        if let Some(existing) = find_draft(db, &key).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let draft = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            hotel_id: Set(ctx.hotel_id()),
            room_id: Set(ctx.room_id()),
            stay_id: Set(ctx.stay_id),
            status: Set(CartStatus::Draft),
            draft_key: Set(Some(key.clone())),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match draft.insert(db).await {
            Ok(created) => {
                debug!(cart_id = %created.id, "draft cart created");
                Ok(created)
            }
            Err(err) if is_unique_violation(&err) => find_draft(db, &key).await?.ok_or_else(|| {
                ServiceError::InternalError("draft cart vanished after insert conflict".to_string())
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Opens a transaction that holds the write lock on the guest's DRAFT cart.
    ///
    /// A cart submitted between lookup and lock is no longer a draft; the next draft of
    /// the slot is used instead, so no line is ever written to a submitted cart.
    async fn begin_on_draft(
        &self,
        ctx: &GuestContext,
    ) -> Result<(cart::Model, DatabaseTransaction), ServiceError> {
        for _ in 0..DRAFT_LOCK_ATTEMPTS {
            let cart = self.get_or_create_cart(ctx).await?;
            let txn = self.db.begin().await?;
            if let Some(locked) = lock_draft(&txn, cart::Column::Id.eq(cart.id)).await? {
                return Ok((locked, txn));
            }
            txn.rollback().await?;
            debug!(cart_id = %cart.id, "cart submitted before it was locked");
        }
        Err(ServiceError::Conflict(
            "The cart kept changing while it was being updated".to_string(),
        ))
    }

    /// Adds `quantity` of an item, clamped to at least one.
    ///
    /// A new line snapshots the current catalog price; an existing line is incremented in
    /// place under a row lock and keeps its original snapshot.
    #[instrument(skip(self, ctx), fields(room_id = %ctx.room_id()))]
    pub async fn add_item(
        &self,
        ctx: &GuestContext,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartSummary, ServiceError> {
        let quantity = quantity.max(1);
        check_line_quantity(i64::from(quantity))?;

        let (cart, txn) = self.begin_on_draft(ctx).await?;
        let orderable = find_orderable_item(&txn, ctx.hotel_id(), item_id).await?;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .lock_exclusive()
            .one(&txn)
            .await?;

        if let Some(line) = existing {
            check_line_quantity(i64::from(line.quantity) + i64::from(quantity))?;
            increment_line(&txn, cart.id, item_id, quantity).await?;
        } else {
            let now = Utc::now();
            let line = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                item_id: Set(item_id),
                quantity: Set(quantity),
                price_snapshot: Set(money::normalize(orderable.item.price)),
                created_at: Set(now),
                updated_at: Set(now),
            };

            // Savepoint, so a lost insert race does not poison the outer transaction.
            let savepoint = txn.begin().await?;
            match line.insert(&savepoint).await {
                Ok(_) => savepoint.commit().await?,
                Err(err) if is_unique_violation(&err) => {
                    savepoint.rollback().await?;
                    increment_line(&txn, cart.id, item_id, quantity).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        let summary = summarize(&txn, cart.id).await?;
        txn.commit().await?;

        counter!("cart.items_added", quantity as u64);
        info!(cart_id = %cart.id, %item_id, quantity, "item added to cart");
        Ok(summary)
    }

    /// Sets a line to exactly `quantity`; zero or less removes it.
    #[instrument(skip(self, ctx), fields(room_id = %ctx.room_id()))]
    pub async fn update_item(
        &self,
        ctx: &GuestContext,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<CartSummary, ServiceError> {
        check_line_quantity(i64::from(quantity))?;
        let (cart, txn) = self.begin_on_draft(ctx).await?;

        let line = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {item_id} is not in the cart")))?;

        if quantity <= 0 {
            cart_item::Entity::delete_by_id(line.id).exec(&txn).await?;
        } else {
            let mut line: cart_item::ActiveModel = line.into();
            line.quantity = Set(quantity);
            line.updated_at = Set(Utc::now());
            line.update(&txn).await?;
        }

        let summary = summarize(&txn, cart.id).await?;
        txn.commit().await?;

        info!(cart_id = %cart.id, %item_id, quantity, "cart line updated");
        Ok(summary)
    }

    /// Removes every line; the cart stays DRAFT.
    #[instrument(skip(self, ctx), fields(room_id = %ctx.room_id()))]
    pub async fn clear(&self, ctx: &GuestContext) -> Result<CartSummary, ServiceError> {
        let (cart, txn) = self.begin_on_draft(ctx).await?;

        let removed = cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        let summary = summarize(&txn, cart.id).await?;
        txn.commit().await?;

        info!(cart_id = %cart.id, removed = removed.rows_affected, "cart cleared");
        Ok(summary)
    }

    pub async fn summary(&self, ctx: &GuestContext) -> Result<CartSummary, ServiceError> {
        let cart = self.get_or_create_cart(ctx).await?;
        let txn = self.db.begin().await?;
        let summary = summarize(&txn, cart.id).await?;
        txn.commit().await?;
        Ok(summary)
    }
}

async fn find_draft<C>(conn: &C, key: &str) -> Result<Option<cart::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(cart::Entity::find()
        .filter(cart::Column::DraftKey.eq(key))
        .filter(cart::Column::Status.eq(CartStatus::Draft))
        .one(conn)
        .await?)
}

async fn increment_line(
    txn: &DatabaseTransaction,
    cart_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    cart_item::Entity::update_many()
        .col_expr(
            cart_item::Column::Quantity,
            Expr::col(cart_item::Column::Quantity).add(quantity),
        )
        .col_expr(cart_item::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ItemId.eq(item_id))
        .exec(txn)
        .await?;
    Ok(())
}

/// Write-locks the DRAFT cart matching `filter` and returns it.
///
/// Must be the first statement of `txn`: the conditional update takes the row lock on
/// Postgres and the database write lock on SQLite before anything is read. `None` means no
/// draft matched, typically because the cart was submitted meanwhile.
pub(crate) async fn lock_draft<F>(
    txn: &DatabaseTransaction,
    filter: F,
) -> Result<Option<cart::Model>, ServiceError>
where
    F: IntoCondition + Clone,
{
    let claimed = cart::Entity::update_many()
        .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(cart::Column::Status.eq(CartStatus::Draft))
        .filter(filter.clone())
        .exec(txn)
        .await?;
    if claimed.rows_affected == 0 {
        return Ok(None);
    }

    Ok(cart::Entity::find()
        .filter(cart::Column::Status.eq(CartStatus::Draft))
        .filter(filter)
        .one(txn)
        .await?)
}

fn check_line_quantity(quantity: i64) -> Result<(), ServiceError> {
    if quantity > i64::from(MAX_LINE_QUANTITY) {
        return Err(ServiceError::ValidationError(format!(
            "A cart line holds at most {MAX_LINE_QUANTITY} of an item"
        )));
    }
    Ok(())
}

async fn summarize(txn: &DatabaseTransaction, cart_id: Uuid) -> Result<CartSummary, ServiceError> {
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .find_also_related(item::Entity)
        .order_by_asc(cart_item::Column::CreatedAt)
        .all(txn)
        .await?;

    let lines: Vec<CartLine> = rows
        .into_iter()
        .map(|(line, item)| {
            let (name, unit) = item
                .map(|it| (it.name, it.unit))
                .unwrap_or_else(|| ("Unavailable item".to_string(), String::new()));
            CartLine {
                item_id: line.item_id,
                name,
                unit,
                price: money::normalize(line.price_snapshot),
                quantity: line.quantity,
                line_total: money::line_total(line.price_snapshot, line.quantity),
            }
        })
        .collect();

    let total = money::total(lines.iter().map(|l| (l.price, l.quantity)));
    let item_count = lines.iter().map(|l| i64::from(l.quantity)).sum();

    Ok(CartSummary {
        cart_id,
        lines,
        total,
        item_count,
    })
}
