use async_trait::async_trait;
use caravel_inventory::{
    ChangeAction, InventoryChangeLog, InventoryError, InventoryRecord, InventoryStore, Product,
    QuantityMutation,
};
use caravel_shared::{OwnerRef, StockStatus};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{owner_from_parts, owner_kind_str, stock_status_from, stock_status_str};

/// Postgres-backed inventory store. Mutations take a row lock on the
/// (owner, product) record so concurrent debits serialize, and the audit
/// row lands in the same transaction as the quantity write.
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(err: sqlx::Error) -> InventoryError {
    InventoryError::Storage(err.to_string())
}

fn action_str(action: ChangeAction) -> &'static str {
    match action {
        ChangeAction::Add => "add",
        ChangeAction::Update => "update",
        ChangeAction::Deleted => "deleted",
        ChangeAction::OrderCreated => "order_created",
        ChangeAction::OrderCancelled => "order_cancelled",
    }
}

fn action_from(raw: &str) -> Result<ChangeAction, InventoryError> {
    match raw {
        "add" => Ok(ChangeAction::Add),
        "update" => Ok(ChangeAction::Update),
        "deleted" => Ok(ChangeAction::Deleted),
        "order_created" => Ok(ChangeAction::OrderCreated),
        "order_cancelled" => Ok(ChangeAction::OrderCancelled),
        other => Err(InventoryError::Storage(format!(
            "unknown change action in store: {}",
            other
        ))),
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    owner_kind: String,
    owner_id: Uuid,
    product_id: Uuid,
    quantity: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> Result<InventoryRecord, InventoryError> {
        Ok(InventoryRecord {
            id: self.id,
            owner: owner_from_parts(&self.owner_kind, self.owner_id)
                .map_err(InventoryError::Storage)?,
            product_id: self.product_id,
            quantity: self.quantity,
            status: stock_status_from(&self.status).map_err(InventoryError::Storage)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    record_id: Uuid,
    old_quantity: i64,
    new_quantity: i64,
    action: String,
    actor_id: Uuid,
    at: DateTime<Utc>,
}

impl LogRow {
    fn into_log(self) -> Result<InventoryChangeLog, InventoryError> {
        Ok(InventoryChangeLog {
            id: self.id,
            record_id: self.record_id,
            old_quantity: self.old_quantity,
            new_quantity: self.new_quantity,
            action: action_from(&self.action)?,
            actor_id: self.actor_id,
            at: self.at,
        })
    }
}

const SELECT_RECORD: &str = "SELECT id, owner_kind, owner_id, product_id, quantity, status, \
     created_at, updated_at FROM inventory_records \
     WHERE owner_kind = $1 AND owner_id = $2 AND product_id = $3";

/// Locked read + quantity write + audit insert, inside the caller's
/// transaction.
async fn mutate_locked(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    owner: OwnerRef,
    product_id: Uuid,
    mutation: QuantityMutation,
    action: ChangeAction,
    actor_id: Uuid,
) -> Result<InventoryChangeLog, InventoryError> {
    let row: Option<RecordRow> =
        sqlx::query_as(&format!("{} FOR UPDATE", SELECT_RECORD))
            .bind(owner_kind_str(owner.kind()))
            .bind(owner.id())
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(storage)?;
    let record = row
        .ok_or(InventoryError::NotFound { owner, product_id })?
        .into_record()?;

    let old_quantity = record.quantity;
    let new_quantity = match mutation {
        QuantityMutation::Delta(delta) => old_quantity + delta,
        QuantityMutation::Set(value) => value,
    };
    if new_quantity < 0 {
        return Err(InventoryError::InsufficientStock {
            requested: old_quantity - new_quantity,
            available: old_quantity,
        });
    }

    let now = Utc::now();
    sqlx::query("UPDATE inventory_records SET quantity = $1, updated_at = $2 WHERE id = $3")
        .bind(new_quantity)
        .bind(now)
        .bind(record.id)
        .execute(&mut **tx)
        .await
        .map_err(storage)?;

    let entry = InventoryChangeLog {
        id: Uuid::new_v4(),
        record_id: record.id,
        old_quantity,
        new_quantity,
        action,
        actor_id,
        at: now,
    };
    sqlx::query(
        "INSERT INTO inventory_change_logs (id, record_id, old_quantity, new_quantity, action, actor_id, at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(entry.id)
    .bind(entry.record_id)
    .bind(entry.old_quantity)
    .bind(entry.new_quantity)
    .bind(action_str(entry.action))
    .bind(entry.actor_id)
    .bind(entry.at)
    .execute(&mut **tx)
    .await
    .map_err(storage)?;

    Ok(entry)
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn insert_product(&self, product: Product) -> Result<(), InventoryError> {
        sqlx::query(
            "INSERT INTO products (id, name, created_at) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>, InventoryError> {
        #[derive(sqlx::FromRow)]
        struct ProductRow {
            id: Uuid,
            name: String,
            created_at: DateTime<Utc>,
        }

        let row: Option<ProductRow> =
            sqlx::query_as("SELECT id, name, created_at FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        Ok(row.map(|row| Product {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }))
    }

    async fn ensure_record(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        status: StockStatus,
    ) -> Result<InventoryRecord, InventoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            "INSERT INTO inventory_records (id, owner_kind, owner_id, product_id, quantity, status) \
             VALUES ($1, $2, $3, $4, 0, $5) \
             ON CONFLICT (owner_kind, owner_id, product_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(owner_kind_str(owner.kind()))
        .bind(owner.id())
        .bind(product_id)
        .bind(stock_status_str(status))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        let row: RecordRow = sqlx::query_as(SELECT_RECORD)
            .bind(owner_kind_str(owner.kind()))
            .bind(owner.id())
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage)?;

        tx.commit().await.map_err(storage)?;
        row.into_record()
    }

    async fn get(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<Option<InventoryRecord>, InventoryError> {
        let row: Option<RecordRow> = sqlx::query_as(SELECT_RECORD)
            .bind(owner_kind_str(owner.kind()))
            .bind(owner.id())
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        row.map(RecordRow::into_record).transpose()
    }

    async fn apply(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        mutation: QuantityMutation,
        action: ChangeAction,
        actor_id: Uuid,
    ) -> Result<InventoryChangeLog, InventoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        let entry = mutate_locked(&mut tx, owner, product_id, mutation, action, actor_id).await?;
        tx.commit().await.map_err(storage)?;
        Ok(entry)
    }

    async fn debit_lines(
        &self,
        owner: OwnerRef,
        lines: &[(Uuid, i64)],
        actor_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // A failing line drops the transaction, rolling back every debit
        // applied so far.
        let mut entries = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let entry = mutate_locked(
                &mut tx,
                owner,
                *product_id,
                QuantityMutation::Delta(-quantity),
                ChangeAction::OrderCreated,
                actor_id,
            )
            .await?;
            entries.push(entry);
        }

        tx.commit().await.map_err(storage)?;
        Ok(entries)
    }

    async fn history(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT l.id, l.record_id, l.old_quantity, l.new_quantity, l.action, l.actor_id, l.at \
             FROM inventory_change_logs l \
             JOIN inventory_records r ON r.id = l.record_id \
             WHERE r.owner_kind = $1 AND r.owner_id = $2 AND r.product_id = $3 \
             ORDER BY l.at",
        )
        .bind(owner_kind_str(owner.kind()))
        .bind(owner.id())
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(LogRow::into_log).collect()
    }
}
