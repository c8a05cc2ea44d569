use std::sync::Arc;

use caravel_shared::{OwnerRef, StockStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::Product;
use crate::store::{InventoryStore, QuantityMutation};

/// What caused a stock mutation. Serialized exactly as recorded in the
/// audit trail consumers query against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Add,
    Update,
    Deleted,
    OrderCreated,
    OrderCancelled,
}

/// Quantity of one product held by exactly one owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub id: Uuid,
    pub owner: OwnerRef,
    pub product_id: Uuid,
    pub quantity: i64,
    pub status: StockStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn new(owner: OwnerRef, product_id: Uuid, status: StockStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            product_id,
            quantity: 0,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One row of the immutable audit trail. Every mutation appends exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryChangeLog {
    pub id: Uuid,
    pub record_id: Uuid,
    pub old_quantity: i64,
    pub new_quantity: i64,
    pub action: ChangeAction,
    pub actor_id: Uuid,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Inventory record not found for product {product_id} under {owner:?}")]
    NotFound { owner: OwnerRef, product_id: Uuid },

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Per-owner stock ledger. All mutations go through the store handle, which
/// serializes concurrent operations on the same (owner, product) key and
/// pairs every quantity change with one audit row.
#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn InventoryStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Register a catalog entry.
    pub async fn register_product(&self, name: String) -> Result<Product, InventoryError> {
        if name.trim().is_empty() {
            return Err(InventoryError::Validation("product name is required".into()));
        }
        let product = Product::new(name);
        self.store.insert_product(product.clone()).await?;
        Ok(product)
    }

    pub async fn product(&self, id: Uuid) -> Result<Option<Product>, InventoryError> {
        self.store.product(id).await
    }

    /// Add stock for an owner, creating the record on first addition.
    pub async fn add_stock(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        quantity: i64,
        status: StockStatus,
        actor_id: Uuid,
    ) -> Result<InventoryChangeLog, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::Validation(
                "stock additions must be a positive quantity".into(),
            ));
        }

        self.store.ensure_record(owner, product_id, status).await?;
        let log = self
            .store
            .apply(
                owner,
                product_id,
                QuantityMutation::Delta(quantity),
                ChangeAction::Add,
                actor_id,
            )
            .await?;

        tracing::info!(product = %product_id, quantity, "stock added");
        Ok(log)
    }

    /// Debit every line or none. A single line short on stock aborts the
    /// whole batch with InsufficientStock and no partial debit.
    pub async fn debit_lines(
        &self,
        owner: OwnerRef,
        lines: &[(Uuid, i64)],
        actor_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError> {
        if lines.is_empty() {
            return Err(InventoryError::Validation(
                "at least one line is required".into(),
            ));
        }
        for (product_id, quantity) in lines {
            if *quantity <= 0 {
                return Err(InventoryError::Validation(format!(
                    "line quantity for product {} must be positive",
                    product_id
                )));
            }
        }

        self.store.debit_lines(owner, lines, actor_id).await
    }

    /// Credit stock back, e.g. on cancellation or customer return. The
    /// record must already exist; a missing record is a data-integrity gap
    /// surfaced to the caller.
    pub async fn credit(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        quantity: i64,
        actor_id: Uuid,
        action: ChangeAction,
    ) -> Result<InventoryChangeLog, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::Validation(
                "credits must be a positive quantity".into(),
            ));
        }

        self.store
            .apply(
                owner,
                product_id,
                QuantityMutation::Delta(quantity),
                action,
                actor_id,
            )
            .await
    }

    /// Manual correction to an absolute quantity, logged as an update.
    pub async fn adjust(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        new_quantity: i64,
        actor_id: Uuid,
    ) -> Result<InventoryChangeLog, InventoryError> {
        if new_quantity < 0 {
            return Err(InventoryError::Validation(
                "quantity may not be negative".into(),
            ));
        }

        self.store
            .apply(
                owner,
                product_id,
                QuantityMutation::Set(new_quantity),
                ChangeAction::Update,
                actor_id,
            )
            .await
    }

    /// Soft delete: quantity drops to zero and the record stays behind its
    /// history.
    pub async fn retire(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        actor_id: Uuid,
    ) -> Result<InventoryChangeLog, InventoryError> {
        self.store
            .apply(
                owner,
                product_id,
                QuantityMutation::Set(0),
                ChangeAction::Deleted,
                actor_id,
            )
            .await
    }

    pub async fn quantity_of(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<i64, InventoryError> {
        let record =
            self.store
                .get(owner, product_id)
                .await?
                .ok_or(InventoryError::NotFound {
                    owner,
                    product_id,
                })?;
        Ok(record.quantity)
    }

    pub async fn history(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError> {
        self.store.history(owner, product_id).await
    }
}
