use std::collections::HashMap;

use async_trait::async_trait;
use caravel_shared::{OwnerRef, StockStatus};
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::ledger::{ChangeAction, InventoryChangeLog, InventoryError, InventoryRecord};
use crate::product::Product;

/// How a quantity changes: by a signed delta or to an absolute value.
#[derive(Debug, Clone, Copy)]
pub enum QuantityMutation {
    Delta(i64),
    Set(i64),
}

/// Storage seam for stock records and their audit trail.
///
/// Implementations must serialize mutations on the same (owner, product)
/// key and append the audit row in the same critical section as the
/// quantity write.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn insert_product(&self, product: Product) -> Result<(), InventoryError>;

    async fn product(&self, id: Uuid) -> Result<Option<Product>, InventoryError>;

    /// Create the record with quantity zero if it does not exist yet.
    async fn ensure_record(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        status: StockStatus,
    ) -> Result<InventoryRecord, InventoryError>;

    async fn get(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<Option<InventoryRecord>, InventoryError>;

    /// Apply one mutation and append its audit row atomically. Fails with
    /// NotFound when the record does not exist and InsufficientStock when
    /// the result would be negative, leaving the record untouched.
    async fn apply(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        mutation: QuantityMutation,
        action: ChangeAction,
        actor_id: Uuid,
    ) -> Result<InventoryChangeLog, InventoryError>;

    /// Debit several lines of one owner in a single critical section:
    /// either every line is debited or none is.
    async fn debit_lines(
        &self,
        owner: OwnerRef,
        lines: &[(Uuid, i64)],
        actor_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError>;

    async fn history(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError>;
}

#[derive(Default)]
struct Inner {
    products: HashMap<Uuid, Product>,
    records: HashMap<(OwnerRef, Uuid), InventoryRecord>,
    logs: Vec<InventoryChangeLog>,
}

impl Inner {
    fn mutate(
        &mut self,
        owner: OwnerRef,
        product_id: Uuid,
        mutation: QuantityMutation,
        action: ChangeAction,
        actor_id: Uuid,
    ) -> Result<InventoryChangeLog, InventoryError> {
        let record = self
            .records
            .get_mut(&(owner, product_id))
            .ok_or(InventoryError::NotFound { owner, product_id })?;

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

        record.quantity = new_quantity;
        record.updated_at = Utc::now();

        let entry = InventoryChangeLog {
            id: Uuid::new_v4(),
            record_id: record.id,
            old_quantity,
            new_quantity,
            action,
            actor_id,
            at: record.updated_at,
        };
        self.logs.push(entry.clone());
        Ok(entry)
    }
}

/// In-memory store. One mutex over the record map makes every mutation,
/// including multi-line debits, a single critical section.
pub struct MemoryInventoryStore {
    inner: Mutex<Inner>,
}

impl MemoryInventoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InventoryStore for MemoryInventoryStore {
    async fn insert_product(&self, product: Product) -> Result<(), InventoryError> {
        let mut inner = self.inner.lock().await;
        inner.products.insert(product.id, product);
        Ok(())
    }

    async fn product(&self, id: Uuid) -> Result<Option<Product>, InventoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.products.get(&id).cloned())
    }

    async fn ensure_record(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        status: StockStatus,
    ) -> Result<InventoryRecord, InventoryError> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .records
            .entry((owner, product_id))
            .or_insert_with(|| InventoryRecord::new(owner, product_id, status));
        Ok(record.clone())
    }

    async fn get(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<Option<InventoryRecord>, InventoryError> {
        let inner = self.inner.lock().await;
        Ok(inner.records.get(&(owner, product_id)).cloned())
    }

    async fn apply(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
        mutation: QuantityMutation,
        action: ChangeAction,
        actor_id: Uuid,
    ) -> Result<InventoryChangeLog, InventoryError> {
        let mut inner = self.inner.lock().await;
        inner.mutate(owner, product_id, mutation, action, actor_id)
    }

    async fn debit_lines(
        &self,
        owner: OwnerRef,
        lines: &[(Uuid, i64)],
        actor_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError> {
        let mut inner = self.inner.lock().await;

        // Check every line before touching any of them.
        for (product_id, quantity) in lines {
            let record = inner
                .records
                .get(&(owner, *product_id))
                .ok_or(InventoryError::NotFound {
                    owner,
                    product_id: *product_id,
                })?;
            if record.quantity < *quantity {
                return Err(InventoryError::InsufficientStock {
                    requested: *quantity,
                    available: record.quantity,
                });
            }
        }

        let mut entries = Vec::with_capacity(lines.len());
        for (product_id, quantity) in lines {
            let entry = inner.mutate(
                owner,
                *product_id,
                QuantityMutation::Delta(-quantity),
                ChangeAction::OrderCreated,
                actor_id,
            )?;
            entries.push(entry);
        }
        Ok(entries)
    }

    async fn history(
        &self,
        owner: OwnerRef,
        product_id: Uuid,
    ) -> Result<Vec<InventoryChangeLog>, InventoryError> {
        let inner = self.inner.lock().await;
        let record_id = match inner.records.get(&(owner, product_id)) {
            Some(record) => record.id,
            None => return Ok(Vec::new()),
        };
        Ok(inner
            .logs
            .iter()
            .filter(|entry| entry.record_id == record_id)
            .cloned()
            .collect())
    }
}
