use std::collections::HashMap;

use async_trait::async_trait;
use caravel_shared::OwnerRef;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::machine::OrderError;
use crate::models::{Order, OrderChangeLog, RiderAssignment};

/// Storage seam for orders, their transition log and rider assignments.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), OrderError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError>;

    async fn find_by_tracking(&self, tracking_code: &str) -> Result<Option<Order>, OrderError>;

    async fn update(&self, order: Order) -> Result<(), OrderError>;

    async fn append_log(&self, entry: OrderChangeLog) -> Result<(), OrderError>;

    async fn logs_for(&self, order_id: Uuid) -> Result<Vec<OrderChangeLog>, OrderError>;

    async fn orders_for_owner(&self, owner: OwnerRef) -> Result<Vec<Order>, OrderError>;

    /// Transition log across every order of one owner, for reconciliation.
    async fn logs_for_owner(&self, owner: OwnerRef) -> Result<Vec<OrderChangeLog>, OrderError>;

    async fn upsert_assignment(&self, assignment: RiderAssignment) -> Result<(), OrderError>;

    async fn assignment_for(&self, order_id: Uuid)
        -> Result<Option<RiderAssignment>, OrderError>;
}

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    logs: Vec<OrderChangeLog>,
    assignments: HashMap<Uuid, RiderAssignment>,
}

/// In-memory store backing tests and single-node deployments.
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<(), OrderError> {
        let mut inner = self.inner.lock().await;
        inner.orders.insert(order.id, order);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&id).cloned())
    }

    async fn find_by_tracking(&self, tracking_code: &str) -> Result<Option<Order>, OrderError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .values()
            .find(|order| order.tracking_code.as_deref() == Some(tracking_code))
            .cloned())
    }

    async fn update(&self, order: Order) -> Result<(), OrderError> {
        let mut inner = self.inner.lock().await;
        if !inner.orders.contains_key(&order.id) {
            return Err(OrderError::NotFound(order.id));
        }
        inner.orders.insert(order.id, order);
        Ok(())
    }

    async fn append_log(&self, entry: OrderChangeLog) -> Result<(), OrderError> {
        let mut inner = self.inner.lock().await;
        inner.logs.push(entry);
        Ok(())
    }

    async fn logs_for(&self, order_id: Uuid) -> Result<Vec<OrderChangeLog>, OrderError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .logs
            .iter()
            .filter(|entry| entry.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn orders_for_owner(&self, owner: OwnerRef) -> Result<Vec<Order>, OrderError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .orders
            .values()
            .filter(|order| order.owner == Some(owner))
            .cloned()
            .collect())
    }

    async fn logs_for_owner(&self, owner: OwnerRef) -> Result<Vec<OrderChangeLog>, OrderError> {
        let inner = self.inner.lock().await;
        let order_ids: Vec<Uuid> = inner
            .orders
            .values()
            .filter(|order| order.owner == Some(owner))
            .map(|order| order.id)
            .collect();
        Ok(inner
            .logs
            .iter()
            .filter(|entry| order_ids.contains(&entry.order_id))
            .cloned()
            .collect())
    }

    async fn upsert_assignment(&self, assignment: RiderAssignment) -> Result<(), OrderError> {
        let mut inner = self.inner.lock().await;
        inner.assignments.insert(assignment.order_id, assignment);
        Ok(())
    }

    async fn assignment_for(
        &self,
        order_id: Uuid,
    ) -> Result<Option<RiderAssignment>, OrderError> {
        let inner = self.inner.lock().await;
        Ok(inner.assignments.get(&order_id).cloned())
    }
}
