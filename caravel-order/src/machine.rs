use std::collections::HashMap;
use std::sync::Arc;

use caravel_core::identity::Actor;
use caravel_core::CoreError;
use caravel_inventory::{ChangeAction, InventoryError, InventoryLedger};
use caravel_shared::OwnerRef;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{
    generate_order_code, CustomerInfo, Logistics, Order, OrderChangeLog, OrderLine, OrderStatus,
    PaymentMethod, RiderAssignment,
};
use crate::store::OrderStore;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<CoreError> for OrderError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => OrderError::Validation(msg),
            CoreError::ForbiddenError(msg) => OrderError::Forbidden(msg),
        }
    }
}

/// Request to create an order against the creator's owned inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrder {
    pub owner: Option<OwnerRef>,
    pub customer: CustomerInfo,
    pub lines: Vec<OrderLine>,
    pub total_amount: i64,
    pub prepaid_amount: i64,
    #[serde(default)]
    pub delivery_charge: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub logistics: Option<Logistics>,
}

/// Per-order mutex registry so concurrent transitions on one order are
/// serialized while unrelated orders proceed in parallel.
struct OrderLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, order_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(order_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Validates and applies order status transitions, with their inventory
/// side effects and the append-only transition log.
pub struct OrderStateMachine {
    orders: Arc<dyn OrderStore>,
    inventory: InventoryLedger,
    locks: OrderLocks,
}

impl OrderStateMachine {
    pub fn new(orders: Arc<dyn OrderStore>, inventory: InventoryLedger) -> Self {
        Self {
            orders,
            inventory,
            locks: OrderLocks::new(),
        }
    }

    pub fn orders(&self) -> Arc<dyn OrderStore> {
        self.orders.clone()
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))
    }

    /// Create an order: capability check, validation, then an atomic
    /// all-or-nothing debit across every line before the order persists.
    pub async fn create_order(
        &self,
        request: CreateOrder,
        actor: &Actor,
    ) -> Result<Order, OrderError> {
        let owner = actor.resolve_order_owner(request.owner)?;

        if request.lines.is_empty() {
            return Err(OrderError::Validation(
                "an order needs at least one line".into(),
            ));
        }
        if request.total_amount < 0 {
            return Err(OrderError::Validation("total amount may not be negative".into()));
        }
        if request.prepaid_amount < 0 || request.prepaid_amount > request.total_amount {
            return Err(OrderError::Validation(
                "prepaid amount must be between zero and the total".into(),
            ));
        }

        let lines: Vec<(Uuid, i64)> = request
            .lines
            .iter()
            .map(|line| (line.product_id, line.quantity))
            .collect();
        self.inventory.debit_lines(owner, &lines, actor.id).await?;

        let status = if request.payment_method.delivers_immediately() {
            OrderStatus::Delivered
        } else {
            OrderStatus::Pending
        };

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            code: generate_order_code(),
            owner: Some(owner),
            customer: request.customer,
            lines: request.lines,
            total_amount: request.total_amount,
            prepaid_amount: request.prepaid_amount,
            delivery_charge: request.delivery_charge,
            status,
            logistics: request.logistics,
            tracking_code: None,
            payment_method: request.payment_method,
            remarks: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.orders.insert(order.clone()).await?;

        tracing::info!(order = %order.code, %status, "order created");
        Ok(order)
    }

    /// Apply a status transition. A no-op when the target equals the
    /// current status: nothing logged, nothing side-effected.
    pub async fn transition(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        actor_id: Uuid,
        comment: Option<String>,
    ) -> Result<Order, OrderError> {
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self.get_order(order_id).await?;
        if self
            .apply_transition(&mut order, new_status, actor_id, comment)
            .await?
        {
            self.orders.update(order.clone()).await?;
        }
        Ok(order)
    }

    /// Change the carrier selector. Evaluated before any literal status
    /// write: a courier selection forces the matching SentToCarrier status,
    /// while re-selecting the own fleet after a courier dispatch resets the
    /// order to Pending.
    pub async fn select_logistics(
        &self,
        order_id: Uuid,
        logistics: Logistics,
        actor_id: Uuid,
    ) -> Result<Order, OrderError> {
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self.get_order(order_id).await?;
        order.logistics = Some(logistics);

        let forced = match logistics.courier() {
            Some(partner) => Some(OrderStatus::SentToCarrier(partner)),
            None if matches!(order.status, OrderStatus::SentToCarrier(_)) => {
                // Carrier reassignment invalidates the prior dispatch.
                Some(OrderStatus::Pending)
            }
            None => None,
        };
        if let Some(status) = forced {
            self.apply_transition(&mut order, status, actor_id, None)
                .await?;
        }
        order.updated_at = Utc::now();
        self.orders.update(order.clone()).await?;
        Ok(order)
    }

    /// Record a successful carrier dispatch: tracking code, selector, and
    /// the forced dispatched status in one step.
    pub async fn record_dispatch(
        &self,
        order_id: Uuid,
        logistics: Logistics,
        tracking_code: String,
        actor_id: Uuid,
    ) -> Result<Order, OrderError> {
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self.get_order(order_id).await?;
        order.logistics = Some(logistics);
        order.tracking_code = Some(tracking_code);

        let status = match logistics.courier() {
            Some(partner) => OrderStatus::SentToCarrier(partner),
            None => OrderStatus::SentToDash,
        };
        self.apply_transition(&mut order, status, actor_id, None)
            .await?;
        order.updated_at = Utc::now();
        self.orders.update(order.clone()).await?;
        Ok(order)
    }

    /// Assign (or reassign) the single rider for an order. Meaningless on
    /// terminal orders; forces OutForDelivery when not already there.
    pub async fn assign_rider(
        &self,
        order_id: Uuid,
        rider_id: Uuid,
        actor_id: Uuid,
    ) -> Result<Order, OrderError> {
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self.get_order(order_id).await?;
        if order.status.is_terminal() {
            return Err(OrderError::InvalidTransition {
                from: order.status.to_string(),
                to: OrderStatus::OutForDelivery.to_string(),
            });
        }

        self.orders
            .upsert_assignment(RiderAssignment {
                order_id,
                rider_id,
                assigned_by: actor_id,
                assigned_at: Utc::now(),
            })
            .await?;

        if self
            .apply_transition(&mut order, OrderStatus::OutForDelivery, actor_id, None)
            .await?
        {
            self.orders.update(order.clone()).await?;
        }
        Ok(order)
    }

    pub async fn add_remark(
        &self,
        order_id: Uuid,
        remark: String,
    ) -> Result<Order, OrderError> {
        let _guard = self.locks.acquire(order_id).await;

        let mut order = self.get_order(order_id).await?;
        order.remarks.push(remark);
        order.updated_at = Utc::now();
        self.orders.update(order.clone()).await?;
        Ok(order)
    }

    /// Mutate the status in memory, running side effects and appending the
    /// log row. Returns false for no-ops. Callers hold the per-order lock
    /// and persist the order afterwards.
    async fn apply_transition(
        &self,
        order: &mut Order,
        new_status: OrderStatus,
        actor_id: Uuid,
        comment: Option<String>,
    ) -> Result<bool, OrderError> {
        let old_status = order.status;
        if new_status == old_status {
            return Ok(false);
        }

        // Entering the cancel family from outside it restocks every line
        // exactly once. Moving within the family must not credit again;
        // the guard is the previous status, not a flag on the order.
        if new_status.is_cancel_family() && !old_status.is_cancel_family() {
            if let Some(owner) = order.owner {
                for line in &order.lines {
                    self.inventory
                        .credit(
                            owner,
                            line.product_id,
                            line.quantity,
                            actor_id,
                            ChangeAction::OrderCancelled,
                        )
                        .await?;
                }
            }
        }

        order.status = new_status;
        order.updated_at = Utc::now();

        self.orders
            .append_log(OrderChangeLog {
                id: Uuid::new_v4(),
                order_id: order.id,
                old_status,
                new_status,
                actor_id,
                comment,
                at: order.updated_at,
            })
            .await?;

        tracing::info!(order = %order.code, from = %old_status, to = %new_status, "order transition");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CourierPartner;
    use crate::store::MemoryOrderStore;
    use caravel_core::identity::ActorRole;
    use caravel_inventory::MemoryInventoryStore;
    use caravel_shared::pii::Masked;
    use caravel_shared::StockStatus;

    struct Fixture {
        machine: OrderStateMachine,
        inventory: InventoryLedger,
        owner: OwnerRef,
        actor: Actor,
    }

    async fn fixture() -> Fixture {
        let inventory = InventoryLedger::new(Arc::new(MemoryInventoryStore::new()));
        let machine = OrderStateMachine::new(
            Arc::new(MemoryOrderStore::new()),
            inventory.clone(),
        );
        let owner = OwnerRef::Franchise(Uuid::new_v4());
        let actor = Actor::new(Uuid::new_v4(), ActorRole::FranchiseStaff, Some(owner));
        Fixture {
            machine,
            inventory,
            owner,
            actor,
        }
    }

    fn customer() -> CustomerInfo {
        CustomerInfo {
            name: "Sita Sharma".to_string(),
            phone: Masked::new("9801234567".to_string()),
            address: "Baneshwor".to_string(),
            city: Some("Kathmandu".to_string()),
        }
    }

    fn request(product_id: Uuid, quantity: i64) -> CreateOrder {
        CreateOrder {
            owner: None,
            customer: customer(),
            lines: vec![OrderLine {
                product_id,
                quantity,
            }],
            total_amount: 1000,
            prepaid_amount: 200,
            delivery_charge: 100,
            payment_method: PaymentMethod::CashOnDelivery,
            logistics: None,
        }
    }

    async fn seed(fx: &Fixture, product_id: Uuid, quantity: i64) {
        fx.inventory
            .add_stock(
                fx.owner,
                product_id,
                quantity,
                StockStatus::ReadyToDispatch,
                fx.actor.id,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_order_debits_stock() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 10).await;

        let order = fx
            .machine
            .create_order(request(product, 3), &fx.actor)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.code.starts_with("CRV-"));
        assert_eq!(
            fx.inventory.quantity_of(fx.owner, product).await.unwrap(),
            7
        );
    }

    #[tokio::test]
    async fn test_insufficient_stock_aborts_without_partial_debit() {
        let fx = fixture().await;
        let product_a = Uuid::new_v4();
        let product_b = Uuid::new_v4();
        seed(&fx, product_a, 10).await;
        seed(&fx, product_b, 1).await;

        let mut req = request(product_a, 4);
        req.lines.push(OrderLine {
            product_id: product_b,
            quantity: 2,
        });

        let result = fx.machine.create_order(req, &fx.actor).await;
        assert!(matches!(
            result,
            Err(OrderError::Inventory(
                InventoryError::InsufficientStock { .. }
            ))
        ));
        assert_eq!(
            fx.inventory
                .quantity_of(fx.owner, product_a)
                .await
                .unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_office_visit_orders_start_delivered() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;

        let mut req = request(product, 1);
        req.payment_method = PaymentMethod::OfficeVisit;

        let order = fx.machine.create_order(req, &fx.actor).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);

        // Created delivered, not transitioned: no log row.
        let logs = fx.machine.orders().logs_for(order.id).await.unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn test_transition_to_same_status_is_noop() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;
        let order = fx
            .machine
            .create_order(request(product, 1), &fx.actor)
            .await
            .unwrap();

        let unchanged = fx
            .machine
            .transition(order.id, OrderStatus::Pending, fx.actor.id, None)
            .await
            .unwrap();

        assert_eq!(unchanged.status, OrderStatus::Pending);
        let logs = fx.machine.orders().logs_for(order.id).await.unwrap();
        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_credits_inventory_exactly_once() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 10).await;
        let order = fx
            .machine
            .create_order(request(product, 4), &fx.actor)
            .await
            .unwrap();
        fx.machine
            .transition(order.id, OrderStatus::Processing, fx.actor.id, None)
            .await
            .unwrap();

        fx.machine
            .transition(order.id, OrderStatus::Cancelled, fx.actor.id, None)
            .await
            .unwrap();
        assert_eq!(
            fx.inventory.quantity_of(fx.owner, product).await.unwrap(),
            10
        );

        // Cancelling again is a no-op; moving within the cancel family
        // must not credit either.
        fx.machine
            .transition(order.id, OrderStatus::Cancelled, fx.actor.id, None)
            .await
            .unwrap();
        fx.machine
            .transition(
                order.id,
                OrderStatus::ReturnedByCustomer,
                fx.actor.id,
                None,
            )
            .await
            .unwrap();
        assert_eq!(
            fx.inventory.quantity_of(fx.owner, product).await.unwrap(),
            10
        );
    }

    #[tokio::test]
    async fn test_create_then_cancel_round_trip_log() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 8).await;
        let order = fx
            .machine
            .create_order(request(product, 3), &fx.actor)
            .await
            .unwrap();
        fx.machine
            .transition(order.id, OrderStatus::Cancelled, fx.actor.id, None)
            .await
            .unwrap();

        assert_eq!(
            fx.inventory.quantity_of(fx.owner, product).await.unwrap(),
            8
        );

        let history = fx.inventory.history(fx.owner, product).await.unwrap();
        assert_eq!(history.len(), 3); // add, order_created, order_cancelled
        assert_eq!(history[1].action, ChangeAction::OrderCreated);
        assert_eq!(history[1].old_quantity, 8);
        assert_eq!(history[1].new_quantity, 5);
        assert_eq!(history[2].action, ChangeAction::OrderCancelled);
        assert_eq!(history[2].old_quantity, 5);
        assert_eq!(history[2].new_quantity, 8);
    }

    #[tokio::test]
    async fn test_every_accepted_transition_is_logged() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;
        let order = fx
            .machine
            .create_order(request(product, 1), &fx.actor)
            .await
            .unwrap();

        for status in [
            OrderStatus::Processing,
            OrderStatus::Verified,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            fx.machine
                .transition(order.id, status, fx.actor.id, None)
                .await
                .unwrap();
        }

        let logs = fx.machine.orders().logs_for(order.id).await.unwrap();
        assert_eq!(logs.len(), 4);
        assert_eq!(logs[0].old_status, OrderStatus::Pending);
        assert_eq!(logs[3].new_status, OrderStatus::Delivered);
    }

    #[tokio::test]
    async fn test_select_ydm_forces_sent_to_carrier() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;
        let order = fx
            .machine
            .create_order(request(product, 1), &fx.actor)
            .await
            .unwrap();

        let updated = fx
            .machine
            .select_logistics(order.id, Logistics::Ydm, fx.actor.id)
            .await
            .unwrap();

        assert_eq!(
            updated.status,
            OrderStatus::SentToCarrier(CourierPartner::Ydm)
        );
        assert_eq!(updated.logistics, Some(Logistics::Ydm));
    }

    #[tokio::test]
    async fn test_select_dash_after_courier_resets_to_pending() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;
        let order = fx
            .machine
            .create_order(request(product, 1), &fx.actor)
            .await
            .unwrap();
        fx.machine
            .select_logistics(order.id, Logistics::Ydm, fx.actor.id)
            .await
            .unwrap();

        let updated = fx
            .machine
            .select_logistics(order.id, Logistics::Dash, fx.actor.id)
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::Pending);
        assert_eq!(updated.logistics, Some(Logistics::Dash));
    }

    #[tokio::test]
    async fn test_assign_rider_forces_out_for_delivery() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;
        let order = fx
            .machine
            .create_order(request(product, 1), &fx.actor)
            .await
            .unwrap();

        let rider = Uuid::new_v4();
        let updated = fx
            .machine
            .assign_rider(order.id, rider, fx.actor.id)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::OutForDelivery);

        // Reassignment updates in place.
        let second_rider = Uuid::new_v4();
        fx.machine
            .assign_rider(order.id, second_rider, fx.actor.id)
            .await
            .unwrap();
        let assignment = fx
            .machine
            .orders()
            .assignment_for(order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.rider_id, second_rider);
    }

    #[tokio::test]
    async fn test_assign_rider_refused_on_terminal_order() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;
        let order = fx
            .machine
            .create_order(request(product, 1), &fx.actor)
            .await
            .unwrap();
        fx.machine
            .transition(order.id, OrderStatus::Delivered, fx.actor.id, None)
            .await
            .unwrap();

        let result = fx
            .machine
            .assign_rider(order.id, Uuid::new_v4(), fx.actor.id)
            .await;
        assert!(matches!(
            result,
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_transition_on_missing_order_fails() {
        let fx = fixture().await;
        let result = fx
            .machine
            .transition(Uuid::new_v4(), OrderStatus::Processing, fx.actor.id, None)
            .await;
        assert!(matches!(result, Err(OrderError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_forbidden_role_cannot_create() {
        let fx = fixture().await;
        let product = Uuid::new_v4();
        seed(&fx, product, 5).await;

        let rider = Actor::new(Uuid::new_v4(), ActorRole::Rider, Some(fx.owner));
        let result = fx.machine.create_order(request(product, 1), &rider).await;
        assert!(matches!(result, Err(OrderError::Forbidden(_))));
    }
}
