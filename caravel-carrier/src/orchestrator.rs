use std::collections::HashMap;
use std::sync::Arc;

use caravel_core::identity::Actor;
use caravel_order::{CreateOrder, Logistics, Order, OrderError, OrderStateMachine, OrderStatus};
use uuid::Uuid;

use crate::{CarrierAdapter, CarrierError};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("No adapter registered for carrier {0}")]
    NoAdapter(Logistics),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Carrier(#[from] CarrierError),
}

/// Couples order creation/transition with the outbound carrier call so a
/// failed dispatch never strands the order in a half-applied state.
pub struct DispatchOrchestrator {
    machine: Arc<OrderStateMachine>,
    adapters: HashMap<Logistics, Arc<dyn CarrierAdapter>>,
}

impl DispatchOrchestrator {
    pub fn new(
        machine: Arc<OrderStateMachine>,
        adapters: Vec<Arc<dyn CarrierAdapter>>,
    ) -> Self {
        let adapters = adapters
            .into_iter()
            .map(|adapter| (adapter.logistics(), adapter))
            .collect();
        Self { machine, adapters }
    }

    /// Hand an existing order to a carrier. On failure the order keeps its
    /// pre-dispatch status and the caller may retry.
    pub async fn dispatch(
        &self,
        order_id: Uuid,
        logistics: Logistics,
        actor_id: Uuid,
    ) -> Result<Order, DispatchError> {
        let adapter = self
            .adapters
            .get(&logistics)
            .ok_or(DispatchError::NoAdapter(logistics))?;

        let order = self.machine.get_order(order_id).await?;
        let receipt = adapter.dispatch(&order).await?;

        Ok(self
            .machine
            .record_dispatch(order_id, logistics, receipt.tracking_code, actor_id)
            .await?)
    }

    /// Fetch a carrier's branch/location list.
    pub async fn branches(
        &self,
        logistics: Logistics,
    ) -> Result<Vec<crate::CarrierBranch>, DispatchError> {
        let adapter = self
            .adapters
            .get(&logistics)
            .ok_or(DispatchError::NoAdapter(logistics))?;
        Ok(adapter.branches().await?)
    }

    /// Create and immediately dispatch. A dispatch failure cancels the
    /// fresh order through the state machine (the compensating credit
    /// returns the debited stock) and the carrier error propagates.
    pub async fn create_and_dispatch(
        &self,
        request: CreateOrder,
        logistics: Logistics,
        actor: &Actor,
    ) -> Result<Order, DispatchError> {
        let order = self.machine.create_order(request, actor).await?;

        match self.dispatch(order.id, logistics, actor.id).await {
            Ok(dispatched) => Ok(dispatched),
            Err(err) => {
                tracing::warn!(order = %order.code, error = %err, "dispatch failed, compensating");
                self.machine
                    .transition(
                        order.id,
                        OrderStatus::Cancelled,
                        actor.id,
                        Some("carrier dispatch failed".into()),
                    )
                    .await?;
                Err(err)
            }
        }
    }
}
