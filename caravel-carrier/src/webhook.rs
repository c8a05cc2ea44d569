use std::collections::HashMap;
use std::sync::Arc;

use caravel_order::{Logistics, OrderError, OrderStateMachine, OrderStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CarrierAdapter, StatusMapping};

/// Actor recorded on transitions driven by carrier webhooks.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

/// Inbound status event, already routed to a carrier by the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierWebhookEvent {
    pub logistics: Logistics,
    /// The carrier's tracking identifier for the shipment.
    pub external_ref: String,
    pub raw_status: String,
    pub comment: Option<String>,
}

/// What happened to a webhook event. `Recorded` is the fail-soft path:
/// observable on the order, but no transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebhookOutcome {
    Applied {
        order_id: Uuid,
        status: OrderStatus,
    },
    NoChange {
        order_id: Uuid,
    },
    Recorded {
        order_id: Uuid,
        raw_status: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("No adapter registered for carrier {0}")]
    UnknownCarrier(Logistics),

    #[error("No order matches tracking reference {0}")]
    OrderNotFound(String),

    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Normalizes inbound carrier events and drives the state machine.
///
/// Duplicate deliveries of the same event are idempotent: the state
/// machine's prior-status guard turns the repeat into a no-op with no log
/// row and no inventory effect.
pub struct WebhookProcessor {
    machine: Arc<OrderStateMachine>,
    adapters: HashMap<Logistics, Arc<dyn CarrierAdapter>>,
}

impl WebhookProcessor {
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

    pub async fn handle(
        &self,
        event: CarrierWebhookEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        let adapter = self
            .adapters
            .get(&event.logistics)
            .ok_or(WebhookError::UnknownCarrier(event.logistics))?;

        let order = self
            .machine
            .orders()
            .find_by_tracking(&event.external_ref)
            .await?
            .ok_or_else(|| WebhookError::OrderNotFound(event.external_ref.clone()))?;

        match adapter.map_external_status(&event.raw_status) {
            StatusMapping::Unrecognized => {
                tracing::warn!(
                    order = %order.code,
                    carrier = %event.logistics,
                    raw = %event.raw_status,
                    "unrecognized carrier status recorded as remark"
                );
                self.machine
                    .add_remark(
                        order.id,
                        format!(
                            "unrecognized {} status: {}",
                            event.logistics, event.raw_status
                        ),
                    )
                    .await?;
                Ok(WebhookOutcome::Recorded {
                    order_id: order.id,
                    raw_status: event.raw_status,
                })
            }
            StatusMapping::Mapped(status) => {
                let before = order.status;
                let updated = self
                    .machine
                    .transition(order.id, status, SYSTEM_ACTOR, event.comment)
                    .await?;
                if updated.status == before {
                    Ok(WebhookOutcome::NoChange { order_id: order.id })
                } else {
                    Ok(WebhookOutcome::Applied {
                        order_id: order.id,
                        status: updated.status,
                    })
                }
            }
        }
    }
}
