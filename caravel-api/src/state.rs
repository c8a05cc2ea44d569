use std::sync::Arc;

use caravel_carrier::orchestrator::DispatchOrchestrator;
use caravel_carrier::webhook::WebhookProcessor;
use caravel_inventory::InventoryLedger;
use caravel_ledger::{InvoiceManager, ReconciliationLedger};
use caravel_order::OrderStateMachine;

#[derive(Clone)]
pub struct AppState {
    pub machine: Arc<OrderStateMachine>,
    pub inventory: InventoryLedger,
    pub reconciliation: Arc<ReconciliationLedger>,
    pub invoices: Arc<InvoiceManager>,
    pub webhooks: Arc<WebhookProcessor>,
    pub orchestrator: Arc<DispatchOrchestrator>,
}
