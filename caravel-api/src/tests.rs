use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use caravel_carrier::orchestrator::DispatchOrchestrator;
use caravel_carrier::webhook::WebhookProcessor;
use caravel_carrier::ydm::{YdmAdapter, YdmConfig};
use caravel_carrier::CarrierAdapter;
use caravel_core::identity::{Actor, ActorRole};
use caravel_inventory::{InventoryLedger, MemoryInventoryStore};
use caravel_ledger::{InvoiceManager, MemoryInvoiceStore, ReconciliationLedger};
use caravel_order::{
    CreateOrder, CustomerInfo, Logistics, MemoryOrderStore, OrderLine, OrderStateMachine,
    OrderStatus, PaymentMethod,
};
use caravel_shared::pii::Masked;
use caravel_shared::{OwnerRef, StockStatus};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::{finance, orders, webhooks};

fn test_state() -> AppState {
    let inventory = InventoryLedger::new(Arc::new(MemoryInventoryStore::new()));
    let order_store = Arc::new(MemoryOrderStore::new());
    let invoice_store = Arc::new(MemoryInvoiceStore::new());

    let machine = Arc::new(OrderStateMachine::new(
        order_store.clone(),
        inventory.clone(),
    ));
    let reconciliation = Arc::new(ReconciliationLedger::new(
        order_store,
        invoice_store.clone(),
    ));
    let invoices = Arc::new(InvoiceManager::new(invoice_store));

    // Real adapter: webhook handling only consults its mapping table.
    let adapters: Vec<Arc<dyn CarrierAdapter>> = vec![Arc::new(YdmAdapter::new(YdmConfig {
        base_url: "http://localhost:1".into(),
        username: "test".into(),
        password: "test".into(),
        timeout_secs: 1,
    }))];

    let webhooks = Arc::new(WebhookProcessor::new(machine.clone(), adapters.clone()));
    let orchestrator = Arc::new(DispatchOrchestrator::new(machine.clone(), adapters));

    AppState {
        machine,
        inventory,
        reconciliation,
        invoices,
        webhooks,
        orchestrator,
    }
}

struct Seeded {
    state: AppState,
    actor: Actor,
    franchise: Uuid,
    product: Uuid,
}

async fn seeded_state() -> Seeded {
    let state = test_state();
    let franchise = Uuid::new_v4();
    let owner = OwnerRef::Franchise(franchise);
    let actor = Actor::new(Uuid::new_v4(), ActorRole::FranchiseStaff, Some(owner));
    let product = Uuid::new_v4();
    state
        .inventory
        .add_stock(owner, product, 20, StockStatus::ReadyToDispatch, actor.id)
        .await
        .unwrap();
    Seeded {
        state,
        actor,
        franchise,
        product,
    }
}

fn create_request(seeded: &Seeded) -> orders::CreateOrderRequest {
    orders::CreateOrderRequest {
        actor: seeded.actor.clone(),
        order: CreateOrder {
            owner: None,
            customer: CustomerInfo {
                name: "Maya".into(),
                phone: Masked::new("9860000000".into()),
                address: "Bhaktapur".into(),
                city: Some("Bhaktapur".into()),
            },
            lines: vec![OrderLine {
                product_id: seeded.product,
                quantity: 2,
            }],
            total_amount: 1000,
            prepaid_amount: 200,
            delivery_charge: 100,
            payment_method: PaymentMethod::CashOnDelivery,
            logistics: None,
        },
        dispatch_via: None,
    }
}

#[tokio::test]
async fn test_create_order_returns_created() {
    let seeded = seeded_state().await;
    let (status, Json(order)) = orders::create_order(
        State(seeded.state.clone()),
        Json(create_request(&seeded)),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_create_order_without_stock_conflicts() {
    let seeded = seeded_state().await;
    let mut request = create_request(&seeded);
    request.order.lines[0].quantity = 50;

    let result = orders::create_order(State(seeded.state.clone()), Json(request)).await;
    assert!(matches!(result, Err(AppError::ConflictError(_))));
}

#[tokio::test]
async fn test_unknown_status_string_is_a_validation_error() {
    let seeded = seeded_state().await;
    let (_, Json(order)) = orders::create_order(
        State(seeded.state.clone()),
        Json(create_request(&seeded)),
    )
    .await
    .unwrap();

    let result = orders::transition_order(
        State(seeded.state.clone()),
        Path(order.id),
        Json(orders::TransitionRequest {
            new_status: "TELEPORTED".into(),
            actor_id: seeded.actor.id,
            comment: None,
        }),
    )
    .await;
    assert!(matches!(result, Err(AppError::ValidationError(_))));
}

#[tokio::test]
async fn test_webhook_flow_is_idempotent_and_always_2xx() {
    let seeded = seeded_state().await;
    let (_, Json(order)) = orders::create_order(
        State(seeded.state.clone()),
        Json(create_request(&seeded)),
    )
    .await
    .unwrap();
    seeded
        .state
        .machine
        .record_dispatch(order.id, Logistics::Ydm, "YDM-42".into(), seeded.actor.id)
        .await
        .unwrap();

    let payload = || webhooks::WebhookPayload {
        tracking_code: "YDM-42".into(),
        status: "delivered".into(),
        comment: None,
    };

    // First delivery applies the transition.
    webhooks::handle_carrier_webhook(
        State(seeded.state.clone()),
        Path("YDM".into()),
        Json(payload()),
    )
    .await
    .unwrap();

    // A duplicate is still 2xx and changes nothing.
    webhooks::handle_carrier_webhook(
        State(seeded.state.clone()),
        Path("YDM".into()),
        Json(payload()),
    )
    .await
    .unwrap();

    let reloaded = seeded.state.machine.get_order(order.id).await.unwrap();
    assert_eq!(reloaded.status, OrderStatus::Delivered);
    let logs = seeded.state.machine.orders().logs_for(order.id).await.unwrap();
    let delivered_rows = logs
        .iter()
        .filter(|entry| entry.new_status == OrderStatus::Delivered)
        .count();
    assert_eq!(delivered_rows, 1);
}

#[tokio::test]
async fn test_unrecognized_carrier_status_is_recorded_not_rejected() {
    let seeded = seeded_state().await;
    let (_, Json(order)) = orders::create_order(
        State(seeded.state.clone()),
        Json(create_request(&seeded)),
    )
    .await
    .unwrap();
    seeded
        .state
        .machine
        .record_dispatch(order.id, Logistics::Ydm, "YDM-43".into(), seeded.actor.id)
        .await
        .unwrap();

    // Must not error: the carrier would retry on non-2xx.
    let result = webhooks::handle_carrier_webhook(
        State(seeded.state.clone()),
        Path("YDM".into()),
        Json(webhooks::WebhookPayload {
            tracking_code: "YDM-43".into(),
            status: "sorting_facility_v9".into(),
            comment: None,
        }),
    )
    .await;
    assert!(result.is_ok());

    let reloaded = seeded.state.machine.get_order(order.id).await.unwrap();
    assert!(matches!(reloaded.status, OrderStatus::SentToCarrier(_)));
    assert_eq!(reloaded.remarks.len(), 1);
}

#[tokio::test]
async fn test_pending_cod_after_delivery() {
    let seeded = seeded_state().await;
    let (_, Json(order)) = orders::create_order(
        State(seeded.state.clone()),
        Json(create_request(&seeded)),
    )
    .await
    .unwrap();
    seeded
        .state
        .machine
        .record_dispatch(order.id, Logistics::Ydm, "YDM-44".into(), seeded.actor.id)
        .await
        .unwrap();
    webhooks::handle_carrier_webhook(
        State(seeded.state.clone()),
        Path("YDM".into()),
        Json(webhooks::WebhookPayload {
            tracking_code: "YDM-44".into(),
            status: "delivered".into(),
            comment: None,
        }),
    )
    .await
    .unwrap();

    let Json(response) = finance::pending_cod(
        State(seeded.state.clone()),
        Path(seeded.franchise),
    )
    .await
    .unwrap();

    // 1000 total − 200 prepaid − 100 delivery charge.
    assert_eq!(response.pending_cod, 700);
}

#[tokio::test]
async fn test_invoice_approval_reduces_pending_cod_once() {
    let seeded = seeded_state().await;
    let (_, Json(order)) = orders::create_order(
        State(seeded.state.clone()),
        Json(create_request(&seeded)),
    )
    .await
    .unwrap();
    seeded
        .state
        .machine
        .transition(order.id, OrderStatus::Delivered, seeded.actor.id, None)
        .await
        .unwrap();

    let (_, Json(invoice)) = finance::create_invoice(
        State(seeded.state.clone()),
        Json(finance::CreateInvoiceRequest {
            franchise_id: seeded.franchise,
            paid_amount: 300,
        }),
    )
    .await
    .unwrap();

    for _ in 0..2 {
        finance::approve_invoice(
            State(seeded.state.clone()),
            Path(invoice.id),
            Json(finance::ApproveInvoiceRequest {
                actor_id: seeded.actor.id,
            }),
        )
        .await
        .unwrap();
    }

    let Json(response) = finance::pending_cod(
        State(seeded.state.clone()),
        Path(seeded.franchise),
    )
    .await
    .unwrap();

    // 800 COD − 100 charge − 300 paid, deducted once despite re-approval.
    assert_eq!(response.pending_cod, 400);
}
