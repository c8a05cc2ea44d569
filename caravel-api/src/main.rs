use std::net::SocketAddr;
use std::sync::Arc;

use caravel_api::{app, AppState};
use caravel_carrier::dash::{DashAdapter, DashConfig};
use caravel_carrier::orchestrator::DispatchOrchestrator;
use caravel_carrier::pickndrop::{PickNDropAdapter, PickNDropConfig};
use caravel_carrier::webhook::WebhookProcessor;
use caravel_carrier::ydm::{YdmAdapter, YdmConfig};
use caravel_carrier::CarrierAdapter;
use caravel_inventory::InventoryLedger;
use caravel_ledger::{DeliveredCountPolicy, InvoiceManager, ReconciliationLedger};
use caravel_order::OrderStateMachine;
use caravel_store::{Config, DbClient, PgInventoryStore, PgInvoiceStore, PgOrderStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caravel_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Caravel API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url).await?;
    db.migrate().await?;

    let inventory_store = Arc::new(PgInventoryStore::new(db.pool.clone()));
    let order_store = Arc::new(PgOrderStore::new(db.pool.clone()));
    let invoice_store = Arc::new(PgInvoiceStore::new(db.pool.clone()));

    let inventory = InventoryLedger::new(inventory_store);
    let machine = Arc::new(OrderStateMachine::new(
        order_store.clone(),
        inventory.clone(),
    ));

    let policy = match config.business_rules.delivered_count_policy.as_str() {
        "EVERY_OCCURRENCE" => DeliveredCountPolicy::EveryOccurrence,
        _ => DeliveredCountPolicy::FirstOnly,
    };
    let reconciliation = Arc::new(
        ReconciliationLedger::new(order_store, invoice_store.clone())
            .with_delivery_charge(config.business_rules.delivery_charge)
            .with_policy(policy),
    );
    let invoices = Arc::new(InvoiceManager::new(invoice_store));

    let adapters: Vec<Arc<dyn CarrierAdapter>> = vec![
        Arc::new(DashAdapter::new(DashConfig {
            base_url: config.carriers.dash.base_url.clone(),
            client_id: config.carriers.dash.client_id.clone(),
            client_secret: config.carriers.dash.client_secret.clone(),
            timeout_secs: config.carriers.dash.timeout_secs,
        })),
        Arc::new(YdmAdapter::new(YdmConfig {
            base_url: config.carriers.ydm.base_url.clone(),
            username: config.carriers.ydm.username.clone(),
            password: config.carriers.ydm.password.clone(),
            timeout_secs: config.carriers.ydm.timeout_secs,
        })),
        Arc::new(PickNDropAdapter::new(PickNDropConfig {
            base_url: config.carriers.pick_n_drop.base_url.clone(),
            api_key: config.carriers.pick_n_drop.api_key.clone(),
            timeout_secs: config.carriers.pick_n_drop.timeout_secs,
        })),
    ];

    let webhooks = Arc::new(WebhookProcessor::new(machine.clone(), adapters.clone()));
    let orchestrator = Arc::new(DispatchOrchestrator::new(machine.clone(), adapters));

    let app_state = AppState {
        machine,
        inventory,
        reconciliation,
        invoices,
        webhooks,
        orchestrator,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
