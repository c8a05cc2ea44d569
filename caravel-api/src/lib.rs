use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod finance;
pub mod inventory;
pub mod orders;
pub mod state;
pub mod webhooks;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/v1/orders", post(orders::create_order))
        .route("/v1/orders/{id}", get(orders::get_order))
        .route("/v1/orders/{id}/status", post(orders::transition_order))
        .route("/v1/orders/{id}/logistics", post(orders::select_logistics))
        .route("/v1/orders/{id}/dispatch", post(orders::dispatch_order))
        .route("/v1/orders/{id}/assign", post(orders::assign_rider))
        .route(
            "/v1/webhooks/carriers/{carrier}",
            post(webhooks::handle_carrier_webhook),
        )
        .route(
            "/v1/carriers/{carrier}/branches",
            get(webhooks::list_branches),
        )
        .route("/v1/products", post(inventory::create_product))
        .route("/v1/stock", post(inventory::add_stock))
        .route("/v1/stock/adjust", post(inventory::adjust_stock))
        .route(
            "/v1/stock/{owner_kind}/{owner_id}/{product_id}/history",
            get(inventory::stock_history),
        )
        .route(
            "/v1/franchises/{id}/statement",
            get(finance::franchise_statement),
        )
        .route("/v1/franchises/{id}/pending-cod", get(finance::pending_cod))
        .route("/v1/franchises/{id}/invoices", get(finance::list_invoices))
        .route(
            "/v1/franchises/{id}/payment-logs",
            post(finance::log_payment).get(finance::list_payment_logs),
        )
        .route("/v1/invoices", post(finance::create_invoice))
        .route("/v1/invoices/{id}/approve", post(finance::approve_invoice))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests;
