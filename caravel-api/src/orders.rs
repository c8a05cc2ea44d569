use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use caravel_core::identity::Actor;
use caravel_order::{CreateOrder, Logistics, Order, OrderStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub actor: Actor,
    pub order: CreateOrder,
    /// When set, the order is created and handed to this carrier in one
    /// step; a dispatch failure cancels the order again.
    pub dispatch_via: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub new_status: String,
    pub actor_id: Uuid,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogisticsRequest {
    pub logistics: String,
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub rider_id: Uuid,
    pub actor_id: Uuid,
}

fn parse_logistics(raw: &str) -> Result<Logistics, AppError> {
    raw.parse().map_err(AppError::ValidationError)
}

/// POST /v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let order = match request.dispatch_via.as_deref() {
        Some(raw) => {
            let logistics = parse_logistics(raw)?;
            state
                .orchestrator
                .create_and_dispatch(request.order, logistics, &request.actor)
                .await?
        }
        None => {
            state
                .machine
                .create_order(request.order, &request.actor)
                .await?
        }
    };
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /v1/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.machine.get_order(order_id).await?))
}

/// POST /v1/orders/{id}/status
pub async fn transition_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<Order>, AppError> {
    let new_status: OrderStatus = request
        .new_status
        .parse()
        .map_err(AppError::ValidationError)?;

    let order = state
        .machine
        .transition(order_id, new_status, request.actor_id, request.comment)
        .await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/logistics
pub async fn select_logistics(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<LogisticsRequest>,
) -> Result<Json<Order>, AppError> {
    let logistics = parse_logistics(&request.logistics)?;
    let order = state
        .machine
        .select_logistics(order_id, logistics, request.actor_id)
        .await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/dispatch
pub async fn dispatch_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<LogisticsRequest>,
) -> Result<Json<Order>, AppError> {
    let logistics = parse_logistics(&request.logistics)?;
    let order = state
        .orchestrator
        .dispatch(order_id, logistics, request.actor_id)
        .await?;
    Ok(Json(order))
}

/// POST /v1/orders/{id}/assign
pub async fn assign_rider(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .machine
        .assign_rider(order_id, request.rider_id, request.actor_id)
        .await?;
    Ok(Json(order))
}
