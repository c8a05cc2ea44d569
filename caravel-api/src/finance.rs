use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use caravel_ledger::{FranchisePaymentLog, Invoice, Statement};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatementQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct PendingCodResponse {
    pub franchise_id: Uuid,
    pub pending_cod: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub franchise_id: Uuid,
    pub paid_amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApproveInvoiceRequest {
    pub actor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PaymentLogRequest {
    pub amount: i64,
    pub note: Option<String>,
    pub actor_id: Uuid,
}

/// GET /v1/franchises/{id}/statement?start=&end=
pub async fn franchise_statement(
    State(state): State<AppState>,
    Path(franchise_id): Path<Uuid>,
    Query(query): Query<StatementQuery>,
) -> Result<Json<Statement>, AppError> {
    let statement = state
        .reconciliation
        .statement(franchise_id, query.start, query.end)
        .await?;
    Ok(Json(statement))
}

/// GET /v1/franchises/{id}/pending-cod
pub async fn pending_cod(
    State(state): State<AppState>,
    Path(franchise_id): Path<Uuid>,
) -> Result<Json<PendingCodResponse>, AppError> {
    let pending = state.reconciliation.pending_cod(franchise_id).await?;
    Ok(Json(PendingCodResponse {
        franchise_id,
        pending_cod: pending,
    }))
}

/// POST /v1/invoices
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let invoice = state
        .invoices
        .create(request.franchise_id, request.paid_amount)
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// POST /v1/invoices/{id}/approve
pub async fn approve_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<Uuid>,
    Json(request): Json<ApproveInvoiceRequest>,
) -> Result<Json<Invoice>, AppError> {
    let invoice = state
        .invoices
        .approve(invoice_id, request.actor_id)
        .await?;
    Ok(Json(invoice))
}

/// GET /v1/franchises/{id}/invoices
pub async fn list_invoices(
    State(state): State<AppState>,
    Path(franchise_id): Path<Uuid>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    Ok(Json(state.invoices.for_franchise(franchise_id).await?))
}

/// POST /v1/franchises/{id}/payment-logs
pub async fn log_payment(
    State(state): State<AppState>,
    Path(franchise_id): Path<Uuid>,
    Json(request): Json<PaymentLogRequest>,
) -> Result<(StatusCode, Json<FranchisePaymentLog>), AppError> {
    let log = state
        .invoices
        .log_payment(franchise_id, request.amount, request.note, request.actor_id)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// GET /v1/franchises/{id}/payment-logs
pub async fn list_payment_logs(
    State(state): State<AppState>,
    Path(franchise_id): Path<Uuid>,
) -> Result<Json<Vec<FranchisePaymentLog>>, AppError> {
    Ok(Json(
        state.invoices.store().payment_logs_for(franchise_id).await?,
    ))
}
