use axum::{
    extract::{Path, State},
    Json,
};
use caravel_carrier::webhook::{CarrierWebhookEvent, WebhookOutcome};
use caravel_carrier::CarrierBranch;
use caravel_order::Logistics;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub tracking_code: String,
    pub status: String,
    pub comment: Option<String>,
}

/// POST /v1/webhooks/carriers/{carrier}
///
/// Carriers retry on non-2xx, so everything well-formed answers 200,
/// including statuses we do not recognize, which come back as a RECORDED
/// outcome instead of an error.
pub async fn handle_carrier_webhook(
    State(state): State<AppState>,
    Path(carrier): Path<String>,
    Json(payload): Json<WebhookPayload>,
) -> Result<Json<WebhookOutcome>, AppError> {
    let logistics: Logistics = carrier.parse().map_err(AppError::NotFoundError)?;

    let outcome = state
        .webhooks
        .handle(CarrierWebhookEvent {
            logistics,
            external_ref: payload.tracking_code,
            raw_status: payload.status,
            comment: payload.comment,
        })
        .await?;

    Ok(Json(outcome))
}

/// GET /v1/carriers/{carrier}/branches
pub async fn list_branches(
    State(state): State<AppState>,
    Path(carrier): Path<String>,
) -> Result<Json<Vec<CarrierBranch>>, AppError> {
    let logistics: Logistics = carrier.parse().map_err(AppError::NotFoundError)?;
    Ok(Json(state.orchestrator.branches(logistics).await?))
}
