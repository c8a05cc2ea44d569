use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use caravel_carrier::orchestrator::DispatchError;
use caravel_carrier::webhook::WebhookError;
use caravel_carrier::CarrierError;
use caravel_inventory::InventoryError;
use caravel_ledger::LedgerError;
use caravel_order::OrderError;
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    ForbiddenError(String),
    CarrierUnavailable(String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::ForbiddenError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::CarrierUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<OrderError> for AppError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::NotFound(id) => AppError::NotFoundError(format!("order {}", id)),
            OrderError::Validation(msg) => AppError::ValidationError(msg),
            OrderError::Forbidden(msg) => AppError::ForbiddenError(msg),
            OrderError::InvalidTransition { from, to } => {
                AppError::ValidationError(format!("invalid transition from {} to {}", from, to))
            }
            OrderError::Inventory(InventoryError::InsufficientStock {
                requested,
                available,
            }) => AppError::ConflictError(format!(
                "insufficient stock: requested {}, available {}",
                requested, available
            )),
            OrderError::Inventory(InventoryError::Validation(msg)) => {
                AppError::ValidationError(msg)
            }
            // A missing record during a restock is a data-integrity gap,
            // not a caller mistake.
            OrderError::Inventory(err) => AppError::InternalServerError(err.to_string()),
            OrderError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<InventoryError> for AppError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::NotFound { .. } => AppError::NotFoundError(err.to_string()),
            InventoryError::InsufficientStock { .. } => AppError::ConflictError(err.to_string()),
            InventoryError::Validation(msg) => AppError::ValidationError(msg),
            InventoryError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(id) => AppError::NotFoundError(format!("invoice {}", id)),
            LedgerError::Validation(msg) => AppError::ValidationError(msg),
            LedgerError::Order(order_err) => order_err.into(),
            LedgerError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::UnknownCarrier(logistics) => {
                AppError::NotFoundError(format!("unknown carrier {}", logistics))
            }
            WebhookError::OrderNotFound(reference) => {
                AppError::NotFoundError(format!("no order with tracking reference {}", reference))
            }
            WebhookError::Order(order_err) => order_err.into(),
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NoAdapter(logistics) => {
                AppError::NotFoundError(format!("unknown carrier {}", logistics))
            }
            DispatchError::Order(order_err) => order_err.into(),
            DispatchError::Carrier(CarrierError::Unavailable(msg)) => {
                AppError::CarrierUnavailable(msg)
            }
            DispatchError::Carrier(err) => AppError::CarrierUnavailable(err.to_string()),
        }
    }
}
