use async_trait::async_trait;
use caravel_order::{Logistics, Order, OrderStatus};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::session::{Session, SessionCache};
use crate::{normalize_status, CarrierAdapter, CarrierBranch, CarrierError, DispatchReceipt, StatusMapping};

#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct DashConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    15
}

/// Dash fleet integration: the operator's own riders, driven through the
/// same adapter seam as the courier partners.
pub struct DashAdapter {
    http: Client,
    config: DashConfig,
    sessions: SessionCache,
}

impl DashAdapter {
    pub fn new(config: DashConfig) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            config,
            sessions: SessionCache::new(),
        }
    }

    async fn ensure_session(&self) -> Result<String, CarrierError> {
        if let Some(session) = self.sessions.valid().await {
            return Ok(session.token);
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let response = self
            .http
            .post(format!("{}/oauth/token", self.config.base_url))
            .json(&json!({
                "client_id": self.config.client_id,
                "client_secret": self.config.client_secret,
                "grant_type": "client_credentials",
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CarrierError::Auth(format!(
                "Dash token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Protocol(e.to_string()))?;

        let session = Session::new(body.access_token, body.expires_in);
        let token = session.token.clone();
        self.sessions.store(session).await;
        tracing::debug!("refreshed Dash session");
        Ok(token)
    }
}

#[async_trait]
impl CarrierAdapter for DashAdapter {
    fn logistics(&self) -> Logistics {
        Logistics::Dash
    }

    async fn dispatch(&self, order: &Order) -> Result<DispatchReceipt, CarrierError> {
        let token = self.ensure_session().await?;

        #[derive(Deserialize)]
        struct TaskResponse {
            task_code: String,
        }

        let response = self
            .http
            .post(format!("{}/api/tasks", self.config.base_url))
            .bearer_auth(&token)
            .json(&json!({
                "order_code": order.code,
                "drop_name": order.customer.name,
                "drop_phone": order.customer.phone.inner(),
                "drop_address": order.customer.address,
                "collect_on_delivery": order.cod_amount(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CarrierError::Protocol(format!(
                "Dash task creation returned {}",
                response.status()
            )));
        }

        let body: TaskResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Protocol(e.to_string()))?;

        Ok(DispatchReceipt {
            tracking_code: body.task_code,
        })
    }

    fn map_external_status(&self, raw: &str) -> StatusMapping {
        let status = match normalize_status(raw).as_str() {
            "received" | "task_created" => OrderStatus::SentToDash,
            "rider_assigned" | "out_for_delivery" => OrderStatus::OutForDelivery,
            "rescheduled" => OrderStatus::Rescheduled,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "returned_by_customer" => OrderStatus::ReturnedByCustomer,
            "return_pending" => OrderStatus::ReturnPending,
            _ => return StatusMapping::Unrecognized,
        };
        StatusMapping::Mapped(status)
    }

    async fn branches(&self) -> Result<Vec<CarrierBranch>, CarrierError> {
        let token = self.ensure_session().await?;

        #[derive(Deserialize)]
        struct HubRow {
            id: i64,
            name: String,
            city: Option<String>,
        }

        let rows: Vec<HubRow> = self
            .http
            .get(format!("{}/api/hubs", self.config.base_url))
            .bearer_auth(&token)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CarrierError::Protocol(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| CarrierBranch {
                external_id: row.id.to_string(),
                name: row.name,
                city: row.city,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> DashAdapter {
        DashAdapter::new(DashConfig {
            base_url: "https://dash.test".into(),
            client_id: "caravel".into(),
            client_secret: "secret".into(),
            timeout_secs: 5,
        })
    }

    #[test]
    fn test_status_table() {
        let adapter = adapter();
        assert_eq!(
            adapter.map_external_status("Rider Assigned"),
            StatusMapping::Mapped(OrderStatus::OutForDelivery)
        );
        assert_eq!(
            adapter.map_external_status("received"),
            StatusMapping::Mapped(OrderStatus::SentToDash)
        );
        assert_eq!(
            adapter.map_external_status("returned_by_customer"),
            StatusMapping::Mapped(OrderStatus::ReturnedByCustomer)
        );
    }

    #[test]
    fn test_unknown_status_is_sentinel() {
        let adapter = adapter();
        assert_eq!(
            adapter.map_external_status("rider_on_break"),
            StatusMapping::Unrecognized
        );
    }
}
