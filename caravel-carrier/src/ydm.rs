use async_trait::async_trait;
use caravel_order::{CourierPartner, Logistics, Order, OrderStatus};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::session::{Session, SessionCache};
use crate::{normalize_status, CarrierAdapter, CarrierBranch, CarrierError, DispatchReceipt, StatusMapping};

#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct YdmConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    15
}

/// YDM courier integration. Session tokens come from a login call and are
/// cached until expiry.
pub struct YdmAdapter {
    http: Client,
    config: YdmConfig,
    sessions: SessionCache,
}

impl YdmAdapter {
    pub fn new(config: YdmConfig) -> Self {
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
        struct LoginResponse {
            token: String,
            expires_in: i64,
        }

        let response = self
            .http
            .post(format!("{}/api/v1/auth/login", self.config.base_url))
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CarrierError::Auth(format!(
                "YDM login returned {}",
                response.status()
            )));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Protocol(e.to_string()))?;

        let session = Session::new(body.token, body.expires_in);
        let token = session.token.clone();
        self.sessions.store(session).await;
        tracing::debug!("refreshed YDM session");
        Ok(token)
    }
}

#[async_trait]
impl CarrierAdapter for YdmAdapter {
    fn logistics(&self) -> Logistics {
        Logistics::Ydm
    }

    async fn dispatch(&self, order: &Order) -> Result<DispatchReceipt, CarrierError> {
        let token = self.ensure_session().await?;

        #[derive(Deserialize)]
        struct CreateOrderResponse {
            tracking_id: String,
        }

        let response = self
            .http
            .post(format!("{}/api/v1/orders", self.config.base_url))
            .bearer_auth(&token)
            .json(&json!({
                "reference": order.code,
                "receiver_name": order.customer.name,
                "receiver_phone": order.customer.phone.inner(),
                "receiver_address": order.customer.address,
                "receiver_city": order.customer.city,
                "cod_amount": order.cod_amount(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CarrierError::Protocol(format!(
                "YDM order creation returned {}",
                response.status()
            )));
        }

        let body: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Protocol(e.to_string()))?;

        Ok(DispatchReceipt {
            tracking_code: body.tracking_id,
        })
    }

    fn map_external_status(&self, raw: &str) -> StatusMapping {
        let status = match normalize_status(raw).as_str() {
            "order_created" | "order_placed" => {
                OrderStatus::SentToCarrier(CourierPartner::Ydm)
            }
            "picked_up" | "dispatched" => OrderStatus::OutForDelivery,
            "rescheduled" => OrderStatus::Rescheduled,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            "returned" => OrderStatus::ReturnedByCarrier,
            "return_pending" => OrderStatus::ReturnPending,
            _ => return StatusMapping::Unrecognized,
        };
        StatusMapping::Mapped(status)
    }

    async fn branches(&self) -> Result<Vec<CarrierBranch>, CarrierError> {
        let token = self.ensure_session().await?;

        #[derive(Deserialize)]
        struct BranchRow {
            id: i64,
            name: String,
            city: Option<String>,
        }

        let rows: Vec<BranchRow> = self
            .http
            .get(format!("{}/api/v1/branches", self.config.base_url))
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
