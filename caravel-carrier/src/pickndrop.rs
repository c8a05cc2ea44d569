use async_trait::async_trait;
use caravel_order::{CourierPartner, Logistics, Order, OrderStatus};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::{normalize_status, CarrierAdapter, CarrierBranch, CarrierError, DispatchReceipt, StatusMapping};

#[derive(Debug, Clone, serde::Serialize, Deserialize)]
pub struct PickNDropConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    15
}

/// Pick&Drop courier integration. Authenticates with a static API key sent
/// per request; no session handshake.
pub struct PickNDropAdapter {
    http: Client,
    config: PickNDropConfig,
}

impl PickNDropAdapter {
    pub fn new(config: PickNDropConfig) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");
        Self { http, config }
    }
}

#[async_trait]
impl CarrierAdapter for PickNDropAdapter {
    fn logistics(&self) -> Logistics {
        Logistics::PickNDrop
    }

    async fn dispatch(&self, order: &Order) -> Result<DispatchReceipt, CarrierError> {
        #[derive(Deserialize)]
        struct ShipmentResponse {
            shipment_code: String,
        }

        let response = self
            .http
            .post(format!("{}/v2/shipments", self.config.base_url))
            .header("X-Api-Key", &self.config.api_key)
            .json(&json!({
                "merchant_reference": order.code,
                "customer": {
                    "name": order.customer.name,
                    "phone": order.customer.phone.inner(),
                    "address": order.customer.address,
                    "city": order.customer.city,
                },
                "collect_amount": order.cod_amount(),
            }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CarrierError::Auth("Pick&Drop rejected the API key".into()));
        }
        if !response.status().is_success() {
            return Err(CarrierError::Protocol(format!(
                "Pick&Drop shipment creation returned {}",
                response.status()
            )));
        }

        let body: ShipmentResponse = response
            .json()
            .await
            .map_err(|e| CarrierError::Protocol(e.to_string()))?;

        Ok(DispatchReceipt {
            tracking_code: body.shipment_code,
        })
    }

    fn map_external_status(&self, raw: &str) -> StatusMapping {
        let status = match normalize_status(raw).as_str() {
            "package_pickup_assigned" => OrderStatus::SentToCarrier(CourierPartner::PickNDrop),
            "package_picked" => OrderStatus::OutForDelivery,
            "delivery_rescheduled" => OrderStatus::Rescheduled,
            "delivered" => OrderStatus::Delivered,
            "delivery_failed_and_cancelled" => OrderStatus::Cancelled,
            "returned_to_merchant" => OrderStatus::ReturnedByCarrier,
            "return_initiated" => OrderStatus::ReturnPending,
            _ => return StatusMapping::Unrecognized,
        };
        StatusMapping::Mapped(status)
    }

    async fn branches(&self) -> Result<Vec<CarrierBranch>, CarrierError> {
        #[derive(Deserialize)]
        struct LocationRow {
            code: String,
            label: String,
            district: Option<String>,
        }

        let rows: Vec<LocationRow> = self
            .http
            .get(format!("{}/v2/locations", self.config.base_url))
            .header("X-Api-Key", &self.config.api_key)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| CarrierError::Protocol(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| CarrierBranch {
                external_id: row.code,
                name: row.label,
                city: row.district,
            })
            .collect())
    }
}
