pub mod dash;
pub mod orchestrator;
pub mod pickndrop;
pub mod session;
pub mod webhook;
pub mod ydm;

use async_trait::async_trait;
use caravel_order::{Logistics, Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Result of handing an order to a carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub tracking_code: String,
}

/// A pickup/drop-off location advertised by a carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarrierBranch {
    pub external_id: String,
    pub name: String,
    pub city: Option<String>,
}

/// Outcome of mapping a carrier's native status string.
///
/// Unknown strings are a sentinel, never an error: the caller records them
/// and leaves the order alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMapping {
    Mapped(OrderStatus),
    Unrecognized,
}

#[derive(Debug, thiserror::Error)]
pub enum CarrierError {
    #[error("Carrier unavailable: {0}")]
    Unavailable(String),

    #[error("Carrier authentication failed: {0}")]
    Auth(String),

    #[error("Unexpected carrier response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for CarrierError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            CarrierError::Unavailable(err.to_string())
        } else {
            CarrierError::Protocol(err.to_string())
        }
    }
}

/// One implementation per external carrier. Each adapter owns its raw →
/// canonical status table; raw carrier strings never leak past it.
#[async_trait]
pub trait CarrierAdapter: Send + Sync {
    fn logistics(&self) -> Logistics;

    /// Create the shipment with the external carrier and return its
    /// tracking identifier.
    async fn dispatch(&self, order: &Order) -> Result<DispatchReceipt, CarrierError>;

    /// Translate a carrier-native status string into the canonical
    /// vocabulary.
    fn map_external_status(&self, raw: &str) -> StatusMapping;

    /// Fetch the carrier's branch/location list.
    async fn branches(&self) -> Result<Vec<CarrierBranch>, CarrierError>;
}

/// Normalize a carrier status string for table lookup.
pub(crate) fn normalize_status(raw: &str) -> String {
    raw.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}
