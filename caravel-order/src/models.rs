use std::fmt;
use std::str::FromStr;

use caravel_shared::pii::Masked;
use caravel_shared::OwnerRef;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// The courier partners orders can be handed to besides the operator's own
/// Dash fleet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourierPartner {
    Ydm,
    PickNDrop,
}

/// Carrier selector on an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Logistics {
    Dash,
    Ydm,
    PickNDrop,
}

impl Logistics {
    /// The courier partner behind this selector, if it is not the own fleet.
    pub fn courier(&self) -> Option<CourierPartner> {
        match self {
            Logistics::Dash => None,
            Logistics::Ydm => Some(CourierPartner::Ydm),
            Logistics::PickNDrop => Some(CourierPartner::PickNDrop),
        }
    }
}

impl fmt::Display for Logistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Logistics::Dash => "DASH",
            Logistics::Ydm => "YDM",
            Logistics::PickNDrop => "PICK_N_DROP",
        };
        f.write_str(name)
    }
}

impl FromStr for Logistics {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DASH" => Ok(Logistics::Dash),
            "YDM" => Ok(Logistics::Ydm),
            "PICK_N_DROP" | "PICKNDROP" => Ok(Logistics::PickNDrop),
            other => Err(format!("unknown logistics provider: {}", other)),
        }
    }
}

/// Canonical order lifecycle vocabulary. Raw carrier strings never reach
/// this type; adapters map into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Processing,
    Verified,
    SentToDash,
    SentToCarrier(CourierPartner),
    OutForDelivery,
    Rescheduled,
    Delivered,
    Cancelled,
    ReturnedByCustomer,
    ReturnedByCarrier,
    ReturnPending,
}

impl OrderStatus {
    /// Statuses with no expected onward transition. Manual corrections are
    /// still accepted; only rider assignment is refused.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered
                | OrderStatus::Cancelled
                | OrderStatus::ReturnedByCustomer
                | OrderStatus::ReturnedByCarrier
        )
    }

    /// Statuses whose entry restocks the order's lines.
    pub fn is_cancel_family(&self) -> bool {
        matches!(
            self,
            OrderStatus::Cancelled
                | OrderStatus::ReturnedByCustomer
                | OrderStatus::ReturnedByCarrier
        )
    }

    /// Handed to a carrier, own fleet or courier partner.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, OrderStatus::SentToDash | OrderStatus::SentToCarrier(_))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Verified => "VERIFIED",
            OrderStatus::SentToDash => "SENT_TO_DASH",
            OrderStatus::SentToCarrier(CourierPartner::Ydm) => "SENT_TO_YDM",
            OrderStatus::SentToCarrier(CourierPartner::PickNDrop) => "SENT_TO_PICK_N_DROP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Rescheduled => "RESCHEDULED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::ReturnedByCustomer => "RETURNED_BY_CUSTOMER",
            OrderStatus::ReturnedByCarrier => "RETURNED_BY_CARRIER",
            OrderStatus::ReturnPending => "RETURN_PENDING",
        };
        f.write_str(name)
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "VERIFIED" => Ok(OrderStatus::Verified),
            "SENT_TO_DASH" => Ok(OrderStatus::SentToDash),
            "SENT_TO_YDM" => Ok(OrderStatus::SentToCarrier(CourierPartner::Ydm)),
            "SENT_TO_PICK_N_DROP" => Ok(OrderStatus::SentToCarrier(CourierPartner::PickNDrop)),
            "OUT_FOR_DELIVERY" => Ok(OrderStatus::OutForDelivery),
            "RESCHEDULED" => Ok(OrderStatus::Rescheduled),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "RETURNED_BY_CUSTOMER" => Ok(OrderStatus::ReturnedByCustomer),
            "RETURNED_BY_CARRIER" => Ok(OrderStatus::ReturnedByCarrier),
            "RETURN_PENDING" => Ok(OrderStatus::ReturnPending),
            other => Err(format!("unrecognized order status: {}", other)),
        }
    }
}

// Serialized as the flat SCREAMING_SNAKE_CASE string so the carrier variant
// does not leak enum structure into API payloads or store columns.
impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CashOnDelivery,
    OfficeVisit,
    Indrive,
}

impl PaymentMethod {
    /// Office-visit and Indrive sales close in the same transaction, so the
    /// order starts out delivered.
    pub fn delivers_immediately(&self) -> bool {
        matches!(self, PaymentMethod::OfficeVisit | PaymentMethod::Indrive)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: Masked<String>,
    pub address: String,
    pub city: Option<String>,
}

/// One product position on an order, referencing the creator's stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// The central aggregate. Never hard-deleted; status only moves through the
/// state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub code: String,
    pub owner: Option<OwnerRef>,
    pub customer: CustomerInfo,
    pub lines: Vec<OrderLine>,
    pub total_amount: i64,
    pub prepaid_amount: i64,
    pub delivery_charge: i64,
    pub status: OrderStatus,
    pub logistics: Option<Logistics>,
    pub tracking_code: Option<String>,
    pub payment_method: PaymentMethod,
    /// Free-form operational notes, e.g. unrecognized carrier statuses.
    pub remarks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// COD to collect at the door.
    pub fn cod_amount(&self) -> i64 {
        self.total_amount - self.prepaid_amount
    }
}

/// Unique, human-shareable order code: CRV-YYYYMMDD-XXXX.
pub fn generate_order_code() -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(4)
        .map(char::from)
        .collect();
    format!("CRV-{}-{}", date, suffix.to_uppercase())
}

/// One accepted transition. Append-only; no row is written for no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderChangeLog {
    pub id: Uuid,
    pub order_id: Uuid,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
    pub actor_id: Uuid,
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}

/// At most one active rider per order; reassignment updates in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderAssignment {
    pub order_id: Uuid,
    pub rider_id: Uuid,
    pub assigned_by: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_strings() {
        let statuses = [
            OrderStatus::Pending,
            OrderStatus::SentToDash,
            OrderStatus::SentToCarrier(CourierPartner::Ydm),
            OrderStatus::SentToCarrier(CourierPartner::PickNDrop),
            OrderStatus::ReturnPending,
        ];
        for status in statuses {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_unknown_status_string_is_rejected() {
        assert!("SENT_TO_MOON".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_terminal_and_cancel_family() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Delivered.is_cancel_family());
        assert!(OrderStatus::ReturnedByCarrier.is_cancel_family());
        assert!(!OrderStatus::ReturnPending.is_terminal());
    }

    #[test]
    fn test_order_code_shape() {
        let code = generate_order_code();
        assert!(code.starts_with("CRV-"));
        assert_eq!(code.len(), "CRV-20260101-XXXX".len());
    }

    #[test]
    fn test_status_serializes_flat() {
        let json =
            serde_json::to_string(&OrderStatus::SentToCarrier(CourierPartner::Ydm)).unwrap();
        assert_eq!(json, "\"SENT_TO_YDM\"");
    }
}
