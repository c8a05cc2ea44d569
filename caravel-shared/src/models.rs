use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of entity that can hold inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerKind {
    Factory,
    Distributor,
    Franchise,
}

/// Reference to the single entity holding a stock record.
///
/// Exactly one of factory, distributor or franchise; the variants are
/// mutually exclusive by construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerRef {
    Factory(Uuid),
    Distributor(Uuid),
    Franchise(Uuid),
}

impl OwnerRef {
    pub fn kind(&self) -> OwnerKind {
        match self {
            OwnerRef::Factory(_) => OwnerKind::Factory,
            OwnerRef::Distributor(_) => OwnerKind::Distributor,
            OwnerRef::Franchise(_) => OwnerKind::Franchise,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            OwnerRef::Factory(id) | OwnerRef::Distributor(id) | OwnerRef::Franchise(id) => *id,
        }
    }
}

/// Status tag on a stock record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    Incoming,
    RawMaterial,
    ReadyToDispatch,
    DamagedReturned,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_ref_kind_and_id() {
        let id = Uuid::new_v4();
        let owner = OwnerRef::Franchise(id);

        assert_eq!(owner.kind(), OwnerKind::Franchise);
        assert_eq!(owner.id(), id);
    }

    #[test]
    fn test_stock_status_wire_format() {
        let json = serde_json::to_string(&StockStatus::ReadyToDispatch).unwrap();
        assert_eq!(json, "\"ready_to_dispatch\"");
    }
}
