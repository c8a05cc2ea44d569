pub mod app_config;
pub mod database;
pub mod inventory_repo;
pub mod invoice_repo;
pub mod order_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use inventory_repo::PgInventoryStore;
pub use invoice_repo::PgInvoiceStore;
pub use order_repo::PgOrderStore;

use caravel_shared::{OwnerKind, OwnerRef, StockStatus};
use uuid::Uuid;

pub(crate) fn owner_kind_str(kind: OwnerKind) -> &'static str {
    match kind {
        OwnerKind::Factory => "FACTORY",
        OwnerKind::Distributor => "DISTRIBUTOR",
        OwnerKind::Franchise => "FRANCHISE",
    }
}

pub(crate) fn owner_from_parts(kind: &str, id: Uuid) -> Result<OwnerRef, String> {
    match kind {
        "FACTORY" => Ok(OwnerRef::Factory(id)),
        "DISTRIBUTOR" => Ok(OwnerRef::Distributor(id)),
        "FRANCHISE" => Ok(OwnerRef::Franchise(id)),
        other => Err(format!("unknown owner kind in store: {}", other)),
    }
}

pub(crate) fn stock_status_str(status: StockStatus) -> &'static str {
    match status {
        StockStatus::Incoming => "incoming",
        StockStatus::RawMaterial => "raw_material",
        StockStatus::ReadyToDispatch => "ready_to_dispatch",
        StockStatus::DamagedReturned => "damaged_returned",
    }
}

pub(crate) fn stock_status_from(raw: &str) -> Result<StockStatus, String> {
    match raw {
        "incoming" => Ok(StockStatus::Incoming),
        "raw_material" => Ok(StockStatus::RawMaterial),
        "ready_to_dispatch" => Ok(StockStatus::ReadyToDispatch),
        "damaged_returned" => Ok(StockStatus::DamagedReturned),
        other => Err(format!("unknown stock status in store: {}", other)),
    }
}
