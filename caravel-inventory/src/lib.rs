pub mod ledger;
pub mod product;
pub mod store;

pub use ledger::{ChangeAction, InventoryChangeLog, InventoryError, InventoryLedger, InventoryRecord};
pub use product::Product;
pub use store::{InventoryStore, MemoryInventoryStore, QuantityMutation};
