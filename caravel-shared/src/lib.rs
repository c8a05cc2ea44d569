pub mod models;
pub mod pii;

pub use models::{OwnerKind, OwnerRef, StockStatus};
