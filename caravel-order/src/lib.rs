pub mod machine;
pub mod models;
pub mod store;

pub use machine::{CreateOrder, OrderError, OrderStateMachine};
pub use models::{
    CourierPartner, CustomerInfo, Logistics, Order, OrderChangeLog, OrderLine, OrderStatus,
    PaymentMethod, RiderAssignment,
};
pub use store::{MemoryOrderStore, OrderStore};
