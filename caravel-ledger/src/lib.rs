pub mod invoice;
pub mod statement;

pub use invoice::{
    FranchisePaymentLog, Invoice, InvoiceManager, InvoiceStore, LedgerError, MemoryInvoiceStore,
};
pub use statement::{
    DayStatement, DeliveredCountPolicy, ReconciliationLedger, Statement, DEFAULT_DELIVERY_CHARGE,
};
