use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use caravel_order::OrderError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invoice not found: {0}")]
    NotFound(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// A franchise's payment claim against collected COD. Once approved, the
/// paid amount is a permanent deduction in reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub franchise_id: Uuid,
    pub paid_amount: i64,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Record of a payment event from the operator to a franchise. Kept for
/// history only; the balance computation never reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FranchisePaymentLog {
    pub id: Uuid,
    pub franchise_id: Uuid,
    pub amount: i64,
    pub note: Option<String>,
    pub logged_by: Uuid,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    async fn insert(&self, invoice: Invoice) -> Result<(), LedgerError>;

    async fn get(&self, id: Uuid) -> Result<Option<Invoice>, LedgerError>;

    async fn update(&self, invoice: Invoice) -> Result<(), LedgerError>;

    async fn for_franchise(&self, franchise_id: Uuid) -> Result<Vec<Invoice>, LedgerError>;

    async fn insert_payment_log(&self, log: FranchisePaymentLog) -> Result<(), LedgerError>;

    async fn payment_logs_for(
        &self,
        franchise_id: Uuid,
    ) -> Result<Vec<FranchisePaymentLog>, LedgerError>;
}

#[derive(Default)]
struct Inner {
    invoices: HashMap<Uuid, Invoice>,
    payment_logs: Vec<FranchisePaymentLog>,
}

pub struct MemoryInvoiceStore {
    inner: Mutex<Inner>,
}

impl MemoryInvoiceStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryInvoiceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InvoiceStore for MemoryInvoiceStore {
    async fn insert(&self, invoice: Invoice) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        inner.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Invoice>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner.invoices.get(&id).cloned())
    }

    async fn update(&self, invoice: Invoice) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        if !inner.invoices.contains_key(&invoice.id) {
            return Err(LedgerError::NotFound(invoice.id));
        }
        inner.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn for_franchise(&self, franchise_id: Uuid) -> Result<Vec<Invoice>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .invoices
            .values()
            .filter(|invoice| invoice.franchise_id == franchise_id)
            .cloned()
            .collect())
    }

    async fn insert_payment_log(&self, log: FranchisePaymentLog) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock().await;
        inner.payment_logs.push(log);
        Ok(())
    }

    async fn payment_logs_for(
        &self,
        franchise_id: Uuid,
    ) -> Result<Vec<FranchisePaymentLog>, LedgerError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .payment_logs
            .iter()
            .filter(|log| log.franchise_id == franchise_id)
            .cloned()
            .collect())
    }
}

/// Invoice lifecycle operations.
pub struct InvoiceManager {
    store: Arc<dyn InvoiceStore>,
}

impl InvoiceManager {
    pub fn new(store: Arc<dyn InvoiceStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> Arc<dyn InvoiceStore> {
        self.store.clone()
    }

    pub async fn create(
        &self,
        franchise_id: Uuid,
        paid_amount: i64,
    ) -> Result<Invoice, LedgerError> {
        if paid_amount <= 0 {
            return Err(LedgerError::Validation(
                "invoice amount must be positive".into(),
            ));
        }

        let invoice = Invoice {
            id: Uuid::new_v4(),
            franchise_id,
            paid_amount,
            is_approved: false,
            approved_at: None,
            approved_by: None,
            created_at: Utc::now(),
        };
        self.store.insert(invoice.clone()).await?;
        Ok(invoice)
    }

    /// Approve exactly once. Re-approving is a no-op returning the invoice
    /// unchanged: never a second deduction, and approved_at never moves.
    pub async fn approve(&self, id: Uuid, actor_id: Uuid) -> Result<Invoice, LedgerError> {
        let mut invoice = self
            .store
            .get(id)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        if invoice.is_approved {
            return Ok(invoice);
        }

        invoice.is_approved = true;
        invoice.approved_at = Some(Utc::now());
        invoice.approved_by = Some(actor_id);
        self.store.update(invoice.clone()).await?;

        tracing::info!(invoice = %invoice.id, amount = invoice.paid_amount, "invoice approved");
        Ok(invoice)
    }

    pub async fn for_franchise(&self, franchise_id: Uuid) -> Result<Vec<Invoice>, LedgerError> {
        self.store.for_franchise(franchise_id).await
    }

    pub async fn log_payment(
        &self,
        franchise_id: Uuid,
        amount: i64,
        note: Option<String>,
        actor_id: Uuid,
    ) -> Result<FranchisePaymentLog, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::Validation(
                "payment amount must be positive".into(),
            ));
        }

        let log = FranchisePaymentLog {
            id: Uuid::new_v4(),
            franchise_id,
            amount,
            note,
            logged_by: actor_id,
            at: Utc::now(),
        };
        self.store.insert_payment_log(log.clone()).await?;
        Ok(log)
    }
}
