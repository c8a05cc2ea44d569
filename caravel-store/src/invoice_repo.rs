use async_trait::async_trait;
use caravel_ledger::{FranchisePaymentLog, Invoice, InvoiceStore, LedgerError};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgInvoiceStore {
    pool: PgPool,
}

impl PgInvoiceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(err: sqlx::Error) -> LedgerError {
    LedgerError::Storage(err.to_string())
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    franchise_id: Uuid,
    paid_amount: i64,
    is_approved: bool,
    approved_at: Option<DateTime<Utc>>,
    approved_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl From<InvoiceRow> for Invoice {
    fn from(row: InvoiceRow) -> Self {
        Invoice {
            id: row.id,
            franchise_id: row.franchise_id,
            paid_amount: row.paid_amount,
            is_approved: row.is_approved,
            approved_at: row.approved_at,
            approved_by: row.approved_by,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl InvoiceStore for PgInvoiceStore {
    async fn insert(&self, invoice: Invoice) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO invoices (id, franchise_id, paid_amount, is_approved, approved_at, approved_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(invoice.id)
        .bind(invoice.franchise_id)
        .bind(invoice.paid_amount)
        .bind(invoice.is_approved)
        .bind(invoice.approved_at)
        .bind(invoice.approved_by)
        .bind(invoice.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Invoice>, LedgerError> {
        let row: Option<InvoiceRow> = sqlx::query_as(
            "SELECT id, franchise_id, paid_amount, is_approved, approved_at, approved_by, created_at \
             FROM invoices WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Invoice::from))
    }

    async fn update(&self, invoice: Invoice) -> Result<(), LedgerError> {
        let result = sqlx::query(
            "UPDATE invoices SET is_approved = $1, approved_at = $2, approved_by = $3 WHERE id = $4",
        )
        .bind(invoice.is_approved)
        .bind(invoice.approved_at)
        .bind(invoice.approved_by)
        .bind(invoice.id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::NotFound(invoice.id));
        }
        Ok(())
    }

    async fn for_franchise(&self, franchise_id: Uuid) -> Result<Vec<Invoice>, LedgerError> {
        let rows: Vec<InvoiceRow> = sqlx::query_as(
            "SELECT id, franchise_id, paid_amount, is_approved, approved_at, approved_by, created_at \
             FROM invoices WHERE franchise_id = $1 ORDER BY created_at",
        )
        .bind(franchise_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Invoice::from).collect())
    }

    async fn insert_payment_log(&self, log: FranchisePaymentLog) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO franchise_payment_logs (id, franchise_id, amount, note, logged_by, at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(log.id)
        .bind(log.franchise_id)
        .bind(log.amount)
        .bind(&log.note)
        .bind(log.logged_by)
        .bind(log.at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn payment_logs_for(
        &self,
        franchise_id: Uuid,
    ) -> Result<Vec<FranchisePaymentLog>, LedgerError> {
        #[derive(sqlx::FromRow)]
        struct PaymentLogRow {
            id: Uuid,
            franchise_id: Uuid,
            amount: i64,
            note: Option<String>,
            logged_by: Uuid,
            at: DateTime<Utc>,
        }

        let rows: Vec<PaymentLogRow> = sqlx::query_as(
            "SELECT id, franchise_id, amount, note, logged_by, at \
             FROM franchise_payment_logs WHERE franchise_id = $1 ORDER BY at",
        )
        .bind(franchise_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        Ok(rows
            .into_iter()
            .map(|row| FranchisePaymentLog {
                id: row.id,
                franchise_id: row.franchise_id,
                amount: row.amount,
                note: row.note,
                logged_by: row.logged_by,
                at: row.at,
            })
            .collect())
    }
}
