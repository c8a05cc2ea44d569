use async_trait::async_trait;
use caravel_order::{
    CustomerInfo, Logistics, Order, OrderChangeLog, OrderError, OrderLine, OrderStatus,
    OrderStore, PaymentMethod, RiderAssignment,
};
use caravel_shared::pii::Masked;
use caravel_shared::OwnerRef;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{owner_from_parts, owner_kind_str};

/// Postgres-backed order store. Per-order transition serialization happens
/// in the state machine's keyed locks; this layer keeps order + lines and
/// order + log writes transactional.
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(err: sqlx::Error) -> OrderError {
    OrderError::Storage(err.to_string())
}

fn payment_method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::CashOnDelivery => "CASH_ON_DELIVERY",
        PaymentMethod::OfficeVisit => "OFFICE_VISIT",
        PaymentMethod::Indrive => "INDRIVE",
    }
}

fn payment_method_from(raw: &str) -> Result<PaymentMethod, OrderError> {
    match raw {
        "CASH_ON_DELIVERY" => Ok(PaymentMethod::CashOnDelivery),
        "OFFICE_VISIT" => Ok(PaymentMethod::OfficeVisit),
        "INDRIVE" => Ok(PaymentMethod::Indrive),
        other => Err(OrderError::Storage(format!(
            "unknown payment method in store: {}",
            other
        ))),
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    code: String,
    owner_kind: Option<String>,
    owner_id: Option<Uuid>,
    customer_name: String,
    customer_phone: String,
    customer_address: String,
    customer_city: Option<String>,
    total_amount: i64,
    prepaid_amount: i64,
    delivery_charge: i64,
    status: String,
    logistics: Option<String>,
    tracking_code: Option<String>,
    payment_method: String,
    remarks: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Result<Order, OrderError> {
        let owner = match (self.owner_kind, self.owner_id) {
            (Some(kind), Some(id)) => {
                Some(owner_from_parts(&kind, id).map_err(OrderError::Storage)?)
            }
            _ => None,
        };
        let logistics = self
            .logistics
            .as_deref()
            .map(|raw| raw.parse::<Logistics>().map_err(OrderError::Storage))
            .transpose()?;
        let status = self
            .status
            .parse::<OrderStatus>()
            .map_err(OrderError::Storage)?;

        Ok(Order {
            id: self.id,
            code: self.code,
            owner,
            customer: CustomerInfo {
                name: self.customer_name,
                phone: Masked::new(self.customer_phone),
                address: self.customer_address,
                city: self.customer_city,
            },
            lines,
            total_amount: self.total_amount,
            prepaid_amount: self.prepaid_amount,
            delivery_charge: self.delivery_charge,
            status,
            logistics,
            tracking_code: self.tracking_code,
            payment_method: payment_method_from(&self.payment_method)?,
            remarks: self.remarks,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineRow {
    product_id: Uuid,
    quantity: i64,
}

#[derive(sqlx::FromRow)]
struct LogRow {
    id: Uuid,
    order_id: Uuid,
    old_status: String,
    new_status: String,
    actor_id: Uuid,
    comment: Option<String>,
    at: DateTime<Utc>,
}

impl LogRow {
    fn into_log(self) -> Result<OrderChangeLog, OrderError> {
        Ok(OrderChangeLog {
            id: self.id,
            order_id: self.order_id,
            old_status: self
                .old_status
                .parse::<OrderStatus>()
                .map_err(OrderError::Storage)?,
            new_status: self
                .new_status
                .parse::<OrderStatus>()
                .map_err(OrderError::Storage)?,
            actor_id: self.actor_id,
            comment: self.comment,
            at: self.at,
        })
    }
}

const SELECT_ORDER: &str = "SELECT id, code, owner_kind, owner_id, customer_name, \
     customer_phone, customer_address, customer_city, total_amount, prepaid_amount, \
     delivery_charge, status, logistics, tracking_code, payment_method, remarks, \
     created_at, updated_at FROM orders";

impl PgOrderStore {
    async fn lines_for(&self, order_id: Uuid) -> Result<Vec<OrderLine>, OrderError> {
        let rows: Vec<LineRow> =
            sqlx::query_as("SELECT product_id, quantity FROM order_lines WHERE order_id = $1")
                .bind(order_id)
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;
        Ok(rows
            .into_iter()
            .map(|row| OrderLine {
                product_id: row.product_id,
                quantity: row.quantity,
            })
            .collect())
    }

    async fn assemble(&self, row: OrderRow) -> Result<Order, OrderError> {
        let lines = self.lines_for(row.id).await?;
        row.into_order(lines)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: Order) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            "INSERT INTO orders (id, code, owner_kind, owner_id, customer_name, customer_phone, \
             customer_address, customer_city, total_amount, prepaid_amount, delivery_charge, \
             status, logistics, tracking_code, payment_method, remarks, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(order.id)
        .bind(&order.code)
        .bind(order.owner.map(|o| owner_kind_str(o.kind())))
        .bind(order.owner.map(|o| o.id()))
        .bind(&order.customer.name)
        .bind(order.customer.phone.inner())
        .bind(&order.customer.address)
        .bind(&order.customer.city)
        .bind(order.total_amount)
        .bind(order.prepaid_amount)
        .bind(order.delivery_charge)
        .bind(order.status.to_string())
        .bind(order.logistics.map(|l| l.to_string()))
        .bind(&order.tracking_code)
        .bind(payment_method_str(order.payment_method))
        .bind(&order.remarks)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_lines (id, order_id, product_id, quantity) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, OrderError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!("{} WHERE id = $1", SELECT_ORDER))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_tracking(&self, tracking_code: &str) -> Result<Option<Order>, OrderError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("{} WHERE tracking_code = $1", SELECT_ORDER))
                .bind(tracking_code)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        match row {
            Some(row) => Ok(Some(self.assemble(row).await?)),
            None => Ok(None),
        }
    }

    async fn update(&self, order: Order) -> Result<(), OrderError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $1, logistics = $2, tracking_code = $3, remarks = $4, \
             customer_name = $5, customer_phone = $6, customer_address = $7, customer_city = $8, \
             updated_at = $9 WHERE id = $10",
        )
        .bind(order.status.to_string())
        .bind(order.logistics.map(|l| l.to_string()))
        .bind(&order.tracking_code)
        .bind(&order.remarks)
        .bind(&order.customer.name)
        .bind(order.customer.phone.inner())
        .bind(&order.customer.address)
        .bind(&order.customer.city)
        .bind(order.updated_at)
        .bind(order.id)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        if result.rows_affected() == 0 {
            return Err(OrderError::NotFound(order.id));
        }
        Ok(())
    }

    async fn append_log(&self, entry: OrderChangeLog) -> Result<(), OrderError> {
        sqlx::query(
            "INSERT INTO order_change_logs (id, order_id, old_status, new_status, actor_id, comment, at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id)
        .bind(entry.order_id)
        .bind(entry.old_status.to_string())
        .bind(entry.new_status.to_string())
        .bind(entry.actor_id)
        .bind(&entry.comment)
        .bind(entry.at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn logs_for(&self, order_id: Uuid) -> Result<Vec<OrderChangeLog>, OrderError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT id, order_id, old_status, new_status, actor_id, comment, at \
             FROM order_change_logs WHERE order_id = $1 ORDER BY at",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(LogRow::into_log).collect()
    }

    async fn orders_for_owner(&self, owner: OwnerRef) -> Result<Vec<Order>, OrderError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "{} WHERE owner_kind = $1 AND owner_id = $2 ORDER BY created_at",
            SELECT_ORDER
        ))
        .bind(owner_kind_str(owner.kind()))
        .bind(owner.id())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.assemble(row).await?);
        }
        Ok(orders)
    }

    async fn logs_for_owner(&self, owner: OwnerRef) -> Result<Vec<OrderChangeLog>, OrderError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            "SELECT l.id, l.order_id, l.old_status, l.new_status, l.actor_id, l.comment, l.at \
             FROM order_change_logs l \
             JOIN orders o ON o.id = l.order_id \
             WHERE o.owner_kind = $1 AND o.owner_id = $2 ORDER BY l.at",
        )
        .bind(owner_kind_str(owner.kind()))
        .bind(owner.id())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        rows.into_iter().map(LogRow::into_log).collect()
    }

    async fn upsert_assignment(&self, assignment: RiderAssignment) -> Result<(), OrderError> {
        sqlx::query(
            "INSERT INTO rider_assignments (order_id, rider_id, assigned_by, assigned_at) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (order_id) DO UPDATE SET \
             rider_id = EXCLUDED.rider_id, assigned_by = EXCLUDED.assigned_by, \
             assigned_at = EXCLUDED.assigned_at",
        )
        .bind(assignment.order_id)
        .bind(assignment.rider_id)
        .bind(assignment.assigned_by)
        .bind(assignment.assigned_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn assignment_for(
        &self,
        order_id: Uuid,
    ) -> Result<Option<RiderAssignment>, OrderError> {
        #[derive(sqlx::FromRow)]
        struct AssignmentRow {
            order_id: Uuid,
            rider_id: Uuid,
            assigned_by: Uuid,
            assigned_at: DateTime<Utc>,
        }

        let row: Option<AssignmentRow> = sqlx::query_as(
            "SELECT order_id, rider_id, assigned_by, assigned_at \
             FROM rider_assignments WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        Ok(row.map(|row| RiderAssignment {
            order_id: row.order_id,
            rider_id: row.rider_id,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
        }))
    }
}
