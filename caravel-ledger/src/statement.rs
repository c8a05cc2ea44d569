use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use caravel_order::{Order, OrderChangeLog, OrderStatus, OrderStore};
use caravel_shared::OwnerRef;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::invoice::{InvoiceStore, LedgerError};

/// Standard per-delivery charge deducted for every delivered order.
pub const DEFAULT_DELIVERY_CHARGE: i64 = 100;

/// How an order that toggles into Delivered more than once counts toward
/// delivered statistics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveredCountPolicy {
    /// Only the earliest Delivered entry counts.
    FirstOnly,
    /// Every entry into Delivered counts, e.g. rescheduled-then-redelivered
    /// orders count twice.
    EveryOccurrence,
}

/// One reconciled day for a franchise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayStatement {
    pub date: NaiveDate,
    pub dispatched_count: i64,
    pub dispatched_amount: i64,
    pub delivered_count: i64,
    /// COD collected that day: Σ (total − prepaid) over delivered orders.
    pub cash_in: i64,
    /// Per-delivery charge × delivered count.
    pub delivery_charge: i64,
    /// Approved-invoice payments recorded that day.
    pub payments: i64,
    /// Running balance carried forward from the opening balance.
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub franchise_id: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Balance over all activity strictly before the range.
    pub opening_balance: i64,
    pub days: Vec<DayStatement>,
    pub current_pending_cod: i64,
}

#[derive(Debug, Default, Clone, Copy)]
struct DayDelta {
    dispatched_count: i64,
    dispatched_amount: i64,
    delivered_count: i64,
    cash_in: i64,
    payments: i64,
}

impl DayDelta {
    fn net(&self, delivery_charge: i64) -> i64 {
        self.cash_in - self.delivered_count * delivery_charge - self.payments
    }
}

/// Read-model over orders, their transition log and approved invoices.
///
/// Both the day-by-day statement and the standalone pending-COD figure are
/// folds over one daily-delta computation, so the two can never disagree.
pub struct ReconciliationLedger {
    orders: Arc<dyn OrderStore>,
    invoices: Arc<dyn InvoiceStore>,
    delivery_charge: i64,
    policy: DeliveredCountPolicy,
}

impl ReconciliationLedger {
    pub fn new(orders: Arc<dyn OrderStore>, invoices: Arc<dyn InvoiceStore>) -> Self {
        Self {
            orders,
            invoices,
            delivery_charge: DEFAULT_DELIVERY_CHARGE,
            policy: DeliveredCountPolicy::FirstOnly,
        }
    }

    pub fn with_delivery_charge(mut self, delivery_charge: i64) -> Self {
        self.delivery_charge = delivery_charge;
        self
    }

    pub fn with_policy(mut self, policy: DeliveredCountPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Day-by-day statement for an inclusive date range, with the running
    /// balance seeded by all activity before the range start.
    pub async fn statement(
        &self,
        franchise_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Statement, LedgerError> {
        if start > end {
            return Err(LedgerError::Validation(
                "range start must not be after its end".into(),
            ));
        }

        let deltas = self.daily_deltas(franchise_id).await?;

        let opening_balance: i64 = deltas
            .range(..start)
            .map(|(_, delta)| delta.net(self.delivery_charge))
            .sum();

        let mut days = Vec::new();
        let mut balance = opening_balance;
        let mut date = start;
        while date <= end {
            let delta = deltas.get(&date).copied().unwrap_or_default();
            balance += delta.net(self.delivery_charge);
            days.push(DayStatement {
                date,
                dispatched_count: delta.dispatched_count,
                dispatched_amount: delta.dispatched_amount,
                delivered_count: delta.delivered_count,
                cash_in: delta.cash_in,
                delivery_charge: delta.delivered_count * self.delivery_charge,
                payments: delta.payments,
                balance,
            });
            date = date
                .succ_opt()
                .ok_or_else(|| LedgerError::Validation("date out of range".into()))?;
        }

        Ok(Statement {
            franchise_id,
            start,
            end,
            opening_balance,
            days,
            current_pending_cod: Self::pending_from(&deltas, self.delivery_charge),
        })
    }

    /// Amount the operator currently owes the franchise, floored at zero.
    pub async fn pending_cod(&self, franchise_id: Uuid) -> Result<i64, LedgerError> {
        let deltas = self.daily_deltas(franchise_id).await?;
        Ok(Self::pending_from(&deltas, self.delivery_charge))
    }

    fn pending_from(deltas: &BTreeMap<NaiveDate, DayDelta>, delivery_charge: i64) -> i64 {
        deltas
            .values()
            .map(|delta| delta.net(delivery_charge))
            .sum::<i64>()
            .max(0)
    }

    async fn daily_deltas(
        &self,
        franchise_id: Uuid,
    ) -> Result<BTreeMap<NaiveDate, DayDelta>, LedgerError> {
        let owner = OwnerRef::Franchise(franchise_id);
        let orders = self.orders.orders_for_owner(owner).await?;
        let mut logs = self.orders.logs_for_owner(owner).await?;
        logs.sort_by_key(|entry| entry.at);

        let mut logs_by_order: HashMap<Uuid, Vec<OrderChangeLog>> = HashMap::new();
        for entry in logs {
            logs_by_order.entry(entry.order_id).or_default().push(entry);
        }
        let empty: Vec<OrderChangeLog> = Vec::new();

        let mut deltas: BTreeMap<NaiveDate, DayDelta> = BTreeMap::new();

        for order in &orders {
            let order_logs = logs_by_order.get(&order.id).unwrap_or(&empty);

            if let Some(date) = first_reached(order, order_logs, |s| s.is_dispatched()) {
                let delta = deltas.entry(date).or_default();
                delta.dispatched_count += 1;
                delta.dispatched_amount += order.total_amount;
            }

            for date in self.delivered_dates(order, order_logs) {
                let delta = deltas.entry(date).or_default();
                delta.delivered_count += 1;
                delta.cash_in += order.cod_amount();
            }
        }

        for invoice in self.invoices.for_franchise(franchise_id).await? {
            if !invoice.is_approved {
                continue;
            }
            if let Some(approved_at) = invoice.approved_at {
                deltas
                    .entry(approved_at.date_naive())
                    .or_default()
                    .payments += invoice.paid_amount;
            }
        }

        Ok(deltas)
    }

    fn delivered_dates(&self, order: &Order, logs: &[OrderChangeLog]) -> Vec<NaiveDate> {
        match self.policy {
            DeliveredCountPolicy::FirstOnly => {
                first_reached(order, logs, |s| s == OrderStatus::Delivered)
                    .into_iter()
                    .collect()
            }
            DeliveredCountPolicy::EveryOccurrence => {
                let dates: Vec<NaiveDate> = logs
                    .iter()
                    .filter(|entry| entry.new_status == OrderStatus::Delivered)
                    .map(|entry| entry.at.date_naive())
                    .collect();
                if dates.is_empty() && order.status == OrderStatus::Delivered {
                    vec![order.created_at.date_naive()]
                } else {
                    dates
                }
            }
        }
    }
}

/// The earliest log row matching the predicate decides the day, never
/// later repeats, so a status that toggles twice counts once. Orders with
/// no matching row whose current status matches (e.g. delivered at
/// creation, or legacy data) fall back to their creation date.
fn first_reached(
    order: &Order,
    logs: &[OrderChangeLog],
    matches: impl Fn(OrderStatus) -> bool,
) -> Option<NaiveDate> {
    logs.iter()
        .find(|entry| matches(entry.new_status))
        .map(|entry| entry.at.date_naive())
        .or_else(|| {
            if matches(order.status) {
                Some(order.created_at.date_naive())
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{Invoice, MemoryInvoiceStore};
    use caravel_order::{CourierPartner, CustomerInfo, MemoryOrderStore, OrderLine, PaymentMethod};
    use caravel_shared::pii::Masked;
    use chrono::{DateTime, TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, d, 12, 0, 0).unwrap()
    }

    fn order(
        franchise_id: Uuid,
        total: i64,
        prepaid: i64,
        status: OrderStatus,
        created: DateTime<Utc>,
    ) -> Order {
        Order {
            id: Uuid::new_v4(),
            code: format!("CRV-TEST-{}", &Uuid::new_v4().to_string()[..4]),
            owner: Some(OwnerRef::Franchise(franchise_id)),
            customer: CustomerInfo {
                name: "Customer".into(),
                phone: Masked::new("9800000000".into()),
                address: "Lalitpur".into(),
                city: None,
            },
            lines: vec![OrderLine {
                product_id: Uuid::new_v4(),
                quantity: 1,
            }],
            total_amount: total,
            prepaid_amount: prepaid,
            delivery_charge: 100,
            status,
            logistics: None,
            tracking_code: None,
            payment_method: PaymentMethod::CashOnDelivery,
            remarks: Vec::new(),
            created_at: created,
            updated_at: created,
        }
    }

    fn log(
        order_id: Uuid,
        old: OrderStatus,
        new: OrderStatus,
        when: DateTime<Utc>,
    ) -> OrderChangeLog {
        OrderChangeLog {
            id: Uuid::new_v4(),
            order_id,
            old_status: old,
            new_status: new,
            actor_id: Uuid::new_v4(),
            comment: None,
            at: when,
        }
    }

    struct Fixture {
        orders: Arc<MemoryOrderStore>,
        invoices: Arc<MemoryInvoiceStore>,
        franchise: Uuid,
    }

    fn fixture() -> Fixture {
        Fixture {
            orders: Arc::new(MemoryOrderStore::new()),
            invoices: Arc::new(MemoryInvoiceStore::new()),
            franchise: Uuid::new_v4(),
        }
    }

    impl Fixture {
        fn ledger(&self) -> ReconciliationLedger {
            ReconciliationLedger::new(self.orders.clone(), self.invoices.clone())
        }

        async fn approved_invoice(&self, amount: i64, when: DateTime<Utc>) {
            self.invoices
                .insert(Invoice {
                    id: Uuid::new_v4(),
                    franchise_id: self.franchise,
                    paid_amount: amount,
                    is_approved: true,
                    approved_at: Some(when),
                    approved_by: Some(Uuid::new_v4()),
                    created_at: when,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_day_statement_worked_example() {
        let fx = fixture();

        // Order of 1000 with 200 prepaid, delivered on day 2.
        let o = order(fx.franchise, 1000, 200, OrderStatus::Delivered, at(1));
        fx.orders.insert(o.clone()).await.unwrap();
        fx.orders
            .append_log(log(
                o.id,
                OrderStatus::SentToCarrier(CourierPartner::Ydm),
                OrderStatus::Delivered,
                at(2),
            ))
            .await
            .unwrap();

        let statement = fx
            .ledger()
            .statement(fx.franchise, day(2), day(2))
            .await
            .unwrap();

        let d = &statement.days[0];
        assert_eq!(d.delivered_count, 1);
        assert_eq!(d.cash_in, 800);
        assert_eq!(d.delivery_charge, 100);
        assert_eq!(d.balance, 700);
    }

    #[tokio::test]
    async fn test_double_delivery_counts_once_under_first_only() {
        let fx = fixture();
        let o = order(fx.franchise, 1000, 0, OrderStatus::Delivered, at(1));
        fx.orders.insert(o.clone()).await.unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::OutForDelivery, OrderStatus::Delivered, at(2)))
            .await
            .unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::Delivered, OrderStatus::Rescheduled, at(3)))
            .await
            .unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::Rescheduled, OrderStatus::Delivered, at(4)))
            .await
            .unwrap();

        let statement = fx
            .ledger()
            .statement(fx.franchise, day(1), day(5))
            .await
            .unwrap();
        let total_delivered: i64 = statement.days.iter().map(|d| d.delivered_count).sum();
        assert_eq!(total_delivered, 1);
        assert_eq!(statement.days[1].delivered_count, 1); // day 2, the first occurrence
    }

    #[tokio::test]
    async fn test_every_occurrence_policy_counts_each_delivery() {
        let fx = fixture();
        let o = order(fx.franchise, 1000, 0, OrderStatus::Delivered, at(1));
        fx.orders.insert(o.clone()).await.unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::OutForDelivery, OrderStatus::Delivered, at(2)))
            .await
            .unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::Delivered, OrderStatus::Rescheduled, at(3)))
            .await
            .unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::Rescheduled, OrderStatus::Delivered, at(4)))
            .await
            .unwrap();

        let ledger = fx.ledger().with_policy(DeliveredCountPolicy::EveryOccurrence);
        let statement = ledger.statement(fx.franchise, day(1), day(5)).await.unwrap();
        let total_delivered: i64 = statement.days.iter().map(|d| d.delivered_count).sum();
        assert_eq!(total_delivered, 2);
    }

    #[tokio::test]
    async fn test_delivered_at_creation_falls_back_to_created_date() {
        let fx = fixture();

        // Office-visit style order: delivered from the start, no log rows.
        let o = order(fx.franchise, 400, 0, OrderStatus::Delivered, at(3));
        fx.orders.insert(o).await.unwrap();

        let statement = fx
            .ledger()
            .statement(fx.franchise, day(3), day(3))
            .await
            .unwrap();
        assert_eq!(statement.days[0].delivered_count, 1);
        assert_eq!(statement.days[0].cash_in, 400);
    }

    #[tokio::test]
    async fn test_pending_cod_matches_last_day_of_full_history_statement() {
        let fx = fixture();

        // Delivered on day 1.
        let a = order(fx.franchise, 1000, 0, OrderStatus::Delivered, at(1));
        fx.orders.insert(a.clone()).await.unwrap();
        fx.orders
            .append_log(log(a.id, OrderStatus::Pending, OrderStatus::SentToDash, at(1)))
            .await
            .unwrap();
        fx.orders
            .append_log(log(a.id, OrderStatus::SentToDash, OrderStatus::Delivered, at(1)))
            .await
            .unwrap();

        // Delivered on day 2 with prepaid portion.
        let b = order(fx.franchise, 600, 100, OrderStatus::Delivered, at(1));
        fx.orders.insert(b.clone()).await.unwrap();
        fx.orders
            .append_log(log(b.id, OrderStatus::Pending, OrderStatus::Delivered, at(2)))
            .await
            .unwrap();

        // Cancelled on day 2, contributes nothing.
        let c = order(fx.franchise, 800, 0, OrderStatus::Cancelled, at(1));
        fx.orders.insert(c.clone()).await.unwrap();
        fx.orders
            .append_log(log(c.id, OrderStatus::Pending, OrderStatus::Cancelled, at(2)))
            .await
            .unwrap();

        // 300 paid out on day 2.
        fx.approved_invoice(300, at(2)).await;

        let ledger = fx.ledger();
        let pending = ledger.pending_cod(fx.franchise).await.unwrap();
        // (1000 - 100) + (500 - 100) - 300
        assert_eq!(pending, 1000);

        let statement = ledger.statement(fx.franchise, day(1), day(4)).await.unwrap();
        assert_eq!(statement.days.last().unwrap().balance, pending);
        assert_eq!(statement.current_pending_cod, pending);
    }

    #[tokio::test]
    async fn test_pending_cod_is_floored_at_zero() {
        let fx = fixture();
        let o = order(fx.franchise, 300, 0, OrderStatus::Delivered, at(1));
        fx.orders.insert(o.clone()).await.unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::Pending, OrderStatus::Delivered, at(1)))
            .await
            .unwrap();
        // Operator already paid out more than was collected.
        fx.approved_invoice(500, at(2)).await;

        let ledger = fx.ledger();
        assert_eq!(ledger.pending_cod(fx.franchise).await.unwrap(), 0);

        let statement = ledger.statement(fx.franchise, day(1), day(2)).await.unwrap();
        // The running balance itself may go negative; the published figure
        // does not, on either code path.
        assert_eq!(statement.days.last().unwrap().balance, -300);
        assert_eq!(statement.current_pending_cod, 0);
    }

    #[tokio::test]
    async fn test_opening_balance_seeds_the_range() {
        let fx = fixture();
        let o = order(fx.franchise, 1000, 0, OrderStatus::Delivered, at(1));
        fx.orders.insert(o.clone()).await.unwrap();
        fx.orders
            .append_log(log(o.id, OrderStatus::Pending, OrderStatus::Delivered, at(1)))
            .await
            .unwrap();

        // Range starts after the delivery; the 900 shows up as opening.
        let statement = fx
            .ledger()
            .statement(fx.franchise, day(5), day(6))
            .await
            .unwrap();
        assert_eq!(statement.opening_balance, 900);
        assert_eq!(statement.days[0].delivered_count, 0);
        assert_eq!(statement.days.last().unwrap().balance, 900);
    }

    #[tokio::test]
    async fn test_dispatched_bucket_counts_first_handover() {
        let fx = fixture();
        let o = order(fx.franchise, 750, 0, OrderStatus::Delivered, at(1));
        fx.orders.insert(o.clone()).await.unwrap();
        fx.orders
            .append_log(log(
                o.id,
                OrderStatus::Pending,
                OrderStatus::SentToCarrier(CourierPartner::PickNDrop),
                at(2),
            ))
            .await
            .unwrap();
        fx.orders
            .append_log(log(
                o.id,
                OrderStatus::SentToCarrier(CourierPartner::PickNDrop),
                OrderStatus::Delivered,
                at(3),
            ))
            .await
            .unwrap();

        let statement = fx
            .ledger()
            .statement(fx.franchise, day(1), day(3))
            .await
            .unwrap();
        assert_eq!(statement.days[1].dispatched_count, 1);
        assert_eq!(statement.days[1].dispatched_amount, 750);
        assert_eq!(statement.days[2].delivered_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_range_is_rejected() {
        let fx = fixture();
        let result = fx.ledger().statement(fx.franchise, day(5), day(2)).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}
