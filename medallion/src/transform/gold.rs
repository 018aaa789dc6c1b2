//! Gold stage: aggregate Silver tables into business metrics.
//!
//! Pure functions of their inputs. Grouping uses ordered maps and
//! accumulators that only finalize averages once every row of a key has
//! been seen, so results do not depend on input order or chunking.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use super::silver::SilverTables;
use crate::models::{Customer, CustomerStat, DailySalesMetric, Layer, Money, Order, OrderItem, RejectReason};
use crate::report::{Anomaly, AnomalyKind, RejectionTally, StageResult, TableReport};

/// Logical names of the Gold tables.
pub const DAILY_SALES: &str = "daily_sales";
pub const CUSTOMER_STATS: &str = "customer_stats";

/// Both Gold metric tables.
#[derive(Debug, Clone, PartialEq)]
pub struct GoldTables {
    pub daily_sales: Vec<DailySalesMetric>,
    pub customer_stats: Vec<CustomerStat>,
}

/// Customer statistics plus the customers that could not be joined.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerStats {
    pub rows: Vec<CustomerStat>,
    /// Distinct customer ids referenced by orders but absent from the
    /// cleaned customer table.
    pub orphaned_customers: usize,
}

/// Sum of item totals per order id.
fn item_totals(items: &[OrderItem]) -> HashMap<&str, Money> {
    let mut totals: HashMap<&str, Money> = HashMap::new();
    for item in items {
        *totals.entry(item.order_id.as_str()).or_default() += item.total();
    }
    totals
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Daily sales
// =============================================================================

/// Partial aggregate for one purchase date.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyAccumulator {
    order_count: u64,
    revenue: Money,
    delivered_orders: u64,
    delivery_days: i64,
}

impl DailyAccumulator {
    fn add_order(&mut self, order: &Order, revenue: Money) {
        self.order_count += 1;
        self.revenue += revenue;
        if let Some(days) = order.days_to_deliver() {
            self.delivered_orders += 1;
            self.delivery_days += days;
        }
    }

    /// Combine two partial aggregates of the same date.
    pub fn merge(&mut self, other: &DailyAccumulator) {
        self.order_count += other.order_count;
        self.revenue += other.revenue;
        self.delivered_orders += other.delivered_orders;
        self.delivery_days += other.delivery_days;
    }

    fn finish(self, date: NaiveDate) -> DailySalesMetric {
        let avg_delivery_days = (self.delivered_orders > 0)
            .then(|| round2(self.delivery_days as f64 / self.delivered_orders as f64));

        DailySalesMetric {
            date,
            order_count: self.order_count,
            revenue: self.revenue,
            avg_delivery_days,
        }
    }
}

/// Accumulate one chunk of orders. `items` may be the full item table:
/// only items of orders in this chunk contribute.
pub fn accumulate_daily(orders: &[Order], items: &[OrderItem]) -> BTreeMap<NaiveDate, DailyAccumulator> {
    let totals = item_totals(items);
    let mut days: BTreeMap<NaiveDate, DailyAccumulator> = BTreeMap::new();

    for order in orders {
        let revenue = totals.get(order.order_id.as_str()).copied().unwrap_or(Money::ZERO);
        days.entry(order.purchase_date()).or_default().add_order(order, revenue);
    }

    days
}

/// Merge chunk aggregates and finalize them, ascending by date.
pub fn finish_daily<I>(chunks: I) -> Vec<DailySalesMetric>
where
    I: IntoIterator<Item = BTreeMap<NaiveDate, DailyAccumulator>>,
{
    let mut merged: BTreeMap<NaiveDate, DailyAccumulator> = BTreeMap::new();
    for chunk in chunks {
        for (date, acc) in chunk {
            merged.entry(date).or_default().merge(&acc);
        }
    }
    merged.into_iter().map(|(date, acc)| acc.finish(date)).collect()
}

/// Sales per purchase date, ascending by date.
///
/// Orders without items count toward `order_count` with zero revenue.
/// `avg_delivery_days` averages whole delivery days over delivered orders
/// only and is `None` when a date has none.
pub fn compute_daily_sales(orders: &[Order], items: &[OrderItem]) -> Vec<DailySalesMetric> {
    finish_daily([accumulate_daily(orders, items)])
}

// =============================================================================
// Customer statistics
// =============================================================================

#[derive(Debug, Default)]
struct CustomerAccumulator {
    order_count: u64,
    total_spend: Money,
}

/// Spend per customer, by descending total spend then ascending customer id.
///
/// Customers referenced by orders but missing from `customers` are left
/// out and counted in [`CustomerStats::orphaned_customers`].
pub fn compute_customer_stats(orders: &[Order], items: &[OrderItem], customers: &[Customer]) -> CustomerStats {
    let totals = item_totals(items);
    let states: HashMap<&str, &Customer> = customers.iter().map(|c| (c.customer_id.as_str(), c)).collect();

    let mut groups: BTreeMap<&str, CustomerAccumulator> = BTreeMap::new();
    for order in orders {
        let acc = groups.entry(order.customer_id.as_str()).or_default();
        acc.order_count += 1;
        acc.total_spend += totals.get(order.order_id.as_str()).copied().unwrap_or(Money::ZERO);
    }

    let mut orphaned = HashSet::new();
    let mut rows: Vec<CustomerStat> = groups
        .into_iter()
        .filter_map(|(customer_id, acc)| {
            let Some(customer) = states.get(customer_id) else {
                orphaned.insert(customer_id);
                return None;
            };
            Some(CustomerStat {
                customer_id: customer_id.to_string(),
                order_count: acc.order_count,
                total_spend: acc.total_spend,
                avg_order_value: acc.total_spend.div_round(acc.order_count).unwrap_or_default(),
                state: customer.state.clone(),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total_spend
            .cmp(&a.total_spend)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    CustomerStats {
        rows,
        orphaned_customers: orphaned.len(),
    }
}

/// Run the whole Gold stage.
pub fn run(silver: &SilverTables) -> (GoldTables, StageResult) {
    let started = Instant::now();

    let daily_sales = compute_daily_sales(&silver.orders, &silver.order_items);
    let stats = compute_customer_stats(&silver.orders, &silver.order_items, &silver.customers);

    let mut orphans = RejectionTally::default();
    orphans.add(RejectReason::OrphanedCustomer, stats.orphaned_customers);

    let tables = vec![
        TableReport::new(DAILY_SALES, silver.orders.len(), daily_sales.len(), RejectionTally::default()),
        TableReport::new(CUSTOMER_STATS, silver.orders.len(), stats.rows.len(), orphans),
    ];
    let mut result = StageResult::new(Layer::Gold, tables, started.elapsed());

    if stats.orphaned_customers > 0 {
        result = result.with_anomaly(Anomaly {
            kind: AnomalyKind::OrphanedCustomers,
            stage: Layer::Gold,
            table: CUSTOMER_STATS.to_string(),
            detail: format!(
                "{} customer id(s) referenced by orders have no cleaned customer row",
                stats.orphaned_customers
            ),
        });
    }

    let gold = GoldTables {
        daily_sales,
        customer_stats: stats.rows,
    };

    (gold, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStatus, StateCode};

    fn at(day: u32, hour: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn order(id: &str, customer: &str, purchased: chrono::NaiveDateTime, delivered: Option<chrono::NaiveDateTime>) -> Order {
        Order {
            order_id: id.into(),
            customer_id: customer.into(),
            status: OrderStatus::Delivered,
            purchased_at: purchased,
            approved_at: None,
            delivered_carrier_at: None,
            delivered_at: delivered,
            estimated_delivery_at: None,
        }
    }

    fn item(order_id: &str, seq: u32, price: i64, freight: i64) -> OrderItem {
        OrderItem {
            order_id: order_id.into(),
            item_seq: seq,
            product_id: None,
            price: Money::from_cents(price),
            freight_value: Money::from_cents(freight),
        }
    }

    fn customer(id: &str, state: &str) -> Customer {
        Customer {
            customer_id: id.into(),
            customer_unique_id: None,
            zip_code_prefix: None,
            city: None,
            state: StateCode::new_unchecked(state.into()),
        }
    }

    #[test]
    fn test_two_orders_same_day_revenue() {
        let orders = vec![order("1", "A", at(1, 9), None), order("2", "B", at(1, 17), None)];
        let items = vec![item("1", 1, 9000, 1000), item("2", 1, 4000, 500), item("2", 2, 500, 0)];

        let daily = compute_daily_sales(&orders, &items);

        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(daily[0].order_count, 2);
        assert_eq!(daily[0].revenue, Money::from_cents(15000));
    }

    #[test]
    fn test_order_without_items_counts_with_zero_revenue() {
        let orders = vec![order("1", "A", at(1, 9), None), order("2", "A", at(1, 10), None)];
        let items = vec![item("1", 1, 1000, 0)];

        let daily = compute_daily_sales(&orders, &items);

        assert_eq!(daily[0].order_count, 2);
        assert_eq!(daily[0].revenue, Money::from_cents(1000));
    }

    #[test]
    fn test_no_delivered_orders_gives_null_average() {
        let orders = vec![order("1", "A", at(1, 9), None)];
        let daily = compute_daily_sales(&orders, &[]);

        assert_eq!(daily[0].avg_delivery_days, None);
    }

    #[test]
    fn test_average_delivery_excludes_undelivered() {
        let orders = vec![
            order("1", "A", at(1, 9), Some(at(3, 9))),
            order("2", "A", at(1, 9), Some(at(4, 12))),
            order("3", "A", at(1, 9), None),
        ];
        let daily = compute_daily_sales(&orders, &[]);

        // (2 + 3) / 2
        assert_eq!(daily[0].avg_delivery_days, Some(2.5));
        assert_eq!(daily[0].order_count, 3);
    }

    #[test]
    fn test_average_delivery_rounded_to_two_digits() {
        let orders = vec![
            order("1", "A", at(1, 0), Some(at(2, 0))),
            order("2", "A", at(1, 0), Some(at(2, 0))),
            order("3", "A", at(1, 0), Some(at(3, 0))),
        ];
        let daily = compute_daily_sales(&orders, &[]);

        assert_eq!(daily[0].avg_delivery_days, Some(1.33));
    }

    #[test]
    fn test_daily_sorted_ascending() {
        let orders = vec![
            order("3", "A", at(9, 0), None),
            order("1", "A", at(2, 0), None),
            order("2", "A", at(5, 0), None),
        ];
        let dates: Vec<u32> = compute_daily_sales(&orders, &[])
            .iter()
            .map(|d| chrono::Datelike::day(&d.date))
            .collect();

        assert_eq!(dates, vec![2, 5, 9]);
    }

    #[test]
    fn test_revenue_sums_exactly_items_of_that_date() {
        let orders = vec![
            order("1", "A", at(1, 0), None),
            order("2", "B", at(2, 0), None),
            order("3", "C", at(2, 23), None),
        ];
        let items = vec![
            item("1", 1, 1001, 99),
            item("2", 1, 250, 0),
            item("3", 1, 333, 1),
            item("3", 2, 1, 1),
        ];

        let daily = compute_daily_sales(&orders, &items);
        let total: Money = daily.iter().map(|d| d.revenue).sum();
        let expected: Money = items.iter().map(OrderItem::total).sum();

        assert_eq!(daily[0].revenue, Money::from_cents(1100));
        assert_eq!(daily[1].revenue, Money::from_cents(586));
        assert_eq!(total, expected);
    }

    #[test]
    fn test_chunked_aggregation_matches_whole() {
        let orders = vec![
            order("1", "A", at(1, 0), Some(at(2, 0))),
            order("2", "B", at(1, 5), None),
            order("3", "C", at(2, 0), Some(at(6, 0))),
            order("4", "A", at(1, 7), Some(at(4, 0))),
            order("5", "B", at(2, 1), None),
        ];
        let items = vec![item("1", 1, 100, 10), item("3", 1, 200, 20), item("4", 1, 300, 30), item("5", 1, 1, 1)];

        let whole = compute_daily_sales(&orders, &items);
        let (left, right) = orders.split_at(2);
        let chunked = finish_daily([accumulate_daily(right, &items), accumulate_daily(left, &items)]);

        assert_eq!(whole, chunked);
    }

    #[test]
    fn test_customer_average_order_value() {
        let orders = vec![order("1", "A", at(1, 0), None), order("2", "A", at(2, 0), None)];
        let items = vec![item("1", 1, 2500, 500), item("2", 1, 7000, 0)];
        let customers = vec![customer("A", "SP")];

        let stats = compute_customer_stats(&orders, &items, &customers);

        assert_eq!(stats.rows.len(), 1);
        let stat = &stats.rows[0];
        assert_eq!(stat.order_count, 2);
        assert_eq!(stat.total_spend, Money::from_cents(10000));
        assert_eq!(stat.avg_order_value, Money::from_cents(5000));
        assert_eq!(stat.state.as_str(), "SP");
        assert_eq!(stats.orphaned_customers, 0);
    }

    #[test]
    fn test_customer_ordering_by_spend_then_id() {
        let orders = vec![
            order("1", "C", at(1, 0), None),
            order("2", "B", at(1, 0), None),
            order("3", "A", at(1, 0), None),
            order("4", "D", at(1, 0), None),
        ];
        let items = vec![item("1", 1, 500, 0), item("2", 1, 900, 0), item("3", 1, 500, 0)];
        let customers = vec![customer("A", "SP"), customer("B", "RJ"), customer("C", "MG"), customer("D", "BA")];

        let stats = compute_customer_stats(&orders, &items, &customers);
        let ids: Vec<&str> = stats.rows.iter().map(|s| s.customer_id.as_str()).collect();

        assert_eq!(ids, vec!["B", "A", "C", "D"]);
        assert_eq!(stats.rows[3].total_spend, Money::ZERO);
    }

    #[test]
    fn test_orphaned_customers_excluded_and_counted() {
        let orders = vec![
            order("1", "A", at(1, 0), None),
            order("2", "ghost", at(1, 0), None),
            order("3", "ghost", at(1, 0), None),
            order("4", "phantom", at(1, 0), None),
        ];
        let customers = vec![customer("A", "SP")];

        let stats = compute_customer_stats(&orders, &[], &customers);

        assert_eq!(stats.rows.len(), 1);
        assert_eq!(stats.orphaned_customers, 2);
    }

    #[test]
    fn test_run_records_orphan_anomaly() {
        let silver = SilverTables {
            orders: vec![order("1", "A", at(1, 0), None), order("2", "ghost", at(1, 0), None)],
            order_items: vec![item("1", 1, 100, 0)],
            customers: vec![customer("A", "SP")],
        };

        let (gold, result) = run(&silver);

        assert_eq!(gold.daily_sales.len(), 1);
        assert_eq!(gold.customer_stats.len(), 1);
        assert_eq!(result.stage, Layer::Gold);
        assert_eq!(result.table(CUSTOMER_STATS).unwrap().rejected(RejectReason::OrphanedCustomer), 1);
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].kind, AnomalyKind::OrphanedCustomers);
    }

    #[test]
    fn test_run_on_empty_silver() {
        let silver = SilverTables {
            orders: vec![],
            order_items: vec![],
            customers: vec![],
        };
        let (gold, result) = run(&silver);

        assert!(gold.daily_sales.is_empty());
        assert!(gold.customer_stats.is_empty());
        assert!(result.anomalies.is_empty());
    }
}
