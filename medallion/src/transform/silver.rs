//! Silver stage: validate, deduplicate and normalize the raw tables.
//!
//! Malformed rows are dropped and counted, never raised. The only error this
//! stage returns is a [`SchemaError`] when a raw table lacks a column the
//! cleaning rules need; all three schemas are checked before any row is
//! touched, so a failing stage produces nothing.

use std::collections::HashSet;
use std::time::Instant;

use super::coerce::{normalize_key, normalize_state, normalize_upper, parse_money, parse_sequence, parse_timestamp};
use super::dedup::dedup_first_by;
use crate::error::SchemaResult;
use crate::models::{Customer, Layer, Order, OrderItem, OrderStatus, RejectReason};
use crate::parser::{RawTable, RawTables};
use crate::report::{RejectionTally, StageResult, TableReport};

/// Rows that survived cleaning, with their accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Cleaned<T> {
    pub rows: Vec<T>,
    pub report: TableReport,
}

impl<T> Cleaned<T> {
    fn new(table: &RawTable, rows: Vec<T>, tally: RejectionTally) -> Self {
        let report = TableReport::new(table.name.clone(), table.len(), rows.len(), tally);
        Self { rows, report }
    }

    pub fn rejected_count(&self) -> usize {
        self.report.rejected_rows
    }
}

/// The three cleaned tables.
#[derive(Debug, Clone, PartialEq)]
pub struct SilverTables {
    pub orders: Vec<Order>,
    pub order_items: Vec<OrderItem>,
    pub customers: Vec<Customer>,
}

// =============================================================================
// Column resolution
// =============================================================================

struct OrderColumns {
    order_id: usize,
    customer_id: usize,
    status: usize,
    purchased_at: usize,
    delivered_at: usize,
    estimated_delivery_at: usize,
    approved_at: Option<usize>,
    delivered_carrier_at: Option<usize>,
}

impl OrderColumns {
    fn resolve(table: &RawTable) -> SchemaResult<Self> {
        let stage = Layer::Silver;
        table.check_unique_headers(stage)?;
        Ok(Self {
            order_id: table.column(stage, "order_id")?,
            customer_id: table.column(stage, "customer_id")?,
            status: table.column(stage, "order_status")?,
            purchased_at: table.column(stage, "order_purchase_timestamp")?,
            delivered_at: table.column(stage, "order_delivered_customer_date")?,
            estimated_delivery_at: table.column(stage, "order_estimated_delivery_date")?,
            approved_at: table.optional_column("order_approved_at"),
            delivered_carrier_at: table.optional_column("order_delivered_carrier_date"),
        })
    }
}

struct ItemColumns {
    order_id: usize,
    item_seq: usize,
    product_id: usize,
    price: usize,
    freight_value: usize,
}

impl ItemColumns {
    fn resolve(table: &RawTable) -> SchemaResult<Self> {
        let stage = Layer::Silver;
        table.check_unique_headers(stage)?;
        Ok(Self {
            order_id: table.column(stage, "order_id")?,
            item_seq: table.column(stage, "order_item_id")?,
            product_id: table.column(stage, "product_id")?,
            price: table.column(stage, "price")?,
            freight_value: table.column(stage, "freight_value")?,
        })
    }
}

struct CustomerColumns {
    customer_id: usize,
    unique_id: usize,
    state: usize,
    zip_code_prefix: Option<usize>,
    city: Option<usize>,
}

impl CustomerColumns {
    fn resolve(table: &RawTable) -> SchemaResult<Self> {
        let stage = Layer::Silver;
        table.check_unique_headers(stage)?;
        Ok(Self {
            customer_id: table.column(stage, "customer_id")?,
            unique_id: table.column(stage, "customer_unique_id")?,
            state: table.column(stage, "customer_state")?,
            zip_code_prefix: table.optional_column("customer_zip_code_prefix"),
            city: table.optional_column("customer_city"),
        })
    }
}

/// Fail fast if any raw table lacks a column the cleaning rules read.
pub fn check_schemas(raw: &RawTables) -> SchemaResult<()> {
    OrderColumns::resolve(&raw.orders)?;
    ItemColumns::resolve(&raw.order_items)?;
    CustomerColumns::resolve(&raw.customers)?;
    Ok(())
}

// =============================================================================
// Cleaning rules
// =============================================================================

/// Clean raw orders.
///
/// Rules, in order: drop null order or customer ids; parse timestamps
/// (unparseable values become null); drop rows whose purchase timestamp
/// is null; keep the first row per order id; drop rows delivered before
/// they were purchased.
pub fn clean_orders(raw: &RawTable, timestamp_format: &str) -> SchemaResult<Cleaned<Order>> {
    let cols = OrderColumns::resolve(raw)?;
    let mut tally = RejectionTally::default();
    let mut candidates = Vec::with_capacity(raw.len());

    for row in 0..raw.len() {
        let cell = |col: usize| raw.cell(row, Some(col));
        let timestamp = |col: Option<usize>| parse_timestamp(raw.cell(row, col), timestamp_format);

        let Some(order_id) = normalize_key(cell(cols.order_id)) else {
            tally.reject(RejectReason::NullOrderId);
            continue;
        };
        let Some(customer_id) = normalize_key(cell(cols.customer_id)) else {
            tally.reject(RejectReason::NullCustomerId);
            continue;
        };
        let Some(purchased_at) = timestamp(Some(cols.purchased_at)) else {
            tally.reject(RejectReason::UnparseablePurchaseTimestamp);
            continue;
        };

        candidates.push(Order {
            order_id,
            customer_id,
            status: OrderStatus::parse(cell(cols.status)),
            purchased_at,
            approved_at: timestamp(cols.approved_at),
            delivered_carrier_at: timestamp(cols.delivered_carrier_at),
            delivered_at: timestamp(Some(cols.delivered_at)),
            estimated_delivery_at: timestamp(Some(cols.estimated_delivery_at)),
        });
    }

    let (deduped, duplicates) = dedup_first_by(candidates, |o| o.order_id.clone());
    tally.add(RejectReason::DuplicateKey, duplicates);

    let orders: Vec<Order> = deduped
        .into_iter()
        .filter(|o| match o.delivered_at {
            Some(delivered) if delivered < o.purchased_at => {
                tally.reject(RejectReason::DeliveredBeforePurchase);
                false
            }
            _ => true,
        })
        .collect();

    Ok(Cleaned::new(raw, orders, tally))
}

/// Clean raw order items against the already-cleaned orders.
///
/// Rules, in order: drop null order ids and unparseable sequence numbers;
/// drop negative or non-numeric prices and freight values; keep the first
/// row per `(order_id, order_item_id)`; drop rows whose order is not in
/// `orders`.
pub fn clean_order_items(raw: &RawTable, orders: &[Order]) -> SchemaResult<Cleaned<OrderItem>> {
    let cols = ItemColumns::resolve(raw)?;
    let mut tally = RejectionTally::default();
    let mut candidates = Vec::with_capacity(raw.len());

    for row in 0..raw.len() {
        let cell = |col: usize| raw.cell(row, Some(col));

        let Some(order_id) = normalize_key(cell(cols.order_id)) else {
            tally.reject(RejectReason::NullOrderId);
            continue;
        };
        let Some(item_seq) = parse_sequence(cell(cols.item_seq)) else {
            tally.reject(RejectReason::InvalidItemSequence);
            continue;
        };
        let Some(price) = parse_money(cell(cols.price)) else {
            tally.reject(RejectReason::InvalidPrice);
            continue;
        };
        let Some(freight_value) = parse_money(cell(cols.freight_value)) else {
            tally.reject(RejectReason::InvalidFreightValue);
            continue;
        };

        candidates.push(OrderItem {
            order_id,
            item_seq,
            product_id: normalize_key(cell(cols.product_id)),
            price,
            freight_value,
        });
    }

    let (deduped, duplicates) = dedup_first_by(candidates, |i| (i.order_id.clone(), i.item_seq));
    tally.add(RejectReason::DuplicateKey, duplicates);

    let known: HashSet<&str> = orders.iter().map(|o| o.order_id.as_str()).collect();
    let items: Vec<OrderItem> = deduped
        .into_iter()
        .filter(|i| {
            let keep = known.contains(i.order_id.as_str());
            if !keep {
                tally.reject(RejectReason::OrphanedOrderReference);
            }
            keep
        })
        .collect();

    Ok(Cleaned::new(raw, items, tally))
}

/// Clean raw customers.
///
/// Rules, in order: drop null customer ids; canonicalize state codes
/// (trim, uppercase) and drop rows whose code is null or not two letters;
/// uppercase the city when present; keep the first row per customer id.
pub fn clean_customers(raw: &RawTable) -> SchemaResult<Cleaned<Customer>> {
    let cols = CustomerColumns::resolve(raw)?;
    let mut tally = RejectionTally::default();
    let mut candidates = Vec::with_capacity(raw.len());

    for row in 0..raw.len() {
        let Some(customer_id) = normalize_key(raw.cell(row, Some(cols.customer_id))) else {
            tally.reject(RejectReason::NullCustomerId);
            continue;
        };
        let Some(state) = normalize_state(raw.cell(row, Some(cols.state))) else {
            tally.reject(RejectReason::InvalidStateCode);
            continue;
        };

        candidates.push(Customer {
            customer_id,
            customer_unique_id: normalize_key(raw.cell(row, Some(cols.unique_id))),
            zip_code_prefix: normalize_key(raw.cell(row, cols.zip_code_prefix)),
            city: normalize_upper(raw.cell(row, cols.city)),
            state,
        });
    }

    let (customers, duplicates) = dedup_first_by(candidates, |c| c.customer_id.clone());
    tally.add(RejectReason::DuplicateKey, duplicates);

    Ok(Cleaned::new(raw, customers, tally))
}

/// Run the whole Silver stage.
pub fn run(raw: &RawTables, timestamp_format: &str) -> SchemaResult<(SilverTables, StageResult)> {
    let started = Instant::now();
    check_schemas(raw)?;

    let orders = clean_orders(&raw.orders, timestamp_format)?;
    let items = clean_order_items(&raw.order_items, &orders.rows)?;
    let customers = clean_customers(&raw.customers)?;

    let result = StageResult::new(
        Layer::Silver,
        vec![orders.report, items.report, customers.report],
        started.elapsed(),
    );

    let tables = SilverTables {
        orders: orders.rows,
        order_items: items.rows,
        customers: customers.rows,
    };

    Ok((tables, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::models::Money;
    use crate::parser::{CUSTOMERS, ORDERS, ORDER_ITEMS};
    use crate::transform::coerce::DEFAULT_TIMESTAMP_FORMAT;
    use chrono::NaiveDate;

    const ORDER_HEADERS: &[&str] = &[
        "order_id",
        "customer_id",
        "order_status",
        "order_purchase_timestamp",
        "order_delivered_customer_date",
        "order_estimated_delivery_date",
    ];
    const ITEM_HEADERS: &[&str] = &["order_id", "order_item_id", "product_id", "price", "freight_value"];
    const CUSTOMER_HEADERS: &[&str] = &["customer_id", "customer_unique_id", "customer_state"];

    fn orders_table(rows: &[&[&str]]) -> RawTable {
        RawTable::from_literals(ORDERS, ORDER_HEADERS, rows)
    }

    fn items_table(rows: &[&[&str]]) -> RawTable {
        RawTable::from_literals(ORDER_ITEMS, ITEM_HEADERS, rows)
    }

    fn customers_table(rows: &[&[&str]]) -> RawTable {
        RawTable::from_literals(CUSTOMERS, CUSTOMER_HEADERS, rows)
    }

    fn clean(rows: &[&[&str]]) -> Cleaned<Order> {
        clean_orders(&orders_table(rows), DEFAULT_TIMESTAMP_FORMAT).unwrap()
    }

    fn day(d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_duplicate_order_keeps_first_occurrence() {
        let cleaned = clean(&[
            &["1", "A", "delivered", "2024-01-01", "2024-01-03", "2024-01-10"],
            &["1", "A", "delivered", "2024-01-01", "", "2024-01-10"],
        ]);

        assert_eq!(cleaned.rows.len(), 1);
        assert_eq!(cleaned.rows[0].delivered_at, Some(day(3)));
        assert_eq!(cleaned.rejected_count(), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::DuplicateKey), 1);
    }

    #[test]
    fn test_orders_null_keys_and_bad_purchase_dropped() {
        let cleaned = clean(&[
            &["", "A", "delivered", "2024-01-01", "", ""],
            &["2", "", "delivered", "2024-01-01", "", ""],
            &["3", "C", "delivered", "yesterday", "", ""],
            &["4", "D", "shipped", "2024-01-02 08:30:00", "garbage", "also garbage"],
        ]);

        assert_eq!(cleaned.rows.len(), 1);
        let order = &cleaned.rows[0];
        assert_eq!(order.order_id, "4");
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.delivered_at, None);
        assert_eq!(order.estimated_delivery_at, None);

        assert_eq!(cleaned.report.rejected(RejectReason::NullOrderId), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::NullCustomerId), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::UnparseablePurchaseTimestamp), 1);
        assert_eq!(cleaned.rejected_count(), 3);
    }

    #[test]
    fn test_bad_first_occurrence_does_not_shadow_valid_duplicate() {
        let cleaned = clean(&[
            &["1", "A", "delivered", "not-a-date", "", ""],
            &["1", "A", "delivered", "2024-01-01", "", ""],
        ]);

        assert_eq!(cleaned.rows.len(), 1);
        assert_eq!(cleaned.rows[0].purchased_at, day(1));
        assert_eq!(cleaned.report.rejected(RejectReason::UnparseablePurchaseTimestamp), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::DuplicateKey), 0);
    }

    #[test]
    fn test_delivered_before_purchase_dropped() {
        let cleaned = clean(&[
            &["1", "A", "delivered", "2024-01-05", "2024-01-03", ""],
            &["2", "A", "delivered", "2024-01-05", "2024-01-05", ""],
        ]);

        assert_eq!(cleaned.rows.len(), 1);
        assert_eq!(cleaned.rows[0].order_id, "2");
        assert_eq!(cleaned.report.rejected(RejectReason::DeliveredBeforePurchase), 1);
    }

    #[test]
    fn test_cleaned_orders_uphold_invariants() {
        let cleaned = clean(&[
            &["1", "A", "delivered", "2024-01-01", "2024-01-03", ""],
            &["2", "B", "delivered", "2024-01-04", "2024-01-02", ""],
            &["1", "A", "shipped", "2024-01-02", "", ""],
            &["3", "A", "invoiced", "2024-01-02", "", ""],
            &["3", "C", "delivered", "2024-01-01", "2024-01-09", ""],
        ]);

        let ids: HashSet<&str> = cleaned.rows.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids.len(), cleaned.rows.len());
        assert!(cleaned
            .rows
            .iter()
            .all(|o| o.delivered_at.map_or(true, |d| d >= o.purchased_at)));
        assert_eq!(cleaned.report.input_rows - cleaned.report.output_rows, cleaned.rejected_count());
    }

    #[test]
    fn test_optional_timestamp_columns_parsed_when_present() {
        let raw = RawTable::from_literals(
            ORDERS,
            &[
                "order_id",
                "customer_id",
                "order_status",
                "order_purchase_timestamp",
                "order_approved_at",
                "order_delivered_carrier_date",
                "order_delivered_customer_date",
                "order_estimated_delivery_date",
            ],
            &[&["1", "A", "delivered", "2024-01-01", "2024-01-02", "bad", "2024-01-05", "2024-01-10"]],
        );
        let cleaned = clean_orders(&raw, DEFAULT_TIMESTAMP_FORMAT).unwrap();

        assert_eq!(cleaned.rows[0].approved_at, Some(day(2)));
        assert_eq!(cleaned.rows[0].delivered_carrier_at, None);
        assert_eq!(cleaned.rows[0].estimated_delivery_at, Some(day(10)));
    }

    #[test]
    fn test_missing_order_column_is_schema_error() {
        let raw = RawTable::from_literals(ORDERS, &["order_id", "customer_id"], &[&["1", "A"]]);
        let err = clean_orders(&raw, DEFAULT_TIMESTAMP_FORMAT).unwrap_err();

        match err {
            SchemaError::MissingColumn { stage, table, column } => {
                assert_eq!(stage, Layer::Silver);
                assert_eq!(table, "orders");
                assert_eq!(column, "order_status");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn two_orders() -> Vec<Order> {
        clean(&[
            &["o1", "A", "delivered", "2024-01-01", "", ""],
            &["o2", "B", "delivered", "2024-01-01", "", ""],
        ])
        .rows
    }

    #[test]
    fn test_negative_price_dropped() {
        let cleaned = clean_order_items(
            &items_table(&[&["o1", "1", "p1", "-5", "1.00"], &["o1", "2", "p2", "10.00", "1.50"]]),
            &two_orders(),
        )
        .unwrap();

        assert_eq!(cleaned.rows.len(), 1);
        assert_eq!(cleaned.rows[0].item_seq, 2);
        assert_eq!(cleaned.rows[0].total(), Money::from_cents(1150));
        assert_eq!(cleaned.report.rejected(RejectReason::InvalidPrice), 1);
        assert_eq!(cleaned.rejected_count(), 1);
    }

    #[test]
    fn test_items_bad_values_rejected_by_reason() {
        let cleaned = clean_order_items(
            &items_table(&[
                &["o1", "1", "p1", "abc", "1.00"],
                &["o1", "2", "p1", "1.00", "-0.5"],
                &["o1", "x", "p1", "1.00", "1.00"],
                &["", "3", "p1", "1.00", "1.00"],
                &["o2", "1", "", "0", "0"],
            ]),
            &two_orders(),
        )
        .unwrap();

        assert_eq!(cleaned.rows.len(), 1);
        assert_eq!(cleaned.rows[0].product_id, None);
        assert_eq!(cleaned.rows[0].total(), Money::ZERO);
        assert_eq!(cleaned.report.rejected(RejectReason::InvalidPrice), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::InvalidFreightValue), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::InvalidItemSequence), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::NullOrderId), 1);
    }

    #[test]
    fn test_amounts_past_decimal_range_rejected() {
        let cleaned = clean_order_items(
            &items_table(&[
                &["o1", "1", "p1", "92233720368547758.07", "1.00"],
                &["o1", "2", "p1", "1.00", "92233720368547758.07"],
                &["o2", "1", "p2", "9999999999999999.99", "9999999999999999.99"],
            ]),
            &two_orders(),
        )
        .unwrap();

        assert_eq!(cleaned.report.rejected(RejectReason::InvalidPrice), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::InvalidFreightValue), 1);
        assert_eq!(cleaned.rows.len(), 1);

        // Largest accepted amounts still sum without overflowing.
        let daily = crate::transform::gold::compute_daily_sales(&two_orders(), &cleaned.rows);
        let revenue: Money = daily.iter().map(|d| d.revenue).sum();
        assert_eq!(revenue.cents(), 2 * Money::MAX.cents());
    }

    #[test]
    fn test_items_dedup_by_order_and_sequence() {
        let cleaned = clean_order_items(
            &items_table(&[
                &["o1", "1", "p1", "10.00", "1.00"],
                &["o1", "1", "p9", "99.00", "9.00"],
                &["o2", "1", "p1", "20.00", "2.00"],
            ]),
            &two_orders(),
        )
        .unwrap();

        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.rows[0].product_id.as_deref(), Some("p1"));
        assert_eq!(cleaned.report.rejected(RejectReason::DuplicateKey), 1);
    }

    #[test]
    fn test_items_referential_closure() {
        let orders = two_orders();
        let cleaned = clean_order_items(
            &items_table(&[
                &["o1", "1", "p1", "10.00", "1.00"],
                &["ghost", "1", "p1", "10.00", "1.00"],
                &["o2", "1", "p1", "10.00", "1.00"],
            ]),
            &orders,
        )
        .unwrap();

        let known: HashSet<&str> = orders.iter().map(|o| o.order_id.as_str()).collect();
        assert!(cleaned.rows.iter().all(|i| known.contains(i.order_id.as_str())));
        assert_eq!(cleaned.report.rejected(RejectReason::OrphanedOrderReference), 1);
    }

    #[test]
    fn test_customers_state_canonicalized_and_invalid_dropped() {
        let cleaned = clean_customers(&customers_table(&[
            &["c1", "u1", " sp "],
            &["c2", "u1", "rj"],
            &["c3", "u3", ""],
            &["c4", "u4", "SPX"],
            &["", "u5", "MG"],
            &["c1", "u9", "MG"],
        ]))
        .unwrap();

        let states: Vec<&str> = cleaned.rows.iter().map(|c| c.state.as_str()).collect();
        assert_eq!(states, vec!["SP", "RJ"]);
        assert_eq!(cleaned.rows[1].customer_unique_id.as_deref(), Some("u1"));
        assert_eq!(cleaned.report.rejected(RejectReason::InvalidStateCode), 2);
        assert_eq!(cleaned.report.rejected(RejectReason::NullCustomerId), 1);
        assert_eq!(cleaned.report.rejected(RejectReason::DuplicateKey), 1);
        assert_eq!(cleaned.rejected_count(), 4);
    }

    #[test]
    fn test_customers_city_uppercased_when_present() {
        let raw = RawTable::from_literals(
            CUSTOMERS,
            &["customer_id", "customer_unique_id", "customer_zip_code_prefix", "customer_city", "customer_state"],
            &[&["c1", "u1", "01310", " sao paulo ", "sp"]],
        );
        let cleaned = clean_customers(&raw).unwrap();

        assert_eq!(cleaned.rows[0].city.as_deref(), Some("SAO PAULO"));
        assert_eq!(cleaned.rows[0].zip_code_prefix.as_deref(), Some("01310"));
    }

    fn raw_tables() -> RawTables {
        RawTables {
            orders: orders_table(&[
                &["o1", "c1", "delivered", "2024-01-01 10:00:00", "2024-01-04 09:00:00", ""],
                &["o1", "c1", "delivered", "2024-01-01 10:00:00", "", ""],
                &["o2", "c2", "shipped", "2024-01-02 12:00:00", "", ""],
            ]),
            order_items: items_table(&[
                &["o1", "1", "p1", "10.00", "2.00"],
                &["o2", "1", "p2", "-1", "2.00"],
                &["o3", "1", "p3", "5.00", "1.00"],
            ]),
            customers: customers_table(&[&["c1", "u1", "sp"], &["c2", "u2", "rj"]]),
        }
    }

    #[test]
    fn test_run_is_idempotent() {
        let raw = raw_tables();
        let (first, _) = run(&raw, DEFAULT_TIMESTAMP_FORMAT).unwrap();
        let (second, _) = run(&raw, DEFAULT_TIMESTAMP_FORMAT).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_run_is_byte_identical_on_disk() {
        use crate::storage::{columnar, Dataset, ParquetSink, TableSink};

        let raw = raw_tables();
        let write = |dir: &std::path::Path| {
            let (tables, _) = run(&raw, DEFAULT_TIMESTAMP_FORMAT).unwrap();
            let mut sink = ParquetSink::new(dir);
            let batches = [
                (ORDERS, columnar::orders_batch(&tables.orders).unwrap()),
                (ORDER_ITEMS, columnar::order_items_batch(&tables.order_items).unwrap()),
                (CUSTOMERS, columnar::customers_batch(&tables.customers).unwrap()),
            ];
            for (name, batch) in &batches {
                sink.write(&Dataset::new(Layer::Silver, *name), batch).unwrap();
            }
        };

        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        write(first.path());
        write(second.path());

        for name in [ORDERS, ORDER_ITEMS, CUSTOMERS] {
            let file = format!("silver/{}.parquet", name);
            let a = std::fs::read(first.path().join(&file)).unwrap();
            let b = std::fs::read(second.path().join(&file)).unwrap();
            assert!(!a.is_empty());
            assert_eq!(a, b, "{} differs between runs", file);
        }
    }

    #[test]
    fn test_run_reports_every_table() {
        let (tables, result) = run(&raw_tables(), DEFAULT_TIMESTAMP_FORMAT).unwrap();

        assert_eq!(result.stage, Layer::Silver);
        assert_eq!(tables.orders.len(), 2);
        assert_eq!(tables.order_items.len(), 1);
        assert_eq!(tables.customers.len(), 2);

        let items = result.table(ORDER_ITEMS).unwrap();
        assert_eq!(items.input_rows, 3);
        assert_eq!(items.rejected_rows, 2);
        assert!(result.anomalies.is_empty());
    }

    #[test]
    fn test_run_flags_emptied_table() {
        let mut raw = raw_tables();
        raw.customers = customers_table(&[&["c1", "u1", "??"]]);
        let (_, result) = run(&raw, DEFAULT_TIMESTAMP_FORMAT).unwrap();

        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].table, CUSTOMERS);
    }

    #[test]
    fn test_run_checks_all_schemas_first() {
        let mut raw = raw_tables();
        raw.customers = RawTable::from_literals(CUSTOMERS, &["customer_id", "customer_unique_id"], &[]);

        let err = run(&raw, DEFAULT_TIMESTAMP_FORMAT).unwrap_err();
        assert!(err.to_string().contains("customer_state"));
    }
}
