//! Arrow schemas and row-to-batch conversion for every layer.
//!
//! Bronze keeps the raw header order with every column as nullable `Utf8`.
//! Silver and Gold use declared types: timestamps in microseconds, dates as
//! `Date32`, money as `Decimal128(18, 2)`.

use arrow::array::{
    ArrayRef, Date32Array, Decimal128Array, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
    UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::sync::Arc;

use crate::error::StorageResult;
use crate::models::{Customer, CustomerStat, DailySalesMetric, Money, Order, OrderItem};
use crate::parser::RawTable;

const MONEY_PRECISION: u8 = 18;
const MONEY_SCALE: i8 = 2;

/// Days between 0001-01-01 (CE day 1) and 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn money_type() -> DataType {
    DataType::Decimal128(MONEY_PRECISION, MONEY_SCALE)
}

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, None)
}

fn micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

fn date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

fn money_array<I: IntoIterator<Item = Money>>(values: I) -> StorageResult<ArrayRef> {
    let cents: Vec<i128> = values.into_iter().map(|m| m.cents()).collect();
    let array = Decimal128Array::from(cents).with_precision_and_scale(MONEY_PRECISION, MONEY_SCALE)?;
    // Setting the type does not check the values.
    array.validate_decimal_precision(MONEY_PRECISION)?;
    Ok(Arc::new(array))
}

fn timestamps<'a, I>(values: I) -> ArrayRef
where
    I: IntoIterator<Item = Option<&'a NaiveDateTime>>,
{
    let values: Vec<Option<i64>> = values.into_iter().map(|v| v.copied().map(micros)).collect();
    Arc::new(TimestampMicrosecondArray::from(values))
}

fn strings<'a, I: IntoIterator<Item = &'a str>>(values: I) -> ArrayRef {
    Arc::new(StringArray::from(values.into_iter().collect::<Vec<_>>()))
}

fn optional_strings<'a, I: IntoIterator<Item = Option<&'a str>>>(values: I) -> ArrayRef {
    Arc::new(StringArray::from(values.into_iter().collect::<Vec<_>>()))
}

// =============================================================================
// Bronze
// =============================================================================

/// Schema of a raw table: its headers, all nullable strings.
pub fn raw_schema(table: &RawTable) -> SchemaRef {
    Arc::new(Schema::new(
        table
            .headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ))
}

pub fn raw_batch(table: &RawTable) -> StorageResult<RecordBatch> {
    let columns: Vec<ArrayRef> = (0..table.headers.len())
        .map(|col| optional_strings((0..table.len()).map(|row| table.cell(row, Some(col)))))
        .collect();

    Ok(RecordBatch::try_new(raw_schema(table), columns)?)
}

// =============================================================================
// Silver
// =============================================================================

pub fn orders_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Utf8, false),
        Field::new("customer_id", DataType::Utf8, false),
        Field::new("order_status", DataType::Utf8, false),
        Field::new("order_purchase_timestamp", timestamp_type(), false),
        Field::new("order_approved_at", timestamp_type(), true),
        Field::new("order_delivered_carrier_date", timestamp_type(), true),
        Field::new("order_delivered_customer_date", timestamp_type(), true),
        Field::new("order_estimated_delivery_date", timestamp_type(), true),
        Field::new("days_to_deliver", DataType::Int64, true),
    ]))
}

pub fn orders_batch(orders: &[Order]) -> StorageResult<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        strings(orders.iter().map(|o| o.order_id.as_str())),
        strings(orders.iter().map(|o| o.customer_id.as_str())),
        strings(orders.iter().map(|o| o.status.as_str())),
        timestamps(orders.iter().map(|o| Some(&o.purchased_at))),
        timestamps(orders.iter().map(|o| o.approved_at.as_ref())),
        timestamps(orders.iter().map(|o| o.delivered_carrier_at.as_ref())),
        timestamps(orders.iter().map(|o| o.delivered_at.as_ref())),
        timestamps(orders.iter().map(|o| o.estimated_delivery_at.as_ref())),
        Arc::new(Int64Array::from(
            orders.iter().map(Order::days_to_deliver).collect::<Vec<_>>(),
        )),
    ];

    Ok(RecordBatch::try_new(orders_schema(), columns)?)
}

pub fn order_items_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Utf8, false),
        Field::new("order_item_id", DataType::UInt32, false),
        Field::new("product_id", DataType::Utf8, true),
        Field::new("price", money_type(), false),
        Field::new("freight_value", money_type(), false),
        Field::new("total_price", money_type(), false),
    ]))
}

pub fn order_items_batch(items: &[OrderItem]) -> StorageResult<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        strings(items.iter().map(|i| i.order_id.as_str())),
        Arc::new(UInt32Array::from(items.iter().map(|i| i.item_seq).collect::<Vec<_>>())),
        optional_strings(items.iter().map(|i| i.product_id.as_deref())),
        money_array(items.iter().map(|i| i.price))?,
        money_array(items.iter().map(|i| i.freight_value))?,
        money_array(items.iter().map(OrderItem::total))?,
    ];

    Ok(RecordBatch::try_new(order_items_schema(), columns)?)
}

pub fn customers_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("customer_id", DataType::Utf8, false),
        Field::new("customer_unique_id", DataType::Utf8, true),
        Field::new("customer_zip_code_prefix", DataType::Utf8, true),
        Field::new("customer_city", DataType::Utf8, true),
        Field::new("customer_state", DataType::Utf8, false),
    ]))
}

pub fn customers_batch(customers: &[Customer]) -> StorageResult<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        strings(customers.iter().map(|c| c.customer_id.as_str())),
        optional_strings(customers.iter().map(|c| c.customer_unique_id.as_deref())),
        optional_strings(customers.iter().map(|c| c.zip_code_prefix.as_deref())),
        optional_strings(customers.iter().map(|c| c.city.as_deref())),
        strings(customers.iter().map(|c| c.state.as_str())),
    ];

    Ok(RecordBatch::try_new(customers_schema(), columns)?)
}

// =============================================================================
// Gold
// =============================================================================

pub fn daily_sales_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("order_count", DataType::UInt64, false),
        Field::new("revenue", money_type(), false),
        Field::new("avg_delivery_days", DataType::Float64, true),
    ]))
}

pub fn daily_sales_batch(metrics: &[DailySalesMetric]) -> StorageResult<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Date32Array::from(metrics.iter().map(|m| date32(m.date)).collect::<Vec<_>>())),
        Arc::new(UInt64Array::from(metrics.iter().map(|m| m.order_count).collect::<Vec<_>>())),
        money_array(metrics.iter().map(|m| m.revenue))?,
        Arc::new(Float64Array::from(
            metrics.iter().map(|m| m.avg_delivery_days).collect::<Vec<_>>(),
        )),
    ];

    Ok(RecordBatch::try_new(daily_sales_schema(), columns)?)
}

pub fn customer_stats_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("customer_id", DataType::Utf8, false),
        Field::new("order_count", DataType::UInt64, false),
        Field::new("total_spend", money_type(), false),
        Field::new("avg_order_value", money_type(), false),
        Field::new("customer_state", DataType::Utf8, false),
    ]))
}

pub fn customer_stats_batch(stats: &[CustomerStat]) -> StorageResult<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        strings(stats.iter().map(|s| s.customer_id.as_str())),
        Arc::new(UInt64Array::from(stats.iter().map(|s| s.order_count).collect::<Vec<_>>())),
        money_array(stats.iter().map(|s| s.total_spend))?,
        money_array(stats.iter().map(|s| s.avg_order_value))?,
        strings(stats.iter().map(|s| s.state.as_str())),
    ];

    Ok(RecordBatch::try_new(customer_stats_schema(), columns)?)
}
