//! Domain models for the medallion pipeline.
//!
//! This module contains the typed rows that flow between layers:
//!
//! - [`Order`], [`OrderItem`], [`Customer`] - validated Silver rows
//! - [`DailySalesMetric`], [`CustomerStat`] - Gold aggregates
//! - [`Money`] - exact cent amounts
//! - [`StateCode`], [`OrderStatus`] - canonical enumerated values
//! - [`Layer`] - Bronze / Silver / Gold
//! - [`RejectReason`] - why a raw row was dropped

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

// =============================================================================
// Layers
// =============================================================================

/// A pipeline layer. Doubles as the stage name in reports and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Bronze,
    Silver,
    Gold,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Bronze => "bronze",
            Layer::Silver => "silver",
            Layer::Gold => "gold",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Money
// =============================================================================

/// A monetary amount held as an exact number of cents.
///
/// Sums never drift, so re-runs over the same input are bit-identical.
/// Single amounts are capped at [`Money::MAX`] when parsed; sums are held
/// in 128 bits so no realistic row count can overflow them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Money(i128);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest amount a `Decimal(18, 2)` column holds: 9999999999999999.99.
    pub const MAX: Money = Money(999_999_999_999_999_999);

    pub fn from_cents(cents: i64) -> Self {
        Money(i128::from(cents))
    }

    pub fn cents(&self) -> i128 {
        self.0
    }

    /// Divide a non-negative amount by `count`, rounding half-up to the cent.
    ///
    /// Returns `None` when `count` is zero.
    pub fn div_round(&self, count: u64) -> Option<Money> {
        if count == 0 {
            return None;
        }
        let count = i128::from(count);
        Some(Money((self.0 * 2 + count) / (2 * count)))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Enumerated values
// =============================================================================

/// Two-letter state code, trimmed and uppercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StateCode(String);

impl StateCode {
    /// Wrap an already-canonical code. Use [`crate::transform::coerce::normalize_state`]
    /// for raw input.
    pub(crate) fn new_unchecked(code: String) -> Self {
        StateCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order lifecycle status as exported by the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Created,
    Approved,
    Invoiced,
    Processing,
    Shipped,
    Delivered,
    Canceled,
    Unavailable,
    /// A status outside the known set, kept verbatim (lowercased).
    Other(String),
    /// No status recorded.
    Unknown,
}

impl OrderStatus {
    /// Map a raw status cell. Matching is case-insensitive and ignores
    /// surrounding whitespace.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return OrderStatus::Unknown;
        };
        match raw.trim().to_lowercase().as_str() {
            "" => OrderStatus::Unknown,
            "created" => OrderStatus::Created,
            "approved" => OrderStatus::Approved,
            "invoiced" => OrderStatus::Invoiced,
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "canceled" | "cancelled" => OrderStatus::Canceled,
            "unavailable" => OrderStatus::Unavailable,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Approved => "approved",
            OrderStatus::Invoiced => "invoiced",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Unavailable => "unavailable",
            OrderStatus::Other(s) => s,
            OrderStatus::Unknown => "unknown",
        }
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// =============================================================================
// Row rejection
// =============================================================================

/// Why a row was left out of a layer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NullOrderId,
    NullCustomerId,
    UnparseablePurchaseTimestamp,
    DuplicateKey,
    DeliveredBeforePurchase,
    InvalidPrice,
    InvalidFreightValue,
    InvalidItemSequence,
    OrphanedOrderReference,
    InvalidStateCode,
    OrphanedCustomer,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NullOrderId => "null_order_id",
            RejectReason::NullCustomerId => "null_customer_id",
            RejectReason::UnparseablePurchaseTimestamp => "unparseable_purchase_timestamp",
            RejectReason::DuplicateKey => "duplicate_key",
            RejectReason::DeliveredBeforePurchase => "delivered_before_purchase",
            RejectReason::InvalidPrice => "invalid_price",
            RejectReason::InvalidFreightValue => "invalid_freight_value",
            RejectReason::InvalidItemSequence => "invalid_item_sequence",
            RejectReason::OrphanedOrderReference => "orphaned_order_reference",
            RejectReason::InvalidStateCode => "invalid_state_code",
            RejectReason::OrphanedCustomer => "orphaned_customer",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Silver rows
// =============================================================================

/// A validated order.
///
/// Invariants: `order_id` is unique within a Silver table, and
/// `delivered_at`, when present, is not before `purchased_at`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub purchased_at: NaiveDateTime,
    pub approved_at: Option<NaiveDateTime>,
    pub delivered_carrier_at: Option<NaiveDateTime>,
    pub delivered_at: Option<NaiveDateTime>,
    pub estimated_delivery_at: Option<NaiveDateTime>,
}

impl Order {
    /// Calendar date of purchase.
    pub fn purchase_date(&self) -> NaiveDate {
        self.purchased_at.date()
    }

    /// Whole days between purchase and delivery, `None` if undelivered.
    pub fn days_to_deliver(&self) -> Option<i64> {
        self.delivered_at
            .map(|delivered| (delivered - self.purchased_at).num_days())
    }
}

/// A validated order line item, keyed by `(order_id, item_seq)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItem {
    pub order_id: String,
    pub item_seq: u32,
    pub product_id: Option<String>,
    pub price: Money,
    pub freight_value: Money,
}

impl OrderItem {
    /// Price plus freight.
    pub fn total(&self) -> Money {
        self.price + self.freight_value
    }
}

/// A validated customer account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Customer {
    pub customer_id: String,
    /// Identifies the person behind one or more `customer_id`s.
    pub customer_unique_id: Option<String>,
    pub zip_code_prefix: Option<String>,
    pub city: Option<String>,
    pub state: StateCode,
}

// =============================================================================
// Gold rows
// =============================================================================

/// Sales aggregated per calendar purchase date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySalesMetric {
    pub date: NaiveDate,
    pub order_count: u64,
    pub revenue: Money,
    /// `None` when no order of that date has been delivered.
    pub avg_delivery_days: Option<f64>,
}

/// Spend statistics per customer account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerStat {
    pub customer_id: String,
    pub order_count: u64,
    pub total_spend: Money,
    pub avg_order_value: Money,
    pub state: StateCode,
}
