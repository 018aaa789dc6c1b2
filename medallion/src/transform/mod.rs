//! Transformation module.
//!
//! This module turns raw tables into layered outputs:
//! - Coerce: string to typed value conversions
//! - Bronze: raw snapshot
//! - Silver: cleaning, deduplication and referential checks
//! - Gold: daily sales and customer statistics
//! - Pipeline: stage orchestration and the run context

pub mod bronze;
pub mod coerce;
pub mod dedup;
pub mod gold;
pub mod pipeline;
pub mod silver;

pub use dedup::dedup_first_by;
pub use gold::{compute_customer_stats, compute_daily_sales, CustomerStats, GoldTables};
pub use pipeline::*;
pub use silver::{clean_customers, clean_order_items, clean_orders, Cleaned, SilverTables};
