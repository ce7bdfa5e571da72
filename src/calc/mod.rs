//! Spend calculators
//!
//! Everything here is synchronous and free of wall-clock reads. The
//! `*_with` and associated functions work on rows that were already
//! fetched; the struct methods fetch through an injected [`DataStore`].
//!
//! [`DataStore`]: crate::store::DataStore

mod billing;
mod due;
mod forecast;
mod median;
mod monthly;
mod rollup;
mod yearly;

pub use billing::{
    billing_dates_through, months_between, next_billing_date, nth_billing_date,
    resolve_cycle_months,
};
pub use due::is_due;
pub use forecast::{AnnualForecast, BucketSource, ForecastEngine, MonthBucket};
pub use median::median;
pub use monthly::{ItemKind, MonthlySpend, MonthlySpendAggregator, SpendItem};
pub use rollup::{ThreeYearRollup, YearlyTotals, ROLLUP_YEARS};
pub use yearly::{annualized_cost, billing_events_in_year, yearly_cost, MAX_BILLING_EVENTS_PER_YEAR};
