//! Spend Tracking - calculation engine for recurring and one-time media spend
//!
//! This library provides:
//! - Billing-cycle resolution and due-date checks anchored on a subscription's first charge
//! - Monthly aggregation of purchases and due subscriptions by category
//! - Annual forecasts blending recorded history with projected months
//! - A three-year subscription rollup
//! - A staleness-aware cache in front of the assembled summary

pub mod error;
pub mod config;
pub mod clock;
pub mod records;
pub mod store;
pub mod calc;
pub mod summary;
pub mod cache;
pub mod service;

// Re-export commonly used types
pub use error::{Result, SpendError};
pub use config::EngineConfig;
pub use clock::{Clock, ManualClock, SystemClock};
pub use records::{BillingCycle, MediaType, MonthlyAggregate, OneTimePurchase, Subscription, YearlyAggregate};
pub use store::{CacheStore, DataStore, InMemoryCacheStore, InMemoryDataStore};
pub use calc::{AnnualForecast, ForecastEngine, MonthlySpendAggregator, ThreeYearRollup};
pub use summary::{SpendTrackingResponse, SpendTrackingResponseBuilder};
pub use cache::{CacheStats, StalenessAwareCache};
pub use service::SpendTrackingService;
