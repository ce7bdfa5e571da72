//! Collaborator interfaces consumed by the engine
//!
//! The engine never talks to a database or cache server directly. It is
//! handed a [`DataStore`] that returns typed rows and a [`CacheStore`] that
//! stores opaque bytes with a TTL. Both are read through shared references,
//! so implementations must be safe to call concurrently.

mod memory;

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::records::{MonthlyAggregate, OneTimePurchase, Subscription, YearlyAggregate};

pub use memory::{InMemoryCacheStore, InMemoryDataStore};

/// Failure reported by a data store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or the read failed
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A row could not be decoded into a typed record
    #[error("malformed row: {0}")]
    Malformed(String),
}

/// Failure reported by a cache store
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    /// Cached bytes did not decode
    #[error("cache payload could not be decoded: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Read-only source of spend rows
pub trait DataStore: Send + Sync {
    /// Active subscriptions owned by the user
    fn select_active_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError>;

    /// Purchases whose date falls within the calendar month containing `month`
    fn select_one_time_purchases_in_month(
        &self,
        user_id: &str,
        month: NaiveDate,
    ) -> Result<Vec<OneTimePurchase>, StoreError>;

    fn select_monthly_aggregates(&self, user_id: &str) -> Result<Vec<MonthlyAggregate>, StoreError>;

    fn select_yearly_aggregates(&self, user_id: &str) -> Result<Vec<YearlyAggregate>, StoreError>;

    /// A single subscription, `None` when it does not exist for this user
    fn select_subscription_by_id(
        &self,
        user_id: &str,
        subscription_id: i64,
    ) -> Result<Option<Subscription>, StoreError>;
}

/// Key/value cache with per-entry TTL
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` when the key is absent or expired
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    /// Deleting a missing key is not an error
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}
