//! In-memory collaborators
//!
//! [`InMemoryDataStore`] serves rows loaded from CSV exports (or built in
//! tests). [`InMemoryCacheStore`] is a [`DashMap`] with lazily evicted TTL
//! entries, standing in for the Redis-backed cache in development.

use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;

use super::{CacheError, CacheStore, DataStore, StoreError};
use crate::records::{
    LoadedRecords, MonthlyAggregate, OneTimePurchase, Subscription, YearlyAggregate,
};

/// Immutable row set answering the [`DataStore`] queries
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataStore {
    records: LoadedRecords,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: LoadedRecords) -> Self {
        Self { records }
    }

    pub fn with_purchases(mut self, purchases: Vec<OneTimePurchase>) -> Self {
        self.records.purchases.extend(purchases);
        self
    }

    pub fn with_subscriptions(mut self, subscriptions: Vec<Subscription>) -> Self {
        self.records.subscriptions.extend(subscriptions);
        self
    }

    pub fn with_monthly_aggregates(mut self, aggregates: Vec<MonthlyAggregate>) -> Self {
        self.records.monthly_aggregates.extend(aggregates);
        self
    }

    pub fn with_yearly_aggregates(mut self, aggregates: Vec<YearlyAggregate>) -> Self {
        self.records.yearly_aggregates.extend(aggregates);
        self
    }

    pub fn records(&self) -> &LoadedRecords {
        &self.records
    }
}

impl DataStore for InMemoryDataStore {
    fn select_active_subscriptions(&self, user_id: &str) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .records
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_active && s.is_subscription)
            .cloned()
            .collect())
    }

    fn select_one_time_purchases_in_month(
        &self,
        user_id: &str,
        month: NaiveDate,
    ) -> Result<Vec<OneTimePurchase>, StoreError> {
        Ok(self
            .records
            .purchases
            .iter()
            .filter(|p| {
                p.user_id == user_id
                    && p.purchase_date.year() == month.year()
                    && p.purchase_date.month() == month.month()
            })
            .cloned()
            .collect())
    }

    fn select_monthly_aggregates(&self, user_id: &str) -> Result<Vec<MonthlyAggregate>, StoreError> {
        Ok(self
            .records
            .monthly_aggregates
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn select_yearly_aggregates(&self, user_id: &str) -> Result<Vec<YearlyAggregate>, StoreError> {
        Ok(self
            .records
            .yearly_aggregates
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    fn select_subscription_by_id(
        &self,
        user_id: &str,
        subscription_id: i64,
    ) -> Result<Option<Subscription>, StoreError> {
        Ok(self
            .records
            .subscriptions
            .iter()
            .find(|s| s.user_id == user_id && s.id == subscription_id && s.is_subscription)
            .cloned())
    }
}

/// A cached value with its expiry instant
struct CacheEntry {
    data: Vec<u8>,
    expires_at: Instant,
}

/// In-memory cache with TTL expiry. Expired entries are evicted on access.
#[derive(Default)]
pub struct InMemoryCacheStore {
    map: DashMap<String, CacheEntry>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys, including not-yet-evicted expired ones
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        if let Some(entry) = self.map.get(key) {
            if Instant::now() < entry.expires_at {
                return Ok(Some(entry.data.clone()));
            }
            // Release the read guard before removing
            drop(entry);
            self.map.remove_if(key, |_, e| Instant::now() >= e.expires_at);
        }
        Ok(None)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.map.insert(
            key.to_string(),
            CacheEntry {
                data: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.map.remove(key);
        Ok(())
    }
}
