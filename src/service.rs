//! Public entry point of the engine
//!
//! [`SpendTrackingService`] wires the collaborators together: a data store,
//! a cache store, a clock and the engine config.

use std::path::Path;
use std::sync::Arc;

use chrono::Datelike;
use log::{info, warn};
use rayon::prelude::*;

use crate::cache::{CacheStats, StalenessAwareCache};
use crate::calc::{annualized_cost, is_due, next_billing_date, yearly_cost};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{Result, SpendError};
use crate::records::{first_of_month, load_data_dir};
use crate::store::{CacheStore, DataStore, InMemoryCacheStore, InMemoryDataStore};
use crate::summary::{SpendTrackingResponse, SpendTrackingResponseBuilder, SubscriptionOutlook};

/// Spend tracking for any number of users
pub struct SpendTrackingService {
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    cache: StalenessAwareCache,
}

impl SpendTrackingService {
    pub fn new(
        store: Arc<dyn DataStore>,
        cache_store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        let builder = SpendTrackingResponseBuilder::new(Arc::clone(&store), Arc::clone(&clock), config.clone());
        let cache = StalenessAwareCache::new(builder, cache_store, Arc::clone(&clock), config.clone());

        Ok(Self {
            store,
            clock,
            config,
            cache,
        })
    }

    /// Service over the CSV files in `dir`, with an in-process cache and the
    /// system clock
    pub fn from_data_dir<P: AsRef<Path>>(dir: P, config: EngineConfig) -> Result<Self> {
        let records = load_data_dir(dir).map_err(|e| SpendError::data_store("loading data directory", e))?;
        info!(
            "loaded {} purchases and {} subscriptions",
            records.purchases.len(),
            records.subscriptions.len()
        );

        Self::new(
            Arc::new(InMemoryDataStore::from_records(records)),
            Arc::new(InMemoryCacheStore::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    /// The full spend summary for `user_id`, served from cache when fresh
    pub fn get_spend_tracking_summary(&self, user_id: &str) -> Result<SpendTrackingResponse> {
        self.cache.get_or_compute(user_id)
    }

    /// Drop the cached summary so the next request recomputes it
    pub fn invalidate_user_cache(&self, user_id: &str) -> Result<()> {
        self.cache.invalidate_user_cache(user_id)
    }

    /// Billing outlook for one subscription as of today.
    ///
    /// Unlike the aggregated views, an unresolvable billing cycle is
    /// returned as an error here since there is nothing else to report.
    pub fn subscription_outlook(&self, user_id: &str, subscription_id: i64) -> Result<SubscriptionOutlook> {
        self.config.validate_user_id(user_id)?;

        let sub = self
            .store
            .select_subscription_by_id(user_id, subscription_id)
            .map_err(|e| SpendError::data_store("loading subscription", e))?
            .ok_or_else(|| SpendError::SubscriptionNotFound {
                user_id: user_id.to_string(),
                subscription_id,
            })?;

        let today = self.clock.today();
        Ok(SubscriptionOutlook {
            subscription_id: sub.id,
            name: sub.name.clone(),
            billing_cycle: sub.cycle()?.label().to_string(),
            cost_per_cycle: sub.cost_per_cycle,
            due_this_month: sub.is_active && is_due(&sub, first_of_month(today))?,
            next_billing_date: if sub.is_active { next_billing_date(&sub, today)? } else { None },
            cost_this_year: yearly_cost(&sub, today.year())?,
            annualized_cost: annualized_cost(&sub)?,
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Summaries for many users in parallel.
    ///
    /// Results keep the input order; one user's failure does not affect
    /// the others.
    pub fn summaries_for_users(&self, user_ids: &[String]) -> Vec<(String, Result<SpendTrackingResponse>)> {
        user_ids
            .par_iter()
            .map(|user_id| {
                let result = self.get_spend_tracking_summary(user_id);
                if let Err(e) = &result {
                    warn!("summary for {} failed: {}", user_id, e);
                }
                (user_id.clone(), result)
            })
            .collect()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
