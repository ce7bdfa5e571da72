//! Three-year historical rollup
//!
//! Past years come from persisted yearly aggregates. Only the current year
//! is computed on the fly when the batch job has not written it yet.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};

use super::yearly::yearly_cost;
use crate::error::{Result, SpendError};
use crate::records::{MonthlyAggregate, Subscription, YearlyAggregate};
use crate::store::DataStore;

/// Number of years covered, ending at the target year
pub const ROLLUP_YEARS: i32 = 3;

/// Spend totals for one year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyTotals {
    pub year: i32,
    pub subscription_amount: f64,
    pub one_time_amount: f64,
    /// `subscription_amount + one_time_amount`
    pub total_amount: f64,
}

/// Builds the three-year rollup
pub struct ThreeYearRollup {
    store: Arc<dyn DataStore>,
}

impl ThreeYearRollup {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Subscription spend per year for `target_year - 2 ..= target_year`
    pub fn three_year_subscription_costs(
        &self,
        user_id: &str,
        target_year: i32,
        current_year: i32,
    ) -> Result<BTreeMap<i32, f64>> {
        let yearly = self
            .store
            .select_yearly_aggregates(user_id)
            .map_err(|e| SpendError::data_store("loading yearly aggregates", e))?;
        let subscriptions = self
            .store
            .select_active_subscriptions(user_id)
            .map_err(|e| SpendError::data_store("loading subscriptions", e))?;

        Ok(Self::subscription_costs_with(&yearly, &subscriptions, target_year, current_year))
    }

    /// Years covered by a rollup ending at `target_year`
    pub fn years(target_year: i32) -> impl Iterator<Item = i32> {
        (target_year - (ROLLUP_YEARS - 1))..=target_year
    }

    /// Subscription spend per year from already-fetched rows.
    ///
    /// A year with no persisted value and no computable spend stays at 0.
    pub fn subscription_costs_with(
        yearly: &[YearlyAggregate],
        subscriptions: &[Subscription],
        target_year: i32,
        current_year: i32,
    ) -> BTreeMap<i32, f64> {
        Self::years(target_year)
            .map(|year| {
                let mut amount = Self::persisted(yearly, year, |a| a.subscription_amount);
                if amount == 0.0 && year == current_year {
                    amount = Self::dynamic_subscription_cost(subscriptions, year);
                }
                (year, amount)
            })
            .collect()
    }

    /// Full per-year totals (subscription, one-time, combined).
    ///
    /// The current year's one-time spend falls back to the sum of that
    /// year's monthly aggregates when no yearly row exists.
    pub fn yearly_totals_with(
        yearly: &[YearlyAggregate],
        monthly: &[MonthlyAggregate],
        subscriptions: &[Subscription],
        target_year: i32,
        current_year: i32,
    ) -> Vec<YearlyTotals> {
        let subscription_costs =
            Self::subscription_costs_with(yearly, subscriptions, target_year, current_year);

        subscription_costs
            .into_iter()
            .map(|(year, subscription_amount)| {
                let mut one_time_amount = Self::persisted(yearly, year, |a| a.one_time_amount);
                if one_time_amount == 0.0 && year == current_year {
                    one_time_amount = monthly
                        .iter()
                        .filter(|a| a.year == year && a.one_time_amount > 0.0)
                        .map(|a| a.one_time_amount)
                        .fold(0.0, |acc, v| acc + v);
                }
                YearlyTotals {
                    year,
                    subscription_amount,
                    one_time_amount,
                    total_amount: subscription_amount + one_time_amount,
                }
            })
            .collect()
    }

    /// Sum of [`yearly_cost`] over the subscriptions, skipping failures
    pub fn dynamic_subscription_cost(subscriptions: &[Subscription], year: i32) -> f64 {
        subscriptions
            .iter()
            .filter(|s| s.is_active && s.is_subscription)
            .filter_map(|sub| match yearly_cost(sub, year) {
                Ok(cost) => Some(cost),
                Err(e) => {
                    warn!("subscription {} ({}) skipped for {}: {}", sub.id, sub.name, year, e);
                    None
                }
            })
            .fold(0.0, |acc, v| acc + v)
    }

    /// First positive persisted value for `year`, else 0
    fn persisted(yearly: &[YearlyAggregate], year: i32, field: impl Fn(&YearlyAggregate) -> f64) -> f64 {
        yearly
            .iter()
            .filter(|a| a.year == year)
            .map(field)
            .find(|&v| v > 0.0)
            .unwrap_or(0.0)
    }
}
