//! Assembles the full spend tracking response
//!
//! Rows are fetched once per call and shared by every calculator: the
//! same subscription list feeds this month, last month, next month, the
//! forecast and the rollup.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Months};
use log::debug;

use super::response::{percentage_change, MonthlySummary, SpendTrackingResponse};
use crate::calc::{ForecastEngine, ItemKind, MonthlySpendAggregator, ThreeYearRollup};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{Result, SpendError};
use crate::records::first_of_month;
use crate::store::DataStore;

/// Runs every calculator for one user
pub struct SpendTrackingResponseBuilder {
    store: Arc<dyn DataStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    forecast: ForecastEngine,
}

impl SpendTrackingResponseBuilder {
    pub fn new(store: Arc<dyn DataStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            forecast: ForecastEngine::new(Arc::clone(&store)),
            store,
            clock,
            config,
        }
    }

    /// Compute the response for `user_id` as of the clock's current date.
    ///
    /// Any store failure aborts the whole response; no partial payload is
    /// returned.
    pub fn build(&self, user_id: &str) -> Result<SpendTrackingResponse> {
        self.config.validate_user_id(user_id)?;

        let start = Instant::now();
        let generated_at = self.clock.now();
        let today = self.clock.today();

        let current_month = first_of_month(today);
        let last_month = current_month
            .checked_sub_months(Months::new(1))
            .unwrap_or(current_month);
        let next_month = current_month
            .checked_add_months(Months::new(1))
            .unwrap_or(current_month);

        let subscriptions = self
            .store
            .select_active_subscriptions(user_id)
            .map_err(|e| SpendError::data_store("loading subscriptions", e))?;
        let current_purchases = self
            .store
            .select_one_time_purchases_in_month(user_id, current_month)
            .map_err(|e| SpendError::data_store("loading one-time purchases", e))?;
        let last_purchases = self
            .store
            .select_one_time_purchases_in_month(user_id, last_month)
            .map_err(|e| SpendError::data_store("loading last month's purchases", e))?;
        let monthly_aggregates = self
            .store
            .select_monthly_aggregates(user_id)
            .map_err(|e| SpendError::data_store("loading monthly aggregates", e))?;
        let yearly_aggregates = self
            .store
            .select_yearly_aggregates(user_id)
            .map_err(|e| SpendError::data_store("loading yearly aggregates", e))?;

        debug!(
            "{}: {} subscriptions, {} purchases this month, {} last month",
            user_id,
            subscriptions.len(),
            current_purchases.len(),
            last_purchases.len()
        );

        let current = MonthlySpendAggregator::aggregate(&current_purchases, &subscriptions, current_month);
        let previous = MonthlySpendAggregator::aggregate(&last_purchases, &subscriptions, last_month);
        // Future purchases are not known yet; only recurring charges
        let upcoming = MonthlySpendAggregator::aggregate(&[], &subscriptions, next_month);

        let year = today.year();
        let annual_forecast =
            self.forecast
                .forecast_with(user_id, year, today, &subscriptions, &monthly_aggregates);
        let yearly_totals = ThreeYearRollup::yearly_totals_with(
            &yearly_aggregates,
            &monthly_aggregates,
            &subscriptions,
            year,
            year,
        );

        let monthly_summary = MonthlySummary {
            month: current.month,
            month_label: current.month.format("%B %Y").to_string(),
            current_month_total: current.total_amount,
            last_month_total: previous.total_amount,
            percentage_change: percentage_change(previous.total_amount, current.total_amount),
            one_time_total: current.one_time_total,
            subscription_total: current.subscription_total,
            category_breakdown: current.categories.clone(),
        };

        let response = SpendTrackingResponse {
            user_id: user_id.to_string(),
            generated_at,
            one_time_this_month: current.items_of_kind(ItemKind::OneTime),
            recurring_next_month: upcoming.items_of_kind(ItemKind::Subscription),
            current_month_items: current.items,
            monthly_summary,
            annual_forecast,
            yearly_totals,
        };

        debug!("built spend summary for {} in {:?}", user_id, start.elapsed());
        Ok(response)
    }
}
