//! Twelve-month forecast blending history with projection
//!
//! Months up to and including the current month are read from persisted
//! monthly aggregates, with no synthetic backfill when a month is missing.
//! Later months are projected: that month's recorded purchases plus the
//! subscriptions due in it. A month whose projection fails falls back to
//! the average of the year's positive historical months.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::median::median;
use super::monthly::MonthlySpendAggregator;
use crate::error::{Result, SpendError};
use crate::records::{month_abbrev, MonthlyAggregate, Subscription};
use crate::store::DataStore;

/// How a bucket's amount was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketSource {
    /// Persisted monthly aggregate (or zero when none was recorded)
    Historical,
    /// Computed from purchases and due subscriptions
    Projected,
    /// Projection failed; historical average used instead
    Fallback,
}

/// One month of the forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthBucket {
    /// 1-based month
    pub month: u32,
    /// Month abbreviation ("Jan")
    pub label: String,
    pub amount: f64,
    pub source: BucketSource,
}

/// Forecast for a whole calendar year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualForecast {
    pub year: i32,
    /// e.g. "January 2024 - January 2025"
    pub date_range: String,
    /// Exactly twelve buckets, January first
    pub months: Vec<MonthBucket>,
    pub total: f64,
    pub median: f64,
}

impl AnnualForecast {
    pub fn amounts(&self) -> Vec<f64> {
        self.months.iter().map(|b| b.amount).collect()
    }
}

/// Builds annual forecasts from history and projection
pub struct ForecastEngine {
    store: Arc<dyn DataStore>,
}

impl ForecastEngine {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Fetch subscriptions and monthly aggregates, then forecast `year`
    pub fn annual_forecast(&self, user_id: &str, year: i32, today: NaiveDate) -> Result<AnnualForecast> {
        let subscriptions = self
            .store
            .select_active_subscriptions(user_id)
            .map_err(|e| SpendError::data_store("loading subscriptions", e))?;
        let aggregates = self
            .store
            .select_monthly_aggregates(user_id)
            .map_err(|e| SpendError::data_store("loading monthly aggregates", e))?;

        Ok(self.forecast_with(user_id, year, today, &subscriptions, &aggregates))
    }

    /// Forecast from already-fetched subscriptions and aggregates.
    ///
    /// The store is only consulted for purchases in future months.
    pub fn forecast_with(
        &self,
        user_id: &str,
        year: i32,
        today: NaiveDate,
        subscriptions: &[Subscription],
        aggregates: &[MonthlyAggregate],
    ) -> AnnualForecast {
        let current = (today.year(), today.month());
        let mut fallback: Option<f64> = None;

        let months: Vec<MonthBucket> = (1..=12u32)
            .map(|month| {
                let (amount, source) = if (year, month) <= current {
                    (Self::historical_amount(aggregates, year, month), BucketSource::Historical)
                } else {
                    match self.project_month(user_id, year, month, subscriptions) {
                        Ok(amount) => (amount, BucketSource::Projected),
                        Err(e) => {
                            let average = *fallback
                                .get_or_insert_with(|| Self::historical_average(aggregates, year));
                            warn!(
                                "projection for {}-{:02} failed ({}), using historical average {:.2}",
                                year, month, e, average
                            );
                            (average, BucketSource::Fallback)
                        }
                    }
                };
                MonthBucket {
                    month,
                    label: month_abbrev(month).to_string(),
                    amount,
                    source,
                }
            })
            .collect();

        let amounts: Vec<f64> = months.iter().map(|b| b.amount).collect();
        debug!("forecast {} for {}: {:?}", year, user_id, amounts);

        AnnualForecast {
            year,
            date_range: Self::date_range_label(year),
            total: amounts.iter().fold(0.0, |acc, v| acc + v),
            median: median(&amounts),
            months,
        }
    }

    /// Persisted total for `(year, month)` when positive, else 0
    pub fn historical_amount(aggregates: &[MonthlyAggregate], year: i32, month: u32) -> f64 {
        aggregates
            .iter()
            .filter(|a| a.year == year && a.month == month)
            .map(|a| a.total_amount)
            .find(|&amount| amount > 0.0)
            .unwrap_or(0.0)
    }

    /// Mean of the positive monthly totals recorded for `year`.
    ///
    /// Yields 0 when the year has no positive history, so a failed
    /// projection in a user's first year forecasts nothing for that month.
    pub fn historical_average(aggregates: &[MonthlyAggregate], year: i32) -> f64 {
        let positive: Vec<f64> = aggregates
            .iter()
            .filter(|a| a.year == year && a.total_amount > 0.0)
            .map(|a| a.total_amount)
            .collect();

        if positive.is_empty() {
            0.0
        } else {
            positive.iter().sum::<f64>() / positive.len() as f64
        }
    }

    /// `"January {year} - January {year + 1}"`
    pub fn date_range_label(year: i32) -> String {
        match (NaiveDate::from_ymd_opt(year, 1, 1), NaiveDate::from_ymd_opt(year + 1, 1, 1)) {
            (Some(start), Some(end)) => {
                format!("{} - {}", start.format("%B %Y"), end.format("%B %Y"))
            }
            _ => format!("January {} - January {}", year, year + 1),
        }
    }

    /// Minimum expected spend for a future month
    fn project_month(
        &self,
        user_id: &str,
        year: i32,
        month: u32,
        subscriptions: &[Subscription],
    ) -> Result<f64> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(SpendError::MonthOutOfRange { year, month })?;
        let purchases = self
            .store
            .select_one_time_purchases_in_month(user_id, start)
            .map_err(|e| SpendError::data_store("loading one-time purchases", e))?;

        Ok(MonthlySpendAggregator::aggregate(&purchases, subscriptions, start).total_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{OneTimePurchase, YearlyAggregate};
    use crate::store::{InMemoryDataStore, StoreError};
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn aggregate(year: i32, month: u32, total: f64) -> MonthlyAggregate {
        MonthlyAggregate {
            user_id: "u1".into(),
            year,
            month,
            total_amount: total,
            subscription_amount: 0.0,
            one_time_amount: total,
            category_amounts: BTreeMap::new(),
        }
    }

    fn subscription(cycle: &str, anchor: NaiveDate, cost: f64) -> Subscription {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Subscription {
            id: 1,
            user_id: "u1".into(),
            name: "Game Pass".into(),
            is_active: true,
            is_subscription: true,
            billing_cycle: cycle.into(),
            cost_per_cycle: cost,
            anchor_date: anchor,
            last_payment_date: None,
            next_payment_date: None,
            payment_method: "card".into(),
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Store whose purchase lookups always fail
    struct BrokenPurchases;

    impl DataStore for BrokenPurchases {
        fn select_active_subscriptions(&self, _: &str) -> std::result::Result<Vec<Subscription>, StoreError> {
            Ok(Vec::new())
        }
        fn select_one_time_purchases_in_month(
            &self,
            _: &str,
            _: NaiveDate,
        ) -> std::result::Result<Vec<OneTimePurchase>, StoreError> {
            Err(StoreError::Unavailable("timeout".into()))
        }
        fn select_monthly_aggregates(&self, _: &str) -> std::result::Result<Vec<MonthlyAggregate>, StoreError> {
            Ok(Vec::new())
        }
        fn select_yearly_aggregates(&self, _: &str) -> std::result::Result<Vec<YearlyAggregate>, StoreError> {
            Ok(Vec::new())
        }
        fn select_subscription_by_id(
            &self,
            _: &str,
            _: i64,
        ) -> std::result::Result<Option<Subscription>, StoreError> {
            Ok(None)
        }
    }

    #[test]
    fn test_blends_history_and_projection() {
        let engine = ForecastEngine::new(Arc::new(InMemoryDataStore::new()));
        let aggregates = vec![
            aggregate(2024, 1, 100.0),
            aggregate(2024, 2, 0.0),
            aggregate(2024, 4, 40.0),
            aggregate(2024, 8, 999.0), // future month: ignored
            aggregate(2023, 5, 500.0), // other year: ignored
        ];
        let subs = vec![subscription("3 month", date(2024, 1, 15), 15.0)];

        let forecast = engine.forecast_with("u1", 2024, date(2024, 5, 20), &subs, &aggregates);

        assert_eq!(forecast.months.len(), 12);
        assert_eq!(forecast.months[0].label, "Jan");
        assert_eq!(forecast.months[11].label, "Dec");

        let amounts = forecast.amounts();
        // Past months: history only, no backfill
        assert_eq!(&amounts[..5], &[100.0, 0.0, 0.0, 40.0, 0.0]);
        assert!(forecast.months[..5].iter().all(|b| b.source == BucketSource::Historical));
        // Future months: subscription projection (Jul, Oct)
        assert_eq!(&amounts[5..], &[0.0, 15.0, 0.0, 0.0, 15.0, 0.0, 0.0]);
        assert!(forecast.months[5..].iter().all(|b| b.source == BucketSource::Projected));

        assert_relative_eq!(forecast.total, 170.0);
        assert_eq!(forecast.median, 0.0);
        assert_eq!(forecast.date_range, "January 2024 - January 2025");
    }

    #[test]
    fn test_future_purchases_included() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let preorder = OneTimePurchase {
            id: 9,
            user_id: "u1".into(),
            title: "Preorder".into(),
            amount: 69.99,
            purchase_date: date(2024, 11, 8),
            payment_method: "card".into(),
            category_id: None,
            digital_location_id: None,
            is_digital: true,
            is_wishlisted: false,
            media_type: "game".into(),
            created_at: ts,
            updated_at: ts,
        };
        let store = InMemoryDataStore::new().with_purchases(vec![preorder]);
        let engine = ForecastEngine::new(Arc::new(store));

        let forecast = engine.forecast_with("u1", 2024, date(2024, 6, 1), &[], &[]);
        assert_relative_eq!(forecast.months[10].amount, 69.99);
    }

    #[test]
    fn test_failed_projection_falls_back_to_average() {
        let engine = ForecastEngine::new(Arc::new(BrokenPurchases));
        let aggregates = vec![
            aggregate(2024, 1, 30.0),
            aggregate(2024, 2, 0.0),
            aggregate(2024, 3, 90.0),
        ];

        let forecast = engine.forecast_with("u1", 2024, date(2024, 3, 10), &[], &aggregates);

        for bucket in &forecast.months[3..] {
            assert_eq!(bucket.source, BucketSource::Fallback);
            assert_relative_eq!(bucket.amount, 60.0);
        }
    }

    #[test]
    fn test_fallback_without_history_is_zero() {
        let engine = ForecastEngine::new(Arc::new(BrokenPurchases));
        let forecast = engine.forecast_with("u1", 2024, date(2024, 3, 10), &[], &[]);
        assert!(forecast.amounts().iter().all(|&a| a == 0.0));
        assert_eq!(forecast.months[11].source, BucketSource::Fallback);
    }

    #[test]
    fn test_historical_average_ignores_non_positive_and_other_years() {
        let aggregates = vec![
            aggregate(2024, 1, 10.0),
            aggregate(2024, 2, 0.0),
            aggregate(2024, 3, 20.0),
            aggregate(2023, 3, 1000.0),
        ];
        assert_relative_eq!(ForecastEngine::historical_average(&aggregates, 2024), 15.0);
        assert_eq!(ForecastEngine::historical_average(&aggregates, 2022), 0.0);
    }

    #[test]
    fn test_past_year_is_all_history() {
        let engine = ForecastEngine::new(Arc::new(BrokenPurchases));
        let aggregates: Vec<_> = (1..=12).map(|m| aggregate(2023, m, m as f64 * 10.0)).collect();

        let forecast = engine.forecast_with("u1", 2023, date(2024, 2, 1), &[], &aggregates);
        assert!(forecast.months.iter().all(|b| b.source == BucketSource::Historical));
        assert_relative_eq!(forecast.median, 65.0);
        assert_relative_eq!(forecast.total, 780.0);
    }

    #[test]
    fn test_unrepresentable_month_is_range_error() {
        let engine = ForecastEngine::new(Arc::new(InMemoryDataStore::new()));
        let err = engine.project_month("u1", 300_000, 1, &[]).unwrap_err();
        assert!(matches!(err, SpendError::MonthOutOfRange { year: 300_000, month: 1 }));

        // The forecast itself degrades to the fallback average
        let forecast = engine.forecast_with("u1", 300_000, date(2024, 5, 1), &[], &[]);
        assert!(forecast.months.iter().all(|b| b.source == BucketSource::Fallback));
    }

    #[test]
    fn test_empty_forecast_total_is_positive_zero() {
        let engine = ForecastEngine::new(Arc::new(InMemoryDataStore::new()));
        let forecast = engine.forecast_with("u1", 2023, date(2024, 5, 1), &[], &[]);
        assert_eq!(forecast.total, 0.0);
        assert!(forecast.total.is_sign_positive());
    }

    #[test]
    fn test_december_needs_no_projection() {
        let engine = ForecastEngine::new(Arc::new(BrokenPurchases));
        // Every month is history by December, so purchase lookups never run
        let forecast = engine.annual_forecast("u1", 2024, date(2024, 12, 31)).unwrap();
        assert!(forecast.months.iter().all(|b| b.source == BucketSource::Historical));
    }
}
