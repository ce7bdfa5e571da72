//! Response shapes handed to the presentation layer

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calc::{AnnualForecast, SpendItem, YearlyTotals};

/// Current month compared to the previous one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    /// First day of the current month
    pub month: NaiveDate,
    /// e.g. "October 2026"
    pub month_label: String,
    pub current_month_total: f64,
    pub last_month_total: f64,
    /// Percent change from last month (see [`percentage_change`])
    pub percentage_change: f64,
    pub one_time_total: f64,
    pub subscription_total: f64,
    pub category_breakdown: BTreeMap<String, f64>,
}

/// Everything the spend tracking page needs, in one payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendTrackingResponse {
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub monthly_summary: MonthlySummary,
    pub annual_forecast: AnnualForecast,
    /// Three consecutive years, oldest first
    pub yearly_totals: Vec<YearlyTotals>,
    /// Every line making up the current month total
    pub current_month_items: Vec<SpendItem>,
    pub one_time_this_month: Vec<SpendItem>,
    pub recurring_next_month: Vec<SpendItem>,
}

/// Billing outlook for a single subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionOutlook {
    pub subscription_id: i64,
    pub name: String,
    pub billing_cycle: String,
    pub cost_per_cycle: f64,
    pub due_this_month: bool,
    pub next_billing_date: Option<NaiveDate>,
    pub cost_this_year: f64,
    pub annualized_cost: f64,
}

/// Percent change from `previous` to `current`.
///
/// With no previous spend the change is 100 when anything was spent now,
/// otherwise 0.
pub fn percentage_change(previous: f64, current: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        (current - previous) / previous * 100.0
    }
}
