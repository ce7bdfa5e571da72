//! Spend records as returned by the data store

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpendError};

/// Category key under which due subscriptions are accumulated
pub const SUBSCRIPTION_CATEGORY: &str = "subscription";

/// Category key for purchases without a media type
pub const OTHER_CATEGORY: &str = "other";

/// Supported billing intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingCycle {
    OneMonth,
    ThreeMonths,
    SixMonths,
    TwelveMonths,
}

impl BillingCycle {
    pub const ALL: [BillingCycle; 4] = [
        BillingCycle::OneMonth,
        BillingCycle::ThreeMonths,
        BillingCycle::SixMonths,
        BillingCycle::TwelveMonths,
    ];

    /// Parse a stored billing-cycle label such as `"3 month"`
    pub fn from_label(label: &str) -> Result<Self> {
        match label.trim() {
            "1 month" => Ok(BillingCycle::OneMonth),
            "3 month" => Ok(BillingCycle::ThreeMonths),
            "6 month" => Ok(BillingCycle::SixMonths),
            "12 month" => Ok(BillingCycle::TwelveMonths),
            _ => Err(SpendError::InvalidBillingCycle(label.to_string())),
        }
    }

    /// Storage label
    pub fn label(&self) -> &'static str {
        match self {
            BillingCycle::OneMonth => "1 month",
            BillingCycle::ThreeMonths => "3 month",
            BillingCycle::SixMonths => "6 month",
            BillingCycle::TwelveMonths => "12 month",
        }
    }

    /// Months between charges
    pub fn months(&self) -> u32 {
        match self {
            BillingCycle::OneMonth => 1,
            BillingCycle::ThreeMonths => 3,
            BillingCycle::SixMonths => 6,
            BillingCycle::TwelveMonths => 12,
        }
    }

    /// Charges per calendar year
    pub fn charges_per_year(&self) -> u32 {
        12 / self.months()
    }
}

/// Known category labels. Storage may carry other media-type strings,
/// which are still accepted as category keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Game,
    Movie,
    Book,
    Music,
    Subscription,
    Other,
}

impl MediaType {
    pub const ALL: [MediaType; 6] = [
        MediaType::Game,
        MediaType::Movie,
        MediaType::Book,
        MediaType::Music,
        MediaType::Subscription,
        MediaType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Game => "game",
            MediaType::Movie => "movie",
            MediaType::Book => "book",
            MediaType::Music => "music",
            MediaType::Subscription => SUBSCRIPTION_CATEGORY,
            MediaType::Other => OTHER_CATEGORY,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        MediaType::ALL.into_iter().find(|m| m.as_str() == label)
    }

    /// Whether a category key belongs to the known set
    pub fn is_known(label: &str) -> bool {
        Self::from_label(label).is_some()
    }
}

/// A single purchase, created elsewhere and read-only here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneTimePurchase {
    pub id: i64,
    pub user_id: String,
    pub title: String,

    /// Non-negative amount paid
    pub amount: f64,

    /// Timezone-naive purchase date
    pub purchase_date: NaiveDate,

    pub payment_method: String,
    pub category_id: Option<i64>,

    /// Digital location the purchase belongs to, if any
    pub digital_location_id: Option<i64>,

    pub is_digital: bool,
    pub is_wishlisted: bool,

    /// Media-type tag, used as the category key
    pub media_type: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OneTimePurchase {
    /// Category key for aggregation
    pub fn category(&self) -> &str {
        let media = self.media_type.trim();
        if media.is_empty() {
            OTHER_CATEGORY
        } else {
            media
        }
    }
}

/// A recurring charge, stored as a digital location flagged as a subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub user_id: String,

    /// Display name of the digital location
    pub name: String,

    pub is_active: bool,
    pub is_subscription: bool,

    /// Raw billing-cycle label (`"1 month"`, `"3 month"`, ...).
    /// Kept as a string so unrecognized labels surface per item.
    pub billing_cycle: String,

    /// Non-negative cost charged every cycle
    pub cost_per_cycle: f64,

    /// First billing date. Never moves; all due-date math is relative to it.
    pub anchor_date: NaiveDate,

    pub last_payment_date: Option<NaiveDate>,
    pub next_payment_date: Option<NaiveDate>,
    pub payment_method: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Resolve the stored label
    pub fn cycle(&self) -> Result<BillingCycle> {
        BillingCycle::from_label(&self.billing_cycle)
    }

    /// Anchor day of month, clamped to the length of `month`
    pub fn billing_day_in(&self, month: NaiveDate) -> NaiveDate {
        let first = first_of_month(month);
        let last_day = days_in_month(first.year(), first.month());
        let day = self.anchor_date.day().min(last_day);
        first.with_day(day).unwrap_or(first)
    }
}

/// Persisted monthly snapshot (written by an external batch job)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub total_amount: f64,
    pub subscription_amount: f64,
    pub one_time_amount: f64,

    /// Category label -> amount
    #[serde(default)]
    pub category_amounts: std::collections::BTreeMap<String, f64>,
}

/// Persisted yearly snapshot (written by an external batch job)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAggregate {
    pub user_id: String,
    pub year: i32,
    pub total_amount: f64,
    pub subscription_amount: f64,
    pub one_time_amount: f64,

    #[serde(default)]
    pub category_amounts: std::collections::BTreeMap<String, f64>,
}

/// First day of the month containing `date`
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Number of days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(start), Some(end)) => (end - start).num_days() as u32,
        _ => 31,
    }
}

/// Three-letter month abbreviation (1-based month)
pub fn month_abbrev(month: u32) -> &'static str {
    const NAMES: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}
