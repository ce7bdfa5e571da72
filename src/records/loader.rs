//! Load spend records from CSV exports
//!
//! A data directory holds up to four files:
//! `purchases.csv`, `subscriptions.csv`, `monthly_aggregates.csv` and
//! `yearly_aggregates.csv`. A missing file loads as an empty table.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use csv::Reader;

use super::{MonthlyAggregate, OneTimePurchase, Subscription, YearlyAggregate};
use crate::store::StoreError;

pub const PURCHASES_FILE: &str = "purchases.csv";
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.csv";
pub const MONTHLY_AGGREGATES_FILE: &str = "monthly_aggregates.csv";
pub const YEARLY_AGGREGATES_FILE: &str = "yearly_aggregates.csv";

/// Raw purchase row
#[derive(Debug, serde::Deserialize)]
struct PurchaseRow {
    id: i64,
    user_id: String,
    title: String,
    amount: f64,
    purchase_date: NaiveDate,
    #[serde(default)]
    payment_method: String,
    category_id: Option<i64>,
    digital_location_id: Option<i64>,
    #[serde(default)]
    is_digital: bool,
    #[serde(default)]
    is_wishlisted: bool,
    #[serde(default)]
    media_type: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl PurchaseRow {
    fn into_purchase(self) -> OneTimePurchase {
        let created_at = self.created_at.unwrap_or_else(|| midnight(self.purchase_date));
        OneTimePurchase {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            amount: self.amount,
            purchase_date: self.purchase_date,
            payment_method: self.payment_method,
            category_id: self.category_id,
            digital_location_id: self.digital_location_id,
            is_digital: self.is_digital,
            is_wishlisted: self.is_wishlisted,
            media_type: self.media_type,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

/// Raw subscription (digital location) row
#[derive(Debug, serde::Deserialize)]
struct SubscriptionRow {
    id: i64,
    user_id: String,
    name: String,
    is_active: bool,
    #[serde(default = "default_true")]
    is_subscription: bool,
    billing_cycle: String,
    cost_per_cycle: f64,
    anchor_date: NaiveDate,
    last_payment_date: Option<NaiveDate>,
    next_payment_date: Option<NaiveDate>,
    #[serde(default)]
    payment_method: String,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl SubscriptionRow {
    fn into_subscription(self) -> Subscription {
        let created_at = self.created_at.unwrap_or_else(|| midnight(self.anchor_date));
        Subscription {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            is_active: self.is_active,
            is_subscription: self.is_subscription,
            // Left unvalidated: bad labels are an item-level failure downstream
            billing_cycle: self.billing_cycle,
            cost_per_cycle: self.cost_per_cycle,
            anchor_date: self.anchor_date,
            last_payment_date: self.last_payment_date,
            next_payment_date: self.next_payment_date,
            payment_method: self.payment_method,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}

/// Raw monthly aggregate row; `category_amounts` is a JSON object
#[derive(Debug, serde::Deserialize)]
struct MonthlyAggregateRow {
    user_id: String,
    year: i32,
    month: u32,
    total_amount: f64,
    subscription_amount: f64,
    one_time_amount: f64,
    #[serde(default)]
    category_amounts: String,
}

impl MonthlyAggregateRow {
    fn into_aggregate(self) -> Result<MonthlyAggregate, StoreError> {
        if !(1..=12).contains(&self.month) {
            return Err(StoreError::Malformed(format!(
                "monthly aggregate for {} has month {}",
                self.user_id, self.month
            )));
        }
        Ok(MonthlyAggregate {
            category_amounts: parse_category_amounts(&self.category_amounts)?,
            user_id: self.user_id,
            year: self.year,
            month: self.month,
            total_amount: self.total_amount,
            subscription_amount: self.subscription_amount,
            one_time_amount: self.one_time_amount,
        })
    }
}

/// Raw yearly aggregate row
#[derive(Debug, serde::Deserialize)]
struct YearlyAggregateRow {
    user_id: String,
    year: i32,
    total_amount: f64,
    subscription_amount: f64,
    one_time_amount: f64,
    #[serde(default)]
    category_amounts: String,
}

impl YearlyAggregateRow {
    fn into_aggregate(self) -> Result<YearlyAggregate, StoreError> {
        Ok(YearlyAggregate {
            category_amounts: parse_category_amounts(&self.category_amounts)?,
            user_id: self.user_id,
            year: self.year,
            total_amount: self.total_amount,
            subscription_amount: self.subscription_amount,
            one_time_amount: self.one_time_amount,
        })
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap_or_default(), Utc)
}

fn parse_category_amounts(raw: &str) -> Result<BTreeMap<String, f64>, StoreError> {
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| StoreError::Malformed(format!("category_amounts {:?}: {}", raw, e)))
}

fn csv_error(file: &str, e: csv::Error) -> StoreError {
    StoreError::Malformed(format!("{}: {}", file, e))
}

/// Load purchases from any reader
pub fn load_purchases_from_reader<R: Read>(reader: R) -> Result<Vec<OneTimePurchase>, StoreError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut purchases = Vec::new();

    for result in csv_reader.deserialize() {
        let row: PurchaseRow = result.map_err(|e| csv_error(PURCHASES_FILE, e))?;
        purchases.push(row.into_purchase());
    }

    Ok(purchases)
}

/// Load subscriptions from any reader
pub fn load_subscriptions_from_reader<R: Read>(reader: R) -> Result<Vec<Subscription>, StoreError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut subscriptions = Vec::new();

    for result in csv_reader.deserialize() {
        let row: SubscriptionRow = result.map_err(|e| csv_error(SUBSCRIPTIONS_FILE, e))?;
        subscriptions.push(row.into_subscription());
    }

    Ok(subscriptions)
}

/// Load monthly aggregates from any reader
pub fn load_monthly_aggregates_from_reader<R: Read>(
    reader: R,
) -> Result<Vec<MonthlyAggregate>, StoreError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut aggregates = Vec::new();

    for result in csv_reader.deserialize() {
        let row: MonthlyAggregateRow = result.map_err(|e| csv_error(MONTHLY_AGGREGATES_FILE, e))?;
        aggregates.push(row.into_aggregate()?);
    }

    Ok(aggregates)
}

/// Load yearly aggregates from any reader
pub fn load_yearly_aggregates_from_reader<R: Read>(
    reader: R,
) -> Result<Vec<YearlyAggregate>, StoreError> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut aggregates = Vec::new();

    for result in csv_reader.deserialize() {
        let row: YearlyAggregateRow = result.map_err(|e| csv_error(YEARLY_AGGREGATES_FILE, e))?;
        aggregates.push(row.into_aggregate()?);
    }

    Ok(aggregates)
}

/// Every table found in a data directory
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub purchases: Vec<OneTimePurchase>,
    pub subscriptions: Vec<Subscription>,
    pub monthly_aggregates: Vec<MonthlyAggregate>,
    pub yearly_aggregates: Vec<YearlyAggregate>,
}

impl LoadedRecords {
    /// Distinct user ids across all tables, sorted
    pub fn user_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .purchases
            .iter()
            .map(|p| p.user_id.clone())
            .chain(self.subscriptions.iter().map(|s| s.user_id.clone()))
            .chain(self.monthly_aggregates.iter().map(|a| a.user_id.clone()))
            .chain(self.yearly_aggregates.iter().map(|a| a.user_id.clone()))
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Open `dir/file`, or `None` when the table was never exported
fn open_optional(dir: &Path, file: &str) -> Result<Option<std::fs::File>, StoreError> {
    let path = dir.join(file);
    if !path.exists() {
        log::debug!("{} not present, treating as empty", path.display());
        return Ok(None);
    }
    std::fs::File::open(&path)
        .map(Some)
        .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))
}

/// Load all tables from a data directory
pub fn load_data_dir<P: AsRef<Path>>(dir: P) -> Result<LoadedRecords, StoreError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(StoreError::Unavailable(format!(
            "data directory {} does not exist",
            dir.display()
        )));
    }

    let mut records = LoadedRecords::default();
    if let Some(file) = open_optional(dir, PURCHASES_FILE)? {
        records.purchases = load_purchases_from_reader(file)?;
    }
    if let Some(file) = open_optional(dir, SUBSCRIPTIONS_FILE)? {
        records.subscriptions = load_subscriptions_from_reader(file)?;
    }
    if let Some(file) = open_optional(dir, MONTHLY_AGGREGATES_FILE)? {
        records.monthly_aggregates = load_monthly_aggregates_from_reader(file)?;
    }
    if let Some(file) = open_optional(dir, YEARLY_AGGREGATES_FILE)? {
        records.yearly_aggregates = load_yearly_aggregates_from_reader(file)?;
    }

    log::info!(
        "loaded {} purchases, {} subscriptions, {} monthly and {} yearly aggregates from {}",
        records.purchases.len(),
        records.subscriptions.len(),
        records.monthly_aggregates.len(),
        records.yearly_aggregates.len(),
        dir.display()
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_purchases() {
        let data = "\
id,user_id,title,amount,purchase_date,payment_method,category_id,digital_location_id,is_digital,is_wishlisted,media_type,created_at,updated_at
1,u1,Elden Ring,59.99,2024-03-02,card,4,,true,false,game,2024-03-02T10:00:00Z,2024-03-02T10:00:00Z
2,u1,Dune,14.5,2024-03-09,cash,,,false,false,book,,
";
        let purchases = load_purchases_from_reader(data.as_bytes()).unwrap();
        assert_eq!(purchases.len(), 2);

        assert_eq!(purchases[0].title, "Elden Ring");
        assert_eq!(purchases[0].category_id, Some(4));
        assert_eq!(purchases[0].digital_location_id, None);
        assert!(purchases[0].is_digital);

        // Missing timestamps default to the purchase date
        assert_eq!(purchases[1].created_at.date_naive(), purchases[1].purchase_date);
        assert_eq!(purchases[1].category(), "book");
    }

    #[test]
    fn test_load_subscriptions_keeps_raw_cycle_label() {
        let data = "\
id,user_id,name,is_active,billing_cycle,cost_per_cycle,anchor_date,last_payment_date,next_payment_date,payment_method,created_at,updated_at
10,u1,Game Pass,true,3 month,15.0,2024-01-15,2024-01-15,2024-04-15,card,,
11,u1,Legacy,true,fortnightly,5.0,2024-01-01,,,card,,
";
        let subs = load_subscriptions_from_reader(data.as_bytes()).unwrap();
        assert_eq!(subs.len(), 2);
        assert!(subs[0].is_subscription);
        assert_eq!(subs[0].next_payment_date, NaiveDate::from_ymd_opt(2024, 4, 15));
        assert!(subs[0].cycle().is_ok());
        assert!(subs[1].cycle().is_err());
    }

    #[test]
    fn test_load_monthly_aggregates_with_categories() {
        let data = "\
user_id,year,month,total_amount,subscription_amount,one_time_amount,category_amounts
u1,2024,1,75.0,15.0,60.0,\"{\"\"game\"\":60.0,\"\"subscription\"\":15.0}\"
u1,2024,2,0.0,0.0,0.0,
";
        let aggregates = load_monthly_aggregates_from_reader(data.as_bytes()).unwrap();
        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates[0].category_amounts.get("game"), Some(&60.0));
        assert!(aggregates[1].category_amounts.is_empty());
    }

    #[test]
    fn test_monthly_aggregate_rejects_bad_month() {
        let data = "\
user_id,year,month,total_amount,subscription_amount,one_time_amount,category_amounts
u1,2024,13,1.0,0.0,1.0,
";
        let err = load_monthly_aggregates_from_reader(data.as_bytes()).unwrap_err();
        assert!(matches!(err, StoreError::Malformed(_)));
    }

    #[test]
    fn test_user_ids_are_distinct_and_sorted() {
        let yearly = "\
user_id,year,total_amount,subscription_amount,one_time_amount,category_amounts
u2,2023,10.0,10.0,0.0,
u1,2023,5.0,0.0,5.0,
u2,2024,10.0,10.0,0.0,
";
        let records = LoadedRecords {
            yearly_aggregates: load_yearly_aggregates_from_reader(yearly.as_bytes()).unwrap(),
            ..Default::default()
        };
        assert_eq!(records.user_ids(), vec!["u1".to_string(), "u2".to_string()]);
    }

    #[test]
    fn test_missing_data_dir_is_unavailable() {
        let err = load_data_dir("/definitely/not/a/real/dir").unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
