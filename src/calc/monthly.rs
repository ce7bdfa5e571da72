//! Monthly spend aggregation
//!
//! Merges one-time purchases and due subscriptions for one calendar month
//! into category totals and an itemized list. Purchases are keyed by media
//! type, subscriptions by [`SUBSCRIPTION_CATEGORY`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::billing::checked_cost;
use super::due::is_due;
use crate::error::{Result, SpendError};
use crate::records::{first_of_month, OneTimePurchase, Subscription, SUBSCRIPTION_CATEGORY};
use crate::store::DataStore;

/// Where an itemized line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    OneTime,
    Subscription,
}

/// One itemized transaction line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendItem {
    /// Purchase id or subscription (digital location) id
    pub id: i64,
    pub title: String,
    pub amount: f64,

    /// Purchase date, or the billing day inside the month for subscriptions
    pub date: NaiveDate,

    pub category: String,
    pub kind: ItemKind,
    pub payment_method: String,
}

/// Spend for a single calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySpend {
    /// First day of the month
    pub month: NaiveDate,

    /// Sum of `categories`
    pub total_amount: f64,

    pub one_time_total: f64,
    pub subscription_total: f64,

    /// Category label -> amount
    pub categories: BTreeMap<String, f64>,

    /// Purchases first, then subscriptions, each in fetch order
    pub items: Vec<SpendItem>,
}

impl MonthlySpend {
    fn empty(month: NaiveDate) -> Self {
        Self {
            month: first_of_month(month),
            total_amount: 0.0,
            one_time_total: 0.0,
            subscription_total: 0.0,
            categories: BTreeMap::new(),
            items: Vec::new(),
        }
    }

    /// Items of one kind, in list order
    pub fn items_of_kind(&self, kind: ItemKind) -> Vec<SpendItem> {
        self.items.iter().filter(|i| i.kind == kind).cloned().collect()
    }

    fn add(&mut self, item: SpendItem) {
        *self.categories.entry(item.category.clone()).or_insert(0.0) += item.amount;
        match item.kind {
            ItemKind::OneTime => self.one_time_total += item.amount,
            ItemKind::Subscription => self.subscription_total += item.amount,
        }
        self.items.push(item);
    }
}

/// Aggregates a user's spend for one month
pub struct MonthlySpendAggregator {
    store: Arc<dyn DataStore>,
}

impl MonthlySpendAggregator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Fetch the month's purchases and the active subscriptions, then aggregate
    pub fn aggregate_month(&self, user_id: &str, target_month: NaiveDate) -> Result<MonthlySpend> {
        let purchases = self
            .store
            .select_one_time_purchases_in_month(user_id, target_month)
            .map_err(|e| SpendError::data_store("loading one-time purchases", e))?;
        let subscriptions = self
            .store
            .select_active_subscriptions(user_id)
            .map_err(|e| SpendError::data_store("loading subscriptions", e))?;

        Ok(Self::aggregate(&purchases, &subscriptions, target_month))
    }

    /// Aggregate already-fetched rows.
    ///
    /// Purchases dated outside the month, negative amounts, inactive
    /// subscriptions and subscriptions whose cycle cannot be resolved are
    /// skipped; the rest of the month is still aggregated.
    pub fn aggregate(
        purchases: &[OneTimePurchase],
        subscriptions: &[Subscription],
        target_month: NaiveDate,
    ) -> MonthlySpend {
        let mut spend = MonthlySpend::empty(target_month);
        let month = spend.month;

        for purchase in purchases {
            if purchase.purchase_date.year() != month.year()
                || purchase.purchase_date.month() != month.month()
            {
                debug!(
                    "purchase {} dated {} is outside {}, skipping",
                    purchase.id,
                    purchase.purchase_date,
                    month.format("%Y-%m")
                );
                continue;
            }
            if !purchase.amount.is_finite() || purchase.amount < 0.0 {
                warn!("purchase {} has invalid amount {}, skipping", purchase.id, purchase.amount);
                continue;
            }

            spend.add(SpendItem {
                id: purchase.id,
                title: purchase.title.clone(),
                amount: purchase.amount,
                date: purchase.purchase_date,
                category: purchase.category().to_string(),
                kind: ItemKind::OneTime,
                payment_method: purchase.payment_method.clone(),
            });
        }

        for sub in subscriptions {
            match Self::subscription_charge(sub, month) {
                Ok(Some(amount)) => spend.add(SpendItem {
                    id: sub.id,
                    title: sub.name.clone(),
                    amount,
                    date: sub.billing_day_in(month),
                    category: SUBSCRIPTION_CATEGORY.to_string(),
                    kind: ItemKind::Subscription,
                    payment_method: sub.payment_method.clone(),
                }),
                Ok(None) => {}
                Err(e) => warn!("subscription {} ({}) skipped: {}", sub.id, sub.name, e),
            }
        }

        // Folded from +0.0: an empty f64 `sum` yields -0.0
        spend.total_amount = spend.categories.values().fold(0.0, |acc, v| acc + v);
        spend
    }

    /// Amount charged by `sub` in `month`, `None` when nothing is due
    fn subscription_charge(sub: &Subscription, month: NaiveDate) -> Result<Option<f64>> {
        if !sub.is_active || !sub.is_subscription {
            return Ok(None);
        }
        if !is_due(sub, month)? {
            return Ok(None);
        }
        Ok(Some(checked_cost(sub)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::MediaType;
    use crate::store::InMemoryDataStore;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn purchase(id: i64, amount: f64, on: NaiveDate, media: &str) -> OneTimePurchase {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        OneTimePurchase {
            id,
            user_id: "u1".into(),
            title: format!("purchase {}", id),
            amount,
            purchase_date: on,
            payment_method: "card".into(),
            category_id: None,
            digital_location_id: None,
            is_digital: true,
            is_wishlisted: false,
            media_type: media.into(),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn subscription(id: i64, cycle: &str, anchor: NaiveDate, cost: f64) -> Subscription {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Subscription {
            id,
            user_id: "u1".into(),
            name: format!("sub {}", id),
            is_active: true,
            is_subscription: true,
            billing_cycle: cycle.into(),
            cost_per_cycle: cost,
            anchor_date: anchor,
            last_payment_date: None,
            next_payment_date: None,
            payment_method: "paypal".into(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_merges_purchases_and_subscriptions() {
        let purchases = vec![
            purchase(1, 59.99, date(2024, 4, 2), "game"),
            purchase(2, 20.0, date(2024, 4, 9), "game"),
            purchase(3, 12.5, date(2024, 4, 28), "book"),
        ];
        let subs = vec![
            subscription(10, "3 month", date(2024, 1, 15), 15.0),
            subscription(11, "1 month", date(2023, 6, 30), 9.99),
            subscription(12, "12 month", date(2023, 8, 1), 70.0),
        ];

        let spend = MonthlySpendAggregator::aggregate(&purchases, &subs, date(2024, 4, 17));

        assert_eq!(spend.month, date(2024, 4, 1));
        assert_relative_eq!(spend.categories["game"], 79.99);
        assert_relative_eq!(spend.categories["book"], 12.5);
        assert_relative_eq!(spend.categories[SUBSCRIPTION_CATEGORY], 24.99);
        assert_eq!(spend.categories.len(), 3);

        assert_relative_eq!(spend.one_time_total, 92.49);
        assert_relative_eq!(spend.subscription_total, 24.99);
        assert_relative_eq!(spend.total_amount, 117.48, epsilon = 1e-9);

        let ids: Vec<i64> = spend.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 10, 11]);

        // Monthly sub anchored on the 30th bills on the 30th of April
        assert_eq!(spend.items[4].date, date(2024, 4, 30));
        assert_eq!(spend.items[3].kind, ItemKind::Subscription);
    }

    #[test]
    fn test_total_equals_sum_of_categories() {
        let purchases: Vec<OneTimePurchase> = (0..25)
            .map(|i| {
                let media = MediaType::ALL[i % 4].as_str();
                purchase(i as i64, 0.1 * (i as f64 + 1.0), date(2024, 2, 1 + (i as u32 % 28)), media)
            })
            .collect();
        let subs = vec![
            subscription(100, "1 month", date(2024, 1, 3), 4.99),
            subscription(101, "6 month", date(2023, 8, 3), 30.0),
        ];

        let spend = MonthlySpendAggregator::aggregate(&purchases, &subs, date(2024, 2, 1));
        let category_sum: f64 = spend.categories.values().sum();
        assert_eq!(spend.total_amount, category_sum);

        let item_sum: f64 = spend.items.iter().map(|i| i.amount).sum();
        assert_relative_eq!(spend.total_amount, item_sum, epsilon = 1e-9);
        for label in spend.categories.keys() {
            assert!(MediaType::is_known(label), "unexpected category {}", label);
        }
    }

    #[test]
    fn test_bad_items_are_skipped() {
        let purchases = vec![
            purchase(1, 10.0, date(2024, 5, 1), "movie"),
            purchase(2, -3.0, date(2024, 5, 2), "movie"),
            purchase(3, 8.0, date(2024, 6, 1), "movie"),
            purchase(4, 6.0, date(2024, 5, 3), ""),
        ];
        let mut inactive = subscription(11, "1 month", date(2024, 1, 1), 5.0);
        inactive.is_active = false;
        let subs = vec![
            subscription(10, "fortnightly", date(2024, 1, 1), 5.0),
            inactive,
            subscription(12, "1 month", date(2024, 1, 1), f64::INFINITY),
            subscription(13, "1 month", date(2024, 1, 1), 2.0),
        ];

        let spend = MonthlySpendAggregator::aggregate(&purchases, &subs, date(2024, 5, 1));

        let ids: Vec<i64> = spend.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 4, 13]);
        assert_relative_eq!(spend.categories["other"], 6.0);
        assert_relative_eq!(spend.total_amount, 18.0);
    }

    #[test]
    fn test_empty_month() {
        let spend = MonthlySpendAggregator::aggregate(&[], &[], date(2024, 9, 9));
        assert_eq!(spend.total_amount, 0.0);
        assert!(spend.categories.is_empty());
        assert!(spend.items.is_empty());
    }

    #[test]
    fn test_aggregate_month_reads_store() {
        let store = InMemoryDataStore::new()
            .with_purchases(vec![
                purchase(1, 30.0, date(2024, 7, 4), "music"),
                purchase(2, 99.0, date(2024, 8, 4), "music"),
            ])
            .with_subscriptions(vec![subscription(10, "3 month", date(2024, 1, 15), 15.0)]);
        let aggregator = MonthlySpendAggregator::new(Arc::new(store));

        let july = aggregator.aggregate_month("u1", date(2024, 7, 1)).unwrap();
        assert_relative_eq!(july.total_amount, 45.0);

        let august = aggregator.aggregate_month("u1", date(2024, 8, 1)).unwrap();
        assert_relative_eq!(august.total_amount, 99.0);
        assert!(august.items_of_kind(ItemKind::Subscription).is_empty());
    }

    #[test]
    fn test_empty_month_total_is_positive_zero() {
        let spend = MonthlySpendAggregator::aggregate(&[], &[], date(2024, 10, 1));
        assert_eq!(spend.total_amount, 0.0);
        assert!(spend.total_amount.is_sign_positive());
    }
}
