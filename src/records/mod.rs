//! Spend records and CSV loading

mod data;
pub mod loader;

pub use data::{
    BillingCycle, MediaType, MonthlyAggregate, OneTimePurchase, Subscription, YearlyAggregate,
    days_in_month, first_of_month, month_abbrev, OTHER_CATEGORY, SUBSCRIPTION_CATEGORY,
};
pub use loader::{load_data_dir, LoadedRecords};
