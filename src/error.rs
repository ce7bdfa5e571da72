//! Error taxonomy for the spend tracking engine

use thiserror::Error;

use crate::store::{CacheError, StoreError};

/// Errors surfaced by the engine
#[derive(Debug, Error)]
pub enum SpendError {
    /// Billing-cycle label outside the supported set
    #[error("invalid billing cycle: {0:?}")]
    InvalidBillingCycle(String),

    /// Negative or non-finite amount on a single purchase or subscription
    #[error("invalid amount {amount} on {record}")]
    InvalidAmount { record: String, amount: f64 },

    /// Empty or malformed user id, rejected before any store access
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// Primary data could not be read; the whole response is aborted
    #[error("data store failure while {stage}: {source}")]
    DataStore {
        stage: &'static str,
        #[source]
        source: StoreError,
    },

    /// Cache collaborator failure. Only returned from explicit cache
    /// operations such as invalidation; reads and writes fall through.
    #[error("cache failure: {0}")]
    Cache(#[from] CacheError),

    /// A calendar month outside the supported date range
    #[error("month {year}-{month:02} is out of range")]
    MonthOutOfRange { year: i32, month: u32 },

    #[error("subscription {subscription_id} not found for user {user_id}")]
    SubscriptionNotFound {
        user_id: String,
        subscription_id: i64,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SpendError {
    /// Wrap a store error with the stage that was running
    pub fn data_store(stage: &'static str, source: StoreError) -> Self {
        SpendError::DataStore { stage, source }
    }

    /// Per-item errors are logged and skipped during batch iteration
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            SpendError::InvalidBillingCycle(_) | SpendError::InvalidAmount { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SpendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_store_error_names_stage() {
        let err = SpendError::data_store(
            "loading subscriptions",
            StoreError::Unavailable("connection refused".into()),
        );
        let msg = err.to_string();
        assert!(msg.contains("loading subscriptions"));
        assert!(msg.contains("connection refused"));
        assert!(!err.is_item_level());
    }

    #[test]
    fn test_billing_cycle_error_is_item_level() {
        let err = SpendError::InvalidBillingCycle("2 month".into());
        assert!(err.is_item_level());
        assert_eq!(err.to_string(), "invalid billing cycle: \"2 month\"");
    }
}
