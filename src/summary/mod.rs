//! Spend tracking response and its builder

mod builder;
mod response;

pub use builder::SpendTrackingResponseBuilder;
pub use response::{
    percentage_change, MonthlySummary, SpendTrackingResponse, SubscriptionOutlook,
};
