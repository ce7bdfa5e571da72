//! Whether a subscription charges inside a given calendar month

use chrono::NaiveDate;

use super::billing::months_between;
use crate::error::Result;
use crate::records::{first_of_month, Subscription};

/// True when the subscription's periodic charge falls inside the month
/// containing `target_month`.
///
/// Months before the anchor month are never due: the subscription is not
/// active yet, even when the offset happens to be a multiple of the cycle.
/// An unrecognized billing cycle is an error, checked before the anchor.
pub fn is_due(sub: &Subscription, target_month: NaiveDate) -> Result<bool> {
    let cycle = sub.cycle()?.months() as i64;
    let target = first_of_month(target_month);

    let months_since_anchor = months_between(sub.anchor_date, target);
    if months_since_anchor < 0 {
        return Ok(false);
    }

    Ok(months_since_anchor.rem_euclid(cycle) == 0)
}
