//! Billing-cycle resolution and billing schedules
//!
//! Every billing date is computed as `anchor + k * cycle` months from the
//! anchor itself, never by stepping from the previous date, so an anchor on
//! the 31st lands on the last day of short months without drifting.

use chrono::{Datelike, Months, NaiveDate};

use crate::error::{Result, SpendError};
use crate::records::{BillingCycle, Subscription};

/// Map a billing-cycle label to its month count (1, 3, 6 or 12)
pub fn resolve_cycle_months(label: &str) -> Result<u32> {
    Ok(BillingCycle::from_label(label)?.months())
}

/// Month index (`year * 12 + month0`) for month arithmetic
pub(crate) fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}

/// Calendar months from `from`'s month to `to`'s month (negative if earlier)
pub fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    month_index(to) - month_index(from)
}

/// The `k`-th billing date (k = 0 is the anchor)
pub fn nth_billing_date(sub: &Subscription, cycle: BillingCycle, k: u32) -> Option<NaiveDate> {
    let months = k.checked_mul(cycle.months())?;
    sub.anchor_date.checked_add_months(Months::new(months))
}

/// Reject costs that cannot be summed
pub(crate) fn checked_cost(sub: &Subscription) -> Result<f64> {
    if sub.cost_per_cycle.is_finite() && sub.cost_per_cycle >= 0.0 {
        Ok(sub.cost_per_cycle)
    } else {
        Err(SpendError::InvalidAmount {
            record: format!("subscription {}", sub.id),
            amount: sub.cost_per_cycle,
        })
    }
}

/// All billing dates from the anchor through `end` inclusive
pub fn billing_dates_through(sub: &Subscription, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    let cycle = sub.cycle()?;
    if end < sub.anchor_date {
        return Ok(Vec::new());
    }

    // Upper bound on iterations: one event per cycle over the whole span
    let span = months_between(sub.anchor_date, end).max(0) as u32;
    let max_events = span / cycle.months() + 1;

    let mut dates = Vec::with_capacity(max_events as usize);
    for k in 0..=max_events {
        match nth_billing_date(sub, cycle, k) {
            Some(date) if date <= end => dates.push(date),
            _ => break,
        }
    }
    Ok(dates)
}

/// First billing date on or after `date`
pub fn next_billing_date(sub: &Subscription, date: NaiveDate) -> Result<Option<NaiveDate>> {
    let cycle = sub.cycle()?;
    if date <= sub.anchor_date {
        return Ok(Some(sub.anchor_date));
    }

    let c = cycle.months() as i64;
    let elapsed = months_between(sub.anchor_date, date);
    // Smallest k whose billing month is not before `date`'s month
    let mut k = ((elapsed + c - 1) / c) as u32;

    // The billing day inside that month may still precede `date`
    for _ in 0..2 {
        match nth_billing_date(sub, cycle, k) {
            Some(candidate) if candidate >= date => return Ok(Some(candidate)),
            Some(_) => k += 1,
            None => return Ok(None),
        }
    }
    Ok(None)
}
