//! Subscription cost within a calendar year

use chrono::{Datelike, NaiveDate};

use super::billing::{checked_cost, months_between, nth_billing_date};
use crate::error::Result;
use crate::records::Subscription;

/// A year never holds more billing events than this, whatever the cycle
pub const MAX_BILLING_EVENTS_PER_YEAR: u32 = 12;

/// Number of billing events of `sub` dated inside `year`
pub fn billing_events_in_year(sub: &Subscription, year: i32) -> Result<u32> {
    let cycle = sub.cycle()?;
    if sub.anchor_date.year() > year {
        // Not active yet
        return Ok(0);
    }

    let year_start = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(sub.anchor_date);
    let start = sub.anchor_date.max(year_start);

    // First billing event whose month is not before the start month
    let c = cycle.months() as i64;
    let elapsed = months_between(sub.anchor_date, start);
    let mut k = ((elapsed + c - 1) / c) as u32;

    let mut events = 0;
    for _ in 0..=MAX_BILLING_EVENTS_PER_YEAR {
        let Some(date) = nth_billing_date(sub, cycle, k) else {
            break;
        };
        if date.year() > year {
            break;
        }
        if date.year() == year {
            events += 1;
        }
        k += 1;
    }

    Ok(events)
}

/// Total charged by `sub` during `year`
pub fn yearly_cost(sub: &Subscription, year: i32) -> Result<f64> {
    let cost = checked_cost(sub)?;
    let events = billing_events_in_year(sub, year)?;
    Ok(events as f64 * cost)
}

/// Cost over a full year of billing, ignoring the anchor
pub fn annualized_cost(sub: &Subscription) -> Result<f64> {
    let cost = checked_cost(sub)?;
    Ok(sub.cycle()?.charges_per_year() as f64 * cost)
}
