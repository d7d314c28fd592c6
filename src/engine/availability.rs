use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::{Availability, Overrides};

// ── Date availability rules ──────────────────────────────────────
//
// Evaluated in order, first match wins:
//   1. explicitly blocked        → unavailable
//   2. weekend (Sat/Sun)         → available
//   3. explicitly unlocked       → available
//   4. plain weekday             → unavailable
//
// Blocking therefore beats unlocking when a date sits in both lists, and a
// weekend can only be turned off via the blocked list.

pub fn date_availability(date: NaiveDate, overrides: &Overrides) -> Availability {
    if overrides.blocked.contains(&date) {
        return Availability::unavailable("this date is blocked");
    }
    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Availability::open();
    }
    if overrides.unlocked.contains(&date) {
        return Availability::open();
    }
    Availability::unavailable("bookings are only available on weekends")
}

/// Every available date in `[from, to]`, in order.
pub fn available_dates_in_range(
    from: NaiveDate,
    to: NaiveDate,
    overrides: &Overrides,
) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| date_availability(*d, overrides).available)
        .collect()
}
