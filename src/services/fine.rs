//! Late-fine computation.
//!
//! Pure arithmetic, no clock or storage access: the caller supplies the due
//! date, the effective end of the loan and the daily rate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::loan::LoanRecord;

/// Fine owed for a loan due at `due_at` and ended at `effective_end`.
///
/// Zero when the loan ended on time. Otherwise whole days late times the
/// daily rate; partial days do not count.
pub fn late_fine(due_at: DateTime<Utc>, effective_end: DateTime<Utc>, daily_rate: Decimal) -> Decimal {
    let days_late = (effective_end - due_at).num_days();
    if days_late <= 0 {
        Decimal::ZERO
    } else {
        Decimal::from(days_late) * daily_rate
    }
}

/// Running fine of a record evaluated at `now`; uses the return date once set
pub fn accrued_fine(record: &LoanRecord, now: DateTime<Utc>, daily_rate: Decimal) -> Decimal {
    match record.due_at {
        Some(due_at) => late_fine(due_at, record.returned_at.unwrap_or(now), daily_rate),
        None => Decimal::ZERO,
    }
}
