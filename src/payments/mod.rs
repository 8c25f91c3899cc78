//! Payment rules: daily-rate resolution, per-day payment quotes, task budget
//! distribution and the pending-payment aggregation.
//!
//! Everything here is pure; the handlers in `api::payment` and `api::task`
//! load rows, call into these modules and write the result in one transaction.

pub mod aggregator;
pub mod day_payment;
pub mod distribution;
pub mod rate;

use chrono::NaiveDate;
use derive_more::Display;

/// Allowed drift when checking that shares add up to 100.
pub const PERCENT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Display, PartialEq)]
pub enum PaymentError {
    #[display(fmt = "percentage {} is outside 0-100", _0)]
    PercentageOutOfRange(f64),

    #[display(fmt = "percentages sum to {:.2}, expected 100", _0)]
    InvalidTotal(f64),

    #[display(fmt = "worker {} is already assigned to this task", _0)]
    AlreadyAssigned(u64),

    #[display(fmt = "worker {} is not assigned to this task", _0)]
    NotAssigned(u64),

    #[display(fmt = "worker {} has already been paid; their share cannot change", _0)]
    PaidShareLocked(u64),

    #[display(fmt = "distribution does not include assigned worker {}", _0)]
    MissingWorker(u64),

    #[display(fmt = "worker {} appears more than once", _0)]
    DuplicateWorker(u64),

    #[display(fmt = "paid assignments already take the whole budget")]
    NoShareLeft,

    #[display(fmt = "nothing pending to pay for the selection")]
    NothingToPay,

    #[display(fmt = "no active per-day contract for this worker and project")]
    RateNotFound,

    #[display(fmt = "{} active per-day contracts match; resolve before paying", _0)]
    RateAmbiguous(usize),

    #[display(fmt = "range start {} is after end {}", _0, _1)]
    InvalidRange(NaiveDate, NaiveDate),

    #[display(fmt = "rows changed while the payment was processed")]
    ConcurrentChange,
}

impl std::error::Error for PaymentError {}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Amount owed for `percentage` of `budget`.
pub fn share_of(budget: f64, percentage: f64) -> f64 {
    budget * percentage / 100.0
}

/// A batch flip to paid must touch every selected row. Fewer affected rows
/// means another request paid some of them first.
pub fn ensure_all_flipped(selected: usize, affected: u64) -> Result<(), PaymentError> {
    if affected == selected as u64 {
        Ok(())
    } else {
        Err(PaymentError::ConcurrentChange)
    }
}

pub fn check_percentage(value: f64) -> Result<f64, PaymentError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(PaymentError::PercentageOutOfRange(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_bounds() {
        assert_eq!(check_percentage(0.0), Ok(0.0));
        assert_eq!(check_percentage(100.0), Ok(100.0));
        assert!(check_percentage(100.5).is_err());
        assert!(check_percentage(-1.0).is_err());
        assert!(check_percentage(f64::NAN).is_err());
    }

    #[test]
    fn partial_flip_is_a_concurrent_change() {
        assert_eq!(ensure_all_flipped(2, 2), Ok(()));
        assert_eq!(ensure_all_flipped(2, 1), Err(PaymentError::ConcurrentChange));
        assert_eq!(ensure_all_flipped(3, 0), Err(PaymentError::ConcurrentChange));
    }

    #[test]
    fn share_and_rounding() {
        assert_eq!(share_of(100000.0, 50.0), 50000.0);
        assert_eq!(round2(33.333333), 33.33);
    }
}
