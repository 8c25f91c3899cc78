use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::{PaymentError, rate::RateResolution};
use crate::model::{attendance::AttendanceRecord, contract::Contract};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DayLine {
    pub attendance_id: u64,

    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,

    pub payment_percentage: f64,

    /// Rate of the contract covering this day.
    #[schema(value_type = Object)]
    pub rate: RateResolution,

    pub amount: f64,
}

/// What a worker is owed for the unpaid present days of a date range.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DayPaymentQuote {
    pub worker_id: u64,
    pub project_id: u64,

    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,

    #[schema(value_type = String, format = "date")]
    pub end: NaiveDate,

    pub days: Vec<DayLine>,

    /// Set when at least one day was priced at 0 for lack of a single covering contract.
    pub rate_unresolved: bool,

    /// Days counted in the range, including those at 0%.
    pub days_count: usize,

    pub total: f64,
}

impl DayPaymentQuote {
    /// Builds a quote from the worker's attendance rows. Rows that are absent,
    /// already paid or outside `[start, end]` are skipped. Each day is priced
    /// with the per-day contract covering it; a day without exactly one such
    /// contract is priced at 0.
    pub fn build(
        worker_id: u64,
        project_id: u64,
        start: NaiveDate,
        end: NaiveDate,
        rows: &[AttendanceRecord],
        contracts: &[Contract],
    ) -> Result<Self, PaymentError> {
        if start > end {
            return Err(PaymentError::InvalidRange(start, end));
        }

        let mut days: Vec<DayLine> = rows
            .iter()
            .filter(|r| r.worker_id == worker_id && r.project_id == project_id)
            .filter(|r| r.is_present && !r.is_paid)
            .filter(|r| start <= r.date && r.date <= end)
            .map(|r| {
                let rate = RateResolution::resolve(contracts, Some(r.date));
                DayLine {
                    attendance_id: r.id,
                    date: r.date,
                    payment_percentage: r.payment_percentage,
                    amount: day_amount(rate.rate_or_zero(), r.payment_percentage),
                    rate,
                }
            })
            .collect();
        days.sort_by_key(|d| d.date);

        let total = days.iter().map(|d| d.amount).sum();

        Ok(Self {
            worker_id,
            project_id,
            start,
            end,
            rate_unresolved: days.iter().any(|d| !d.rate.is_resolved()),
            days_count: days.len(),
            days,
            total,
        })
    }

    /// A quote can be paid only when it has at least one day and every day
    /// resolved to a single contract.
    pub fn ensure_payable(&self) -> Result<(), PaymentError> {
        if self.days.is_empty() {
            return Err(PaymentError::NothingToPay);
        }
        for day in &self.days {
            day.rate.require()?;
        }
        Ok(())
    }

    pub fn attendance_ids(&self) -> Vec<u64> {
        self.days.iter().map(|d| d.attendance_id).collect()
    }
}

pub fn day_amount(daily_rate: f64, payment_percentage: f64) -> f64 {
    daily_rate * (payment_percentage / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{attendance::day, contract::per_day};

    fn d(day_of_month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day_of_month).unwrap()
    }

    fn rate(daily_rate: f64) -> Vec<Contract> {
        vec![per_day(1, Some(daily_rate), "active")]
    }

    #[test]
    fn full_and_half_day_sum() {
        let rows = vec![day(1, d(3), true, false, 100.0), day(2, d(4), true, false, 50.0)];
        let quote = DayPaymentQuote::build(1, 1, d(1), d(31), &rows, &rate(30000.0)).unwrap();

        assert_eq!(quote.total, 45000.0);
        assert_eq!(quote.days_count, 2);
        assert_eq!(quote.attendance_ids(), vec![1, 2]);
        assert!(!quote.rate_unresolved);
        assert_eq!(quote.ensure_payable(), Ok(()));
    }

    #[test]
    fn zero_percent_day_counts_but_pays_nothing() {
        let rows = vec![day(1, d(3), true, false, 0.0), day(2, d(4), true, false, 100.0)];
        let quote = DayPaymentQuote::build(1, 1, d(3), d(4), &rows, &rate(30000.0)).unwrap();

        assert_eq!(quote.days_count, 2);
        assert_eq!(quote.days[0].amount, 0.0);
        assert_eq!(quote.total, 30000.0);
    }

    #[test]
    fn skips_absent_paid_and_out_of_range_rows() {
        let rows = vec![
            day(1, d(3), false, false, 100.0),
            day(2, d(4), true, true, 100.0),
            day(3, d(10), true, false, 100.0),
            day(4, d(5), true, false, 100.0),
        ];
        let quote = DayPaymentQuote::build(1, 1, d(1), d(7), &rows, &rate(20000.0)).unwrap();

        assert_eq!(quote.attendance_ids(), vec![4]);
        assert_eq!(quote.total, 20000.0);
    }

    #[test]
    fn missing_rate_prices_at_zero_but_is_not_payable() {
        let rows = vec![day(1, d(3), true, false, 100.0)];
        let quote = DayPaymentQuote::build(1, 1, d(1), d(7), &rows, &[]).unwrap();

        assert_eq!(quote.total, 0.0);
        assert_eq!(quote.days_count, 1);
        assert!(quote.rate_unresolved);
        assert_eq!(quote.ensure_payable(), Err(PaymentError::RateNotFound));
    }

    #[test]
    fn each_day_uses_the_contract_covering_it() {
        let mut march = per_day(1, Some(20000.0), "active");
        march.end_date = Some(d(4));
        let mut later = per_day(2, Some(30000.0), "active");
        later.start_date = d(5);
        let rows = vec![day(1, d(4), true, false, 100.0), day(2, d(5), true, false, 100.0)];

        let quote = DayPaymentQuote::build(1, 1, d(1), d(31), &rows, &[march, later]).unwrap();
        assert_eq!(quote.days[0].amount, 20000.0);
        assert_eq!(quote.days[1].amount, 30000.0);
        assert_eq!(quote.total, 50000.0);
        assert_eq!(quote.ensure_payable(), Ok(()));
    }

    #[test]
    fn day_outside_every_contract_blocks_payment() {
        let mut contract = per_day(1, Some(30000.0), "active");
        contract.start_date = d(5);
        let rows = vec![day(1, d(3), true, false, 100.0), day(2, d(6), true, false, 100.0)];

        let quote = DayPaymentQuote::build(1, 1, d(1), d(7), &rows, &[contract]).unwrap();
        assert_eq!(quote.days[0].amount, 0.0);
        assert_eq!(quote.total, 30000.0);
        assert!(quote.rate_unresolved);
        assert_eq!(quote.ensure_payable(), Err(PaymentError::RateNotFound));
    }

    #[test]
    fn empty_range_is_not_payable() {
        let quote = DayPaymentQuote::build(1, 1, d(1), d(7), &[], &rate(30000.0)).unwrap();
        assert_eq!(quote.ensure_payable(), Err(PaymentError::NothingToPay));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DayPaymentQuote::build(1, 1, d(7), d(1), &[], &rate(30000.0)).unwrap_err();
        assert_eq!(err, PaymentError::InvalidRange(d(7), d(1)));
    }
}
