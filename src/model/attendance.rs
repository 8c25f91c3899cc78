use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Default share of the daily rate payable for a present day.
pub const FULL_DAY_PERCENTAGE: f64 = 100.0;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: u64,
    pub worker_id: u64,
    pub project_id: u64,

    #[schema(nullable = true)]
    pub contract_id: Option<u64>,

    #[schema(example = "2025-03-03", value_type = String, format = "date")]
    pub date: NaiveDate,

    pub is_present: bool,

    #[schema(example = "08:00:00", value_type = Option<String>, nullable = true)]
    pub check_in: Option<NaiveTime>,

    #[schema(example = "18:00:00", value_type = Option<String>, nullable = true)]
    pub check_out: Option<NaiveTime>,

    #[schema(nullable = true)]
    pub hours_worked: Option<f64>,

    pub is_overtime: bool,
    pub overtime_hours: f64,
    pub early_departure: bool,

    #[schema(nullable = true)]
    pub early_departure_reason: Option<String>,

    /// Share (0-100) of the daily rate payable for this day.
    #[schema(example = 100.0)]
    pub payment_percentage: f64,

    pub is_paid: bool,
}

/// Hours and flags derived from a day's check-in and check-out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorkSummary {
    pub hours_worked: Option<f64>,
    pub is_overtime: bool,
    pub overtime_hours: f64,
    pub early_departure: bool,
}

impl WorkSummary {
    /// `check_out` must be after `check_in`; both are required to derive
    /// anything. Hours beyond `standard_hours` are overtime, fewer hours is an
    /// early departure.
    pub fn compute(
        check_in: Option<NaiveTime>,
        check_out: Option<NaiveTime>,
        standard_hours: f64,
    ) -> Option<Self> {
        let (Some(start), Some(end)) = (check_in, check_out) else {
            return Some(Self::default());
        };
        if end <= start {
            return None;
        }

        let hours = (end - start).num_minutes() as f64 / 60.0;
        let overtime = (hours - standard_hours).max(0.0);

        Some(Self {
            hours_worked: Some((hours * 100.0).round() / 100.0),
            is_overtime: overtime > 0.0,
            overtime_hours: (overtime * 100.0).round() / 100.0,
            early_departure: hours < standard_hours,
        })
    }
}

#[cfg(test)]
pub(crate) fn day(id: u64, date: NaiveDate, present: bool, paid: bool, pct: f64) -> AttendanceRecord {
    AttendanceRecord {
        id,
        worker_id: 1,
        project_id: 1,
        contract_id: None,
        date,
        is_present: present,
        check_in: None,
        check_out: None,
        hours_worked: None,
        is_overtime: false,
        overtime_hours: 0.0,
        early_departure: false,
        early_departure_reason: None,
        payment_percentage: pct,
        is_paid: paid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    #[test]
    fn long_day_is_overtime() {
        let s = WorkSummary::compute(t(8, 0), t(19, 30), 9.0).unwrap();
        assert_eq!(s.hours_worked, Some(11.5));
        assert!(s.is_overtime);
        assert_eq!(s.overtime_hours, 2.5);
        assert!(!s.early_departure);
    }

    #[test]
    fn short_day_is_early_departure() {
        let s = WorkSummary::compute(t(8, 0), t(13, 0), 9.0).unwrap();
        assert_eq!(s.hours_worked, Some(5.0));
        assert!(s.early_departure);
        assert!(!s.is_overtime);
    }

    #[test]
    fn missing_times_derive_nothing() {
        assert_eq!(WorkSummary::compute(t(8, 0), None, 9.0), Some(WorkSummary::default()));
    }

    #[test]
    fn check_out_before_check_in_is_invalid() {
        assert_eq!(WorkSummary::compute(t(18, 0), t(8, 0), 9.0), None);
    }
}
