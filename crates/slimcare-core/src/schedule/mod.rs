//! Treatment scheduling: dose generation, read-time dose status and the
//! treatment lifecycle.
//!
//! ```text
//! enroll ──► generate_schedule ──► [pending doses] ──administer──► [administered]
//!                                        │
//!                 terminate (completed / abandoned / non-payment)
//!                                        │
//!                 reactivate ──► drop pending tail ──► generate_schedule_from(anchor)
//! ```

pub mod lifecycle;
pub mod status;

pub use lifecycle::*;
pub use status::*;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{format_date, Dose};

/// Cadence rule for a generated schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleRule {
    /// Number of doses to generate
    pub dose_count: u32,
    /// Days between successive doses
    pub cadence_days: u32,
}

impl Default for ScheduleRule {
    fn default() -> Self {
        Self {
            dose_count: 4,
            cadence_days: 7,
        }
    }
}

/// Generate `dose_count` pending doses numbered from 1, the n-th dated
/// `first_dose_date + (n - 1) * cadence_days`.
pub fn generate_schedule(first_dose_date: NaiveDate, dose_count: u32, cadence_days: u32) -> Vec<Dose> {
    generate_schedule_from(1, first_dose_date, dose_count, cadence_days)
}

/// Same as [`generate_schedule`] with numbering starting at `first_number`.
///
/// Generation stops early only if a date would overflow the calendar, so the
/// numbering never has gaps.
pub fn generate_schedule_from(
    first_number: u32,
    first_dose_date: NaiveDate,
    dose_count: u32,
    cadence_days: u32,
) -> Vec<Dose> {
    (0..dose_count)
        .map_while(|offset| {
            let days = u64::from(offset) * u64::from(cadence_days);
            let date = first_dose_date.checked_add_days(Days::new(days))?;
            let number = first_number.checked_add(offset)?;
            Some(Dose::pending(number, format_date(date)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_generate_schedule_dates() {
        let doses = generate_schedule(day(2024, 1, 10), 5, 14);

        let numbers: Vec<u32> = doses.iter().map(|d| d.dose_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        let dates: Vec<&str> = doses.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(
            dates,
            vec!["2024-01-10", "2024-01-24", "2024-02-07", "2024-02-21", "2024-03-06"]
        );
        assert!(doses.iter().all(|d| d.is_pending()
            && d.administered_mg.is_none()
            && d.weight_kg.is_none()
            && d.bmi.is_none()));
    }

    #[test]
    fn test_generate_schedule_deterministic() {
        let first = generate_schedule(day(2024, 1, 10), 5, 14);
        let second = generate_schedule(day(2024, 1, 10), 5, 14);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_generate_from_offset_numbering() {
        let doses = generate_schedule_from(4, day(2024, 3, 1), 2, 7);
        assert_eq!(doses[0].dose_number, 4);
        assert_eq!(doses[1].dose_number, 5);
        assert_eq!(doses[1].date, "2024-03-08");
    }

    #[test]
    fn test_zero_doses() {
        assert!(generate_schedule(day(2024, 1, 1), 0, 7).is_empty());
    }

    #[test]
    fn test_calendar_overflow_stops_without_gaps() {
        let doses = generate_schedule(NaiveDate::MAX, 3, 1);
        assert_eq!(doses.len(), 1);
        assert_eq!(doses[0].dose_number, 1);
    }
}
