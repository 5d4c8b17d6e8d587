//! Read-time dose status.
//!
//! Staleness is never written back: a pending dose in the past is shown as
//! overdue but stays `pending` in storage.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Dose, DoseState, DATE_FORMAT};

/// Days ahead (inclusive) that count as upcoming.
pub const UPCOMING_WINDOW_DAYS: i64 = 7;

/// Display classification of a dose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Administered,
    Overdue,
    Upcoming,
    Scheduled,
}

/// Badge colour for a status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusColor {
    Green,
    Red,
    Amber,
    Neutral,
}

impl DoseStatus {
    /// Lowercase form used across the FFI boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseStatus::Administered => "administered",
            DoseStatus::Overdue => "overdue",
            DoseStatus::Upcoming => "upcoming",
            DoseStatus::Scheduled => "scheduled",
        }
    }

    pub fn color(&self) -> StatusColor {
        match self {
            DoseStatus::Administered => StatusColor::Green,
            DoseStatus::Overdue => StatusColor::Red,
            DoseStatus::Upcoming => StatusColor::Amber,
            DoseStatus::Scheduled => StatusColor::Neutral,
        }
    }
}

/// A classified dose ready for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseDisplay {
    pub status: DoseStatus,
    pub label: String,
    pub color: StatusColor,
}

/// Today's local date.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Classify a dose relative to `today` at day granularity.
///
/// Missing or unparseable dates classify as `Scheduled`.
pub fn classify_dose(dose: &Dose, today: NaiveDate) -> DoseStatus {
    if dose.status == DoseState::Administered {
        return DoseStatus::Administered;
    }
    match dose.scheduled_date() {
        Some(date) => {
            let diff = (date - today).num_days();
            if diff < 0 {
                DoseStatus::Overdue
            } else if diff <= UPCOMING_WINDOW_DAYS {
                DoseStatus::Upcoming
            } else {
                DoseStatus::Scheduled
            }
        }
        None => DoseStatus::Scheduled,
    }
}

/// Classify a dose and build its label. Never fails.
pub fn resolve_dose_status(dose: &Dose, today: NaiveDate) -> DoseDisplay {
    let status = classify_dose(dose, today);
    let label = match (status, dose.scheduled_date()) {
        (DoseStatus::Administered, _) => "Administered".to_string(),
        (_, None) => "Date not set".to_string(),
        (DoseStatus::Overdue, Some(date)) => {
            let days = (today - date).num_days();
            if days == 1 {
                "Overdue by 1 day".to_string()
            } else {
                format!("Overdue by {} days", days)
            }
        }
        (DoseStatus::Upcoming, Some(date)) => match (date - today).num_days() {
            0 => "Due today".to_string(),
            1 => "Due tomorrow".to_string(),
            days => format!("Due in {} days", days),
        },
        (DoseStatus::Scheduled, Some(date)) => {
            format!("Scheduled for {}", date.format(DATE_FORMAT))
        }
    };

    DoseDisplay {
        status,
        label,
        color: status.color(),
    }
}

/// Number of pending doses whose date has passed.
pub fn count_overdue(doses: &[Dose], today: NaiveDate) -> usize {
    doses
        .iter()
        .filter(|d| classify_dose(d, today) == DoseStatus::Overdue)
        .count()
}

/// Pending doses dated within `[today, today + days]`, in input order.
pub fn upcoming_within(doses: &[Dose], today: NaiveDate, days: i64) -> Vec<&Dose> {
    doses
        .iter()
        .filter(|d| d.is_pending())
        .filter(|d| {
            d.scheduled_date()
                .map(|date| (0..=days).contains(&(date - today).num_days()))
                .unwrap_or(false)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn pending(date: &str) -> Dose {
        Dose::pending(1, date.into())
    }

    #[test]
    fn test_status_boundaries() {
        assert_eq!(classify_dose(&pending("2024-01-09"), today()), DoseStatus::Overdue);
        assert_eq!(classify_dose(&pending("2024-01-10"), today()), DoseStatus::Upcoming);
        assert_eq!(classify_dose(&pending("2024-01-17"), today()), DoseStatus::Upcoming);
        assert_eq!(classify_dose(&pending("2024-01-18"), today()), DoseStatus::Scheduled);
    }

    #[test]
    fn test_administered_ignores_date() {
        for date in ["2023-01-01", "2024-01-10", "2030-06-01", "garbage"] {
            let mut dose = pending(date);
            dose.status = DoseState::Administered;
            let display = resolve_dose_status(&dose, today());
            assert_eq!(display.status, DoseStatus::Administered);
            assert_eq!(display.color, StatusColor::Green);
        }
    }

    #[test]
    fn test_invalid_date_is_placeholder() {
        let display = resolve_dose_status(&pending(""), today());
        assert_eq!(display.status, DoseStatus::Scheduled);
        assert_eq!(display.label, "Date not set");
        assert_eq!(display.color, StatusColor::Neutral);
    }

    #[test]
    fn test_labels() {
        assert_eq!(resolve_dose_status(&pending("2024-01-09"), today()).label, "Overdue by 1 day");
        assert_eq!(resolve_dose_status(&pending("2024-01-05"), today()).label, "Overdue by 5 days");
        assert_eq!(resolve_dose_status(&pending("2024-01-10"), today()).label, "Due today");
        assert_eq!(resolve_dose_status(&pending("2024-01-14"), today()).label, "Due in 4 days");
        assert_eq!(
            resolve_dose_status(&pending("2024-02-01"), today()).label,
            "Scheduled for 2024-02-01"
        );
    }

    #[test]
    fn test_counts() {
        let mut administered = pending("2024-01-01");
        administered.status = DoseState::Administered;
        let doses = vec![
            administered,
            pending("2024-01-03"),
            pending("2024-01-09"),
            pending("2024-01-12"),
            pending("2024-01-30"),
        ];
        assert_eq!(count_overdue(&doses, today()), 2);

        let upcoming = upcoming_within(&doses, today(), UPCOMING_WINDOW_DAYS);
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].date, "2024-01-12");
    }
}
