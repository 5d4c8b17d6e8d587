//! Dose models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date format used for every stored calendar date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a stored calendar date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// Format a calendar date for storage.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Stored state of a dose.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseState {
    /// Scheduled, not yet applied
    Pending,
    /// Applied by staff
    Administered,
}

impl DoseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseState::Pending => "pending",
            DoseState::Administered => "administered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DoseState::Pending),
            "administered" => Some(DoseState::Administered),
            _ => None,
        }
    }
}

/// One scheduled or administered application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dose {
    /// Storage ID - None until the dose is persisted
    pub dose_id: Option<String>,
    /// 1-based position in the treatment
    pub dose_number: u32,
    /// Scheduled date (YYYY-MM-DD)
    pub date: String,
    /// Scheduled or actual time (HH:MM)
    pub time: Option<String>,
    /// Stored state
    pub status: DoseState,
    /// Amount applied in mg
    pub administered_mg: Option<f64>,
    /// Weight recorded at administration
    pub weight_kg: Option<f64>,
    /// BMI recorded at administration
    pub bmi: Option<f64>,
}

impl Dose {
    /// A pending stub as produced by the schedule generator.
    pub fn pending(dose_number: u32, date: String) -> Self {
        Self {
            dose_id: None,
            dose_number,
            date,
            time: None,
            status: DoseState::Pending,
            administered_mg: None,
            weight_kg: None,
            bmi: None,
        }
    }

    pub fn is_administered(&self) -> bool {
        self.status == DoseState::Administered
    }

    pub fn is_pending(&self) -> bool {
        self.status == DoseState::Pending
    }

    /// Scheduled date, if the stored value parses.
    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        parse_date(&self.date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_stub() {
        let dose = Dose::pending(3, "2024-02-01".into());
        assert!(dose.is_pending());
        assert!(dose.dose_id.is_none());
        assert_eq!(dose.scheduled_date(), NaiveDate::from_ymd_opt(2024, 2, 1));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date("01/02/2024"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date(" 2024-01-10 "), NaiveDate::from_ymd_opt(2024, 1, 10));
    }

    #[test]
    fn test_state_strings() {
        assert_eq!(DoseState::parse("administered"), Some(DoseState::Administered));
        assert_eq!(DoseState::parse(DoseState::Pending.as_str()), Some(DoseState::Pending));
        assert_eq!(DoseState::parse("skipped"), None);
    }
}
