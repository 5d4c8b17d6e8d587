//! Treatment lifecycle state machine.
//!
//! ```text
//!            terminate(target)
//!   active ────────────────────► completed | abandoned | non-payment
//!     ▲                                     │
//!     └──────────── reactivate ◄────────────┘
//! ```
//!
//! There is no active→active or terminal→terminal edge. Every failed
//! transition leaves the record untouched.

use std::ops::Range;

use chrono::NaiveDate;
use thiserror::Error;

use super::{generate_schedule, generate_schedule_from, ScheduleRule};
use crate::models::{format_date, parse_date, Dose, Patient, PatientRecord, Termination, TreatmentStatus};

/// Lifecycle errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Cannot {action} a treatment that is {from}")]
    InvalidTransition {
        from: TreatmentStatus,
        action: &'static str,
    },

    #[error("Termination target must be a non-active status, got {0}")]
    InvalidTarget(TreatmentStatus),

    #[error("A termination reason is required")]
    MissingReason,

    #[error("Invalid first dose date: {0}")]
    InvalidDate(String),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Outcome of a reactivation.
#[derive(Debug, Clone, PartialEq)]
pub struct Reactivation {
    /// Pending doses removed from the record
    pub discarded: Vec<Dose>,
    /// Index range of the freshly generated doses in `record.doses`
    pub scheduled: Range<usize>,
}

/// Build the initial record for an enrolled patient, scheduling from
/// `first_dose_date`.
pub fn start_treatment(patient: Patient, rule: &ScheduleRule) -> LifecycleResult<PatientRecord> {
    let first = parse_date(&patient.first_dose_date)
        .ok_or_else(|| LifecycleError::InvalidDate(patient.first_dose_date.clone()))?;
    let doses = if patient.treatment_status.is_active() {
        generate_schedule(first, rule.dose_count, rule.cadence_days)
    } else {
        Vec::new()
    };
    Ok(PatientRecord::new(patient, doses))
}

/// Close an active treatment.
pub fn terminate(
    patient: &mut Patient,
    reason: &str,
    target: TreatmentStatus,
    date: NaiveDate,
) -> LifecycleResult<()> {
    if !patient.treatment_status.is_active() {
        return Err(LifecycleError::InvalidTransition {
            from: patient.treatment_status,
            action: "terminate",
        });
    }
    if target.is_active() {
        return Err(LifecycleError::InvalidTarget(target));
    }
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LifecycleError::MissingReason);
    }

    patient.treatment_status = target;
    patient.termination = Some(Termination {
        date: format_date(date),
        reason: reason.to_string(),
    });
    patient.touch();
    Ok(())
}

/// Return a terminated treatment to active.
///
/// Administered doses are kept as they are. All pending doses are dropped and
/// a new schedule anchored at `anchor` is appended, numbered after the highest
/// kept dose.
pub fn reactivate(
    record: &mut PatientRecord,
    anchor: NaiveDate,
    rule: &ScheduleRule,
) -> LifecycleResult<Reactivation> {
    if record.patient.treatment_status.is_active() {
        return Err(LifecycleError::InvalidTransition {
            from: record.patient.treatment_status,
            action: "reactivate",
        });
    }

    let (kept, discarded): (Vec<Dose>, Vec<Dose>) =
        record.doses.drain(..).partition(|d| d.is_administered());
    record.doses = kept;

    let next_number = record
        .doses
        .iter()
        .map(|d| d.dose_number)
        .max()
        .unwrap_or(0)
        + 1;
    let start = record.doses.len();
    record.doses.extend(generate_schedule_from(
        next_number,
        anchor,
        rule.dose_count,
        rule.cadence_days,
    ));

    record.patient.treatment_status = TreatmentStatus::Active;
    record.patient.termination = None;
    record.patient.touch();

    Ok(Reactivation {
        discarded,
        scheduled: start..record.doses.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DoseState;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn make_record() -> PatientRecord {
        let patient = Patient::new("Ana".into(), 165.0, 82.0, "2024-01-01".into());
        start_treatment(patient, &ScheduleRule { dose_count: 5, cadence_days: 7 }).unwrap()
    }

    #[test]
    fn test_start_treatment_generates_schedule() {
        let record = make_record();
        assert_eq!(record.doses.len(), 5);
        assert_eq!(record.doses[0].date, "2024-01-01");
        assert_eq!(record.doses[4].date, "2024-01-29");
    }

    #[test]
    fn test_start_treatment_bad_date() {
        let patient = Patient::new("Ana".into(), 165.0, 82.0, "01/01/2024".into());
        let err = start_treatment(patient, &ScheduleRule::default()).unwrap_err();
        assert_eq!(err, LifecycleError::InvalidDate("01/01/2024".into()));
    }

    #[test]
    fn test_terminate_sets_fields() {
        let mut record = make_record();
        terminate(&mut record.patient, " moved away ", TreatmentStatus::Abandoned, day(2024, 2, 1)).unwrap();

        assert_eq!(record.patient.treatment_status, TreatmentStatus::Abandoned);
        let termination = record.patient.termination.clone().unwrap();
        assert_eq!(termination.date, "2024-02-01");
        assert_eq!(termination.reason, "moved away");
        assert!(record.patient.is_consistent());
    }

    #[test]
    fn test_terminate_twice_fails_without_overwriting() {
        let mut record = make_record();
        terminate(&mut record.patient, "goal reached", TreatmentStatus::Completed, day(2024, 2, 1)).unwrap();

        let err = terminate(&mut record.patient, "no payment", TreatmentStatus::NonPayment, day(2024, 3, 1))
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                from: TreatmentStatus::Completed,
                action: "terminate",
            }
        );
        assert_eq!(record.patient.treatment_status, TreatmentStatus::Completed);
        assert_eq!(record.patient.termination.as_ref().unwrap().reason, "goal reached");
    }

    #[test]
    fn test_terminate_to_active_rejected() {
        let mut record = make_record();
        let err = terminate(&mut record.patient, "x", TreatmentStatus::Active, day(2024, 2, 1)).unwrap_err();
        assert_eq!(err, LifecycleError::InvalidTarget(TreatmentStatus::Active));
        assert!(record.patient.termination.is_none());
    }

    #[test]
    fn test_terminate_requires_reason() {
        let mut record = make_record();
        let err = terminate(&mut record.patient, "   ", TreatmentStatus::Abandoned, day(2024, 2, 1)).unwrap_err();
        assert_eq!(err, LifecycleError::MissingReason);
        assert!(record.patient.treatment_status.is_active());
    }

    #[test]
    fn test_reactivate_active_fails() {
        let mut record = make_record();
        let before = record.clone();
        let err = reactivate(&mut record, day(2024, 3, 1), &ScheduleRule::default()).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { action: "reactivate", .. }));
        assert_eq!(record, before);
    }

    #[test]
    fn test_reactivate_keeps_administered_and_regenerates_tail() {
        let mut record = make_record();
        for dose in record.doses.iter_mut().take(3) {
            dose.status = DoseState::Administered;
            dose.weight_kg = Some(80.0);
        }
        let administered: Vec<Dose> = record.doses[..3].to_vec();

        terminate(&mut record.patient, "travel", TreatmentStatus::Abandoned, day(2024, 1, 20)).unwrap();
        let outcome = reactivate(
            &mut record,
            day(2024, 3, 4),
            &ScheduleRule { dose_count: 2, cadence_days: 7 },
        )
        .unwrap();

        assert_eq!(outcome.discarded.len(), 2);
        assert_eq!(outcome.scheduled, 3..5);
        assert_eq!(&record.doses[..3], administered.as_slice());

        let fresh = &record.doses[3..];
        assert_eq!(fresh[0].dose_number, 4);
        assert_eq!(fresh[0].date, "2024-03-04");
        assert_eq!(fresh[1].dose_number, 5);
        assert_eq!(fresh[1].date, "2024-03-11");
        assert!(fresh.iter().all(|d| d.is_pending()));

        assert_eq!(record.patient.treatment_status, TreatmentStatus::Active);
        assert!(record.patient.termination.is_none());
    }
}
