//! Dose database operations.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{Database, DbError, DbResult};
use crate::models::{Dose, DoseState, Patient};

/// Values stamped on a dose when it is administered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdministrationStamp {
    pub administered_mg: Option<f64>,
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub time: Option<String>,
}

/// A dose together with the patient it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientDose {
    pub patient_id: String,
    pub patient_name: String,
    pub dose: Dose,
}

const DOSE_COLUMNS: &str =
    "dose_id, dose_number, date, time, status, administered_mg, weight_kg, bmi";

impl Database {
    /// Insert doses for a patient, assigning IDs to any that lack one.
    pub fn insert_doses(&self, patient_id: &str, doses: &mut [Dose]) -> DbResult<()> {
        let tx = self.begin()?;
        insert_doses_on(&tx, patient_id, doses)?;
        tx.commit()?;
        Ok(())
    }

    /// Insert a new patient and its initial schedule in one transaction.
    pub fn insert_patient_with_doses(&self, patient: &Patient, doses: &mut [Dose]) -> DbResult<()> {
        let tx = self.begin()?;
        self.insert_patient(patient)?;
        insert_doses_on(&tx, &patient.local_id, doses)?;
        tx.commit()?;
        Ok(())
    }

    /// All doses of a patient ordered by dose number.
    pub fn list_doses(&self, patient_id: &str) -> DbResult<Vec<Dose>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM doses WHERE patient_id = ? ORDER BY dose_number",
            DOSE_COLUMNS
        ))?;
        let rows = stmt.query_map([patient_id], dose_row)?;

        let mut doses = Vec::new();
        for row in rows {
            doses.push(row?.try_into()?);
        }
        Ok(doses)
    }

    /// Get a dose belonging to a patient.
    pub fn get_dose(&self, patient_id: &str, dose_id: &str) -> DbResult<Option<Dose>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM doses WHERE patient_id = ?1 AND dose_id = ?2",
                    DOSE_COLUMNS
                ),
                [patient_id, dose_id],
                dose_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Mark a pending dose administered and stamp the clinical values.
    pub fn mark_dose_administered(&self, dose_id: &str, stamp: &AdministrationStamp) -> DbResult<()> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE doses SET
                status = 'administered',
                administered_mg = ?2,
                weight_kg = ?3,
                bmi = ?4,
                time = COALESCE(?5, time),
                administered_at = datetime('now')
            WHERE dose_id = ?1 AND status = 'pending'
            "#,
            params![
                dose_id,
                stamp.administered_mg,
                stamp.weight_kg,
                stamp.bmi,
                stamp.time,
            ],
        )?;

        if rows_affected == 0 {
            let status: Option<String> = self
                .conn
                .query_row("SELECT status FROM doses WHERE dose_id = ?", [dose_id], |row| {
                    row.get(0)
                })
                .optional()?;
            return Err(match status {
                Some(_) => DbError::Constraint(format!("Dose {} is already administered", dose_id)),
                None => DbError::NotFound(dose_id.to_string()),
            });
        }
        Ok(())
    }

    /// Delete every pending dose of a patient and insert `doses` in their place,
    /// atomically. Administered doses are not touched. Returns the number deleted.
    pub fn replace_pending_doses(&self, patient_id: &str, doses: &mut [Dose]) -> DbResult<usize> {
        let tx = self.begin()?;
        let deleted = replace_pending_on(&tx, patient_id, doses)?;
        tx.commit()?;
        Ok(deleted)
    }

    /// Persist a reactivated patient together with its new pending doses in
    /// one transaction. A stale patient version rolls back both writes.
    pub fn save_reactivation(&self, patient: &mut Patient, doses: &mut [Dose]) -> DbResult<usize> {
        let tx = self.begin()?;
        let version = patient.version;
        let result = self
            .update_patient(patient)
            .and_then(|()| replace_pending_on(&tx, &patient.local_id, doses));
        match result {
            Ok(deleted) => {
                tx.commit()?;
                Ok(deleted)
            }
            Err(e) => {
                patient.version = version;
                Err(e)
            }
        }
    }

    /// Pending doses of active patients, ordered by date.
    pub fn list_pending_doses_for_active_patients(&self) -> DbResult<Vec<PatientDose>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT d.dose_id, d.dose_number, d.date, d.time, d.status,
                   d.administered_mg, d.weight_kg, d.bmi,
                   p.local_id, p.full_name
            FROM doses d
            JOIN patients p ON p.local_id = d.patient_id
            WHERE d.status = 'pending' AND p.treatment_status = 'active'
            ORDER BY d.date, p.full_name
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((dose_row(row)?, row.get::<_, String>(8)?, row.get::<_, String>(9)?))
        })?;

        let mut doses = Vec::new();
        for row in rows {
            let (dose_row, patient_id, patient_name) = row?;
            doses.push(PatientDose {
                patient_id,
                patient_name,
                dose: dose_row.try_into()?,
            });
        }
        Ok(doses)
    }
}

fn replace_pending_on(conn: &Connection, patient_id: &str, doses: &mut [Dose]) -> DbResult<usize> {
    let deleted = conn.execute(
        "DELETE FROM doses WHERE patient_id = ? AND status = 'pending'",
        [patient_id],
    )?;
    insert_doses_on(conn, patient_id, doses)?;
    Ok(deleted)
}

fn insert_doses_on(conn: &Connection, patient_id: &str, doses: &mut [Dose]) -> DbResult<()> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO doses (
            dose_id, patient_id, dose_number, date, time, status,
            administered_mg, weight_kg, bmi
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )?;

    for dose in doses.iter_mut() {
        let dose_id = dose
            .dose_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        stmt.execute(params![
            dose_id,
            patient_id,
            dose.dose_number,
            dose.date,
            dose.time,
            dose.status.as_str(),
            dose.administered_mg,
            dose.weight_kg,
            dose.bmi,
        ])?;
    }
    Ok(())
}

/// Intermediate row struct for database mapping.
struct DoseRow {
    dose_id: String,
    dose_number: u32,
    date: String,
    time: Option<String>,
    status: String,
    administered_mg: Option<f64>,
    weight_kg: Option<f64>,
    bmi: Option<f64>,
}

fn dose_row(row: &Row<'_>) -> rusqlite::Result<DoseRow> {
    Ok(DoseRow {
        dose_id: row.get(0)?,
        dose_number: row.get(1)?,
        date: row.get(2)?,
        time: row.get(3)?,
        status: row.get(4)?,
        administered_mg: row.get(5)?,
        weight_kg: row.get(6)?,
        bmi: row.get(7)?,
    })
}

impl TryFrom<DoseRow> for Dose {
    type Error = DbError;

    fn try_from(row: DoseRow) -> Result<Self, Self::Error> {
        let status = DoseState::parse(&row.status)
            .ok_or_else(|| DbError::Constraint(format!("Unknown dose status: {}", row.status)))?;
        Ok(Dose {
            dose_id: Some(row.dose_id),
            dose_number: row.dose_number,
            date: row.date,
            time: row.time,
            status,
            administered_mg: row.administered_mg,
            weight_kg: row.weight_kg,
            bmi: row.bmi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TreatmentStatus, Termination};
    use crate::schedule::generate_schedule;
    use chrono::NaiveDate;

    fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana".into(), 165.0, 82.0, "2024-01-10".into());
        db.insert_patient(&patient).unwrap();
        (db, patient.local_id)
    }

    fn schedule(count: u32) -> Vec<Dose> {
        generate_schedule(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), count, 7)
    }

    #[test]
    fn test_insert_assigns_ids() {
        let (db, patient_id) = setup_db();
        let mut doses = schedule(3);
        db.insert_doses(&patient_id, &mut doses).unwrap();

        assert!(doses.iter().all(|d| d.dose_id.is_some()));
        let stored = db.list_doses(&patient_id).unwrap();
        assert_eq!(stored, doses);
    }

    #[test]
    fn test_mark_administered() {
        let (db, patient_id) = setup_db();
        let mut doses = schedule(2);
        db.insert_doses(&patient_id, &mut doses).unwrap();
        let dose_id = doses[0].dose_id.clone().unwrap();

        let stamp = AdministrationStamp {
            administered_mg: Some(2.5),
            weight_kg: Some(81.2),
            bmi: Some(29.83),
            time: Some("09:30".into()),
        };
        db.mark_dose_administered(&dose_id, &stamp).unwrap();

        let stored = db.get_dose(&patient_id, &dose_id).unwrap().unwrap();
        assert!(stored.is_administered());
        assert_eq!(stored.administered_mg, Some(2.5));
        assert_eq!(stored.time, Some("09:30".into()));

        // A second administration is rejected
        let err = db.mark_dose_administered(&dose_id, &stamp).unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
        assert!(matches!(
            db.mark_dose_administered("missing", &stamp),
            Err(DbError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_dose_scoped_to_patient() {
        let (db, patient_id) = setup_db();
        let mut doses = schedule(1);
        db.insert_doses(&patient_id, &mut doses).unwrap();
        let dose_id = doses[0].dose_id.clone().unwrap();

        assert!(db.get_dose("other-patient", &dose_id).unwrap().is_none());
    }

    #[test]
    fn test_replace_pending_keeps_administered() {
        let (db, patient_id) = setup_db();
        let mut doses = schedule(4);
        db.insert_doses(&patient_id, &mut doses).unwrap();
        db.mark_dose_administered(doses[0].dose_id.as_deref().unwrap(), &AdministrationStamp::default())
            .unwrap();

        let mut fresh = crate::schedule::generate_schedule_from(
            2,
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            2,
            7,
        );
        let deleted = db.replace_pending_doses(&patient_id, &mut fresh).unwrap();
        assert_eq!(deleted, 3);

        let stored = db.list_doses(&patient_id).unwrap();
        assert_eq!(stored.len(), 3);
        assert!(stored[0].is_administered());
        assert_eq!(stored[1].date, "2024-05-01");
        assert_eq!(stored[2].date, "2024-05-08");
    }

    #[test]
    fn test_pending_for_active_patients_only() {
        let (db, patient_id) = setup_db();
        let mut doses = schedule(2);
        db.insert_doses(&patient_id, &mut doses).unwrap();

        let mut inactive = Patient::new("Bia".into(), 160.0, 75.0, "2024-01-10".into());
        inactive.treatment_status = TreatmentStatus::Abandoned;
        inactive.termination = Some(Termination {
            date: "2024-01-05".into(),
            reason: "Moved".into(),
        });
        db.insert_patient(&inactive).unwrap();
        let mut other = schedule(2);
        db.insert_doses(&inactive.local_id, &mut other).unwrap();

        let pending = db.list_pending_doses_for_active_patients().unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|p| p.patient_id == patient_id && p.patient_name == "Ana"));
    }

    #[test]
    fn test_save_reactivation_rolls_back_on_stale_version() {
        let (db, patient_id) = setup_db();
        let mut doses = schedule(2);
        db.insert_doses(&patient_id, &mut doses).unwrap();

        let mut stale = db.get_patient(&patient_id).unwrap().unwrap();
        let mut fresh = stale.clone();
        db.update_patient(&mut fresh).unwrap();

        let mut replacement = schedule(4);
        let err = db.save_reactivation(&mut stale, &mut replacement).unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));
        assert_eq!(stale.version, 0);
        assert_eq!(db.list_doses(&patient_id).unwrap(), doses);
    }
}
