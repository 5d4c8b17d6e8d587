//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{Patient, Termination, TreatmentStatus};

/// Minimum Jaro-Winkler similarity for a fuzzy name match.
const FUZZY_NAME_THRESHOLD: f64 = 0.88;

const PATIENT_COLUMNS: &str = r#"
    local_id, full_name, birth_date, height_cm, initial_weight_kg,
    desired_weight_kg, first_dose_date, default_dose_mg, points,
    treatment_status, termination_date, termination_reason, phone, notes,
    version, created_at, updated_at
"#;

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        let (termination_date, termination_reason) = termination_columns(patient);
        self.conn.execute(
            r#"
            INSERT INTO patients (
                local_id, full_name, birth_date, height_cm, initial_weight_kg,
                desired_weight_kg, first_dose_date, default_dose_mg, points,
                treatment_status, termination_date, termination_reason, phone, notes,
                version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                patient.local_id,
                patient.full_name,
                patient.birth_date,
                patient.height_cm,
                patient.initial_weight_kg,
                patient.desired_weight_kg,
                patient.first_dose_date,
                patient.default_dose_mg,
                patient.points,
                patient.treatment_status.as_str(),
                termination_date,
                termination_reason,
                patient.phone,
                patient.notes,
                patient.version,
                patient.created_at,
                patient.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient if its stored version still matches.
    ///
    /// On success the patient's `version` is bumped. Points are not written
    /// here; they only move through [`Database::add_points`].
    pub fn update_patient(&self, patient: &mut Patient) -> DbResult<()> {
        let (termination_date, termination_reason) = termination_columns(patient);
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                full_name = ?3,
                birth_date = ?4,
                height_cm = ?5,
                initial_weight_kg = ?6,
                desired_weight_kg = ?7,
                first_dose_date = ?8,
                default_dose_mg = ?9,
                treatment_status = ?10,
                termination_date = ?11,
                termination_reason = ?12,
                phone = ?13,
                notes = ?14,
                version = version + 1,
                updated_at = datetime('now')
            WHERE local_id = ?1 AND version = ?2
            "#,
            params![
                patient.local_id,
                patient.version,
                patient.full_name,
                patient.birth_date,
                patient.height_cm,
                patient.initial_weight_kg,
                patient.desired_weight_kg,
                patient.first_dose_date,
                patient.default_dose_mg,
                patient.treatment_status.as_str(),
                termination_date,
                termination_reason,
                patient.phone,
                patient.notes,
            ],
        )?;

        if rows_affected == 0 {
            return Err(if self.patient_exists(&patient.local_id)? {
                DbError::Conflict {
                    id: patient.local_id.clone(),
                    expected: patient.version,
                }
            } else {
                DbError::NotFound(patient.local_id.clone())
            });
        }

        patient.version += 1;
        Ok(())
    }

    /// Add (or with a negative delta, remove) reward points. Returns the new balance.
    pub fn add_points(&self, local_id: &str, delta: i64) -> DbResult<u32> {
        let result = self.conn.execute(
            "UPDATE patients SET points = points + ?2, updated_at = datetime('now') WHERE local_id = ?1",
            params![local_id, delta],
        );
        match result {
            Ok(0) => Err(DbError::NotFound(local_id.to_string())),
            Ok(_) => {
                let points: u32 = self.conn.query_row(
                    "SELECT points FROM patients WHERE local_id = ?",
                    [local_id],
                    |row| row.get(0),
                )?;
                Ok(points)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::Constraint(format!(
                    "Points balance of {} cannot go negative",
                    local_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a patient by local ID.
    pub fn get_patient(&self, local_id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE local_id = ?", PATIENT_COLUMNS),
                [local_id],
                patient_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List all patients.
    pub fn list_patients(&self) -> DbResult<Vec<Patient>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM patients ORDER BY full_name", PATIENT_COLUMNS))?;
        let rows = stmt.query_map([], patient_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// List patients in a given treatment status.
    pub fn list_patients_by_status(&self, status: TreatmentStatus) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE treatment_status = ? ORDER BY full_name",
            PATIENT_COLUMNS
        ))?;
        let rows = stmt.query_map([status.as_str()], patient_row)?;

        let mut patients = Vec::new();
        for row in rows {
            patients.push(row?.try_into()?);
        }
        Ok(patients)
    }

    /// Search patients by name: substring matches first, then close misspellings.
    pub fn search_patients(&self, query: &str, limit: usize) -> DbResult<Vec<Patient>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(f64, Patient)> = self
            .list_patients()?
            .into_iter()
            .filter_map(|patient| {
                let score = name_score(&needle, &patient.full_name.to_lowercase());
                (score >= FUZZY_NAME_THRESHOLD).then_some((score, patient))
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.full_name.cmp(&b.1.full_name))
        });
        Ok(scored.into_iter().take(limit).map(|(_, p)| p).collect())
    }

    /// Delete a patient and, by cascade, its doses and evolutions.
    pub fn delete_patient(&self, local_id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM patients WHERE local_id = ?", [local_id])?;
        Ok(rows_affected > 0)
    }

    /// Map an authenticated user to a patient for portal access.
    pub fn link_portal_user(&self, user_id: &str, patient_id: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO portal_links (user_id, patient_id) VALUES (?1, ?2)
            ON CONFLICT(user_id) DO UPDATE SET patient_id = excluded.patient_id
            "#,
            [user_id, patient_id],
        )?;
        Ok(())
    }

    /// Patient linked to an authenticated user, if any.
    pub fn get_portal_patient_id(&self, user_id: &str) -> DbResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT patient_id FROM portal_links WHERE user_id = ?",
                [user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn patient_exists(&self, local_id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM patients WHERE local_id = ?",
            [local_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Substring hits score 1.0; otherwise the best Jaro-Winkler similarity
/// against the full name or any of its words.
fn name_score(needle: &str, name: &str) -> f64 {
    if name.contains(needle) {
        return 1.0;
    }
    std::iter::once(name)
        .chain(name.split_whitespace())
        .map(|candidate| strsim::jaro_winkler(needle, candidate))
        .fold(0.0, f64::max)
}

fn termination_columns(patient: &Patient) -> (Option<&str>, Option<&str>) {
    match &patient.termination {
        Some(t) => (Some(t.date.as_str()), Some(t.reason.as_str())),
        None => (None, None),
    }
}

/// Intermediate row struct for database mapping.
struct PatientRow {
    local_id: String,
    full_name: String,
    birth_date: Option<String>,
    height_cm: f64,
    initial_weight_kg: f64,
    desired_weight_kg: Option<f64>,
    first_dose_date: String,
    default_dose_mg: Option<f64>,
    points: u32,
    treatment_status: String,
    termination_date: Option<String>,
    termination_reason: Option<String>,
    phone: Option<String>,
    notes: Option<String>,
    version: i64,
    created_at: String,
    updated_at: String,
}

fn patient_row(row: &Row<'_>) -> rusqlite::Result<PatientRow> {
    Ok(PatientRow {
        local_id: row.get(0)?,
        full_name: row.get(1)?,
        birth_date: row.get(2)?,
        height_cm: row.get(3)?,
        initial_weight_kg: row.get(4)?,
        desired_weight_kg: row.get(5)?,
        first_dose_date: row.get(6)?,
        default_dose_mg: row.get(7)?,
        points: row.get(8)?,
        treatment_status: row.get(9)?,
        termination_date: row.get(10)?,
        termination_reason: row.get(11)?,
        phone: row.get(12)?,
        notes: row.get(13)?,
        version: row.get(14)?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

impl TryFrom<PatientRow> for Patient {
    type Error = DbError;

    fn try_from(row: PatientRow) -> Result<Self, Self::Error> {
        let treatment_status = TreatmentStatus::parse(&row.treatment_status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown treatment status: {}", row.treatment_status))
        })?;
        let termination = match (row.termination_date, row.termination_reason) {
            (Some(date), Some(reason)) => Some(Termination { date, reason }),
            (None, None) => None,
            _ => {
                return Err(DbError::Constraint(format!(
                    "Partial termination record for patient {}",
                    row.local_id
                )))
            }
        };

        Ok(Patient {
            local_id: row.local_id,
            full_name: row.full_name,
            birth_date: row.birth_date,
            height_cm: row.height_cm,
            initial_weight_kg: row.initial_weight_kg,
            desired_weight_kg: row.desired_weight_kg,
            first_dose_date: row.first_dose_date,
            default_dose_mg: row.default_dose_mg,
            points: row.points,
            treatment_status,
            termination,
            phone: row.phone,
            notes: row.notes,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
