//! Patient models.

use serde::{Deserialize, Serialize};

use super::{Dose, Evolution};

/// Lifecycle stage of a patient's treatment enrollment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TreatmentStatus {
    /// Receiving doses on the generated schedule
    Active,
    /// Finished the planned treatment
    Completed,
    /// Stopped attending
    Abandoned,
    /// Suspended for missing payments
    NonPayment,
}

impl TreatmentStatus {
    /// Stable string form used in storage and exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentStatus::Active => "active",
            TreatmentStatus::Completed => "completed",
            TreatmentStatus::Abandoned => "abandoned",
            TreatmentStatus::NonPayment => "non-payment",
        }
    }

    /// Parse the storage form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(TreatmentStatus::Active),
            "completed" => Some(TreatmentStatus::Completed),
            "abandoned" => Some(TreatmentStatus::Abandoned),
            "non-payment" => Some(TreatmentStatus::NonPayment),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TreatmentStatus::Active)
    }
}

impl std::fmt::Display for TreatmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why and when a treatment left the active state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Termination {
    /// Date the treatment was closed (YYYY-MM-DD)
    pub date: String,
    /// Free-text reason recorded by staff
    pub reason: String,
}

/// A patient enrollment record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Local UUID - always present, generated locally
    pub local_id: String,
    /// Full name
    pub full_name: String,
    /// Date of birth (YYYY-MM-DD)
    pub birth_date: Option<String>,
    /// Height in centimetres
    pub height_cm: f64,
    /// Weight at enrollment in kg
    pub initial_weight_kg: f64,
    /// Target weight in kg
    pub desired_weight_kg: Option<f64>,
    /// Anchor date of the first generated schedule (YYYY-MM-DD)
    pub first_dose_date: String,
    /// Default dose in mg, used to prefill administration
    pub default_dose_mg: Option<f64>,
    /// Accumulated reward points
    pub points: u32,
    /// Current lifecycle stage
    pub treatment_status: TreatmentStatus,
    /// Set iff `treatment_status` is not active
    pub termination: Option<Termination>,
    /// Contact phone
    pub phone: Option<String>,
    /// Additional notes
    pub notes: Option<String>,
    /// Optimistic concurrency counter, bumped on every stored update
    pub version: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new active patient with required fields.
    pub fn new(
        full_name: String,
        height_cm: f64,
        initial_weight_kg: f64,
        first_dose_date: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            local_id: uuid::Uuid::new_v4().to_string(),
            full_name,
            birth_date: None,
            height_cm,
            initial_weight_kg,
            desired_weight_kg: None,
            first_dose_date,
            default_dose_mg: None,
            points: 0,
            treatment_status: TreatmentStatus::Active,
            termination: None,
            phone: None,
            notes: None,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Height converted to metres.
    pub fn height_m(&self) -> f64 {
        self.height_cm / 100.0
    }

    /// Whether termination fields agree with the status.
    pub fn is_consistent(&self) -> bool {
        self.treatment_status.is_active() == self.termination.is_none()
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}

/// A patient together with the records it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientRecord {
    pub patient: Patient,
    /// Doses ordered by dose number
    pub doses: Vec<Dose>,
    /// Bioimpedance snapshots ordered by date
    pub evolutions: Vec<Evolution>,
}

impl PatientRecord {
    pub fn new(patient: Patient, doses: Vec<Dose>) -> Self {
        Self {
            patient,
            doses,
            evolutions: Vec::new(),
        }
    }

    /// Most recent weight: last administered dose, then last evolution, then enrollment.
    pub fn current_weight_kg(&self) -> f64 {
        let from_dose = self
            .doses
            .iter()
            .rev()
            .filter(|d| d.is_administered())
            .find_map(|d| d.weight_kg);
        let from_evolution = self.evolutions.iter().rev().find_map(|e| e.metrics.weight_kg);

        from_dose
            .or(from_evolution)
            .unwrap_or(self.patient.initial_weight_kg)
    }

    pub fn administered_count(&self) -> usize {
        self.doses.iter().filter(|d| d.is_administered()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DoseState;

    #[test]
    fn test_new_patient() {
        let patient = Patient::new("Ana Souza".into(), 165.0, 82.0, "2024-01-10".into());
        assert_eq!(patient.full_name, "Ana Souza");
        assert_eq!(patient.treatment_status, TreatmentStatus::Active);
        assert!(patient.termination.is_none());
        assert!(patient.is_consistent());
        assert_eq!(patient.local_id.len(), 36); // UUID format
    }

    #[test]
    fn test_status_strings() {
        for status in [
            TreatmentStatus::Active,
            TreatmentStatus::Completed,
            TreatmentStatus::Abandoned,
            TreatmentStatus::NonPayment,
        ] {
            assert_eq!(TreatmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TreatmentStatus::parse("paused"), None);
    }

    #[test]
    fn test_inconsistent_termination() {
        let mut patient = Patient::new("Ana".into(), 165.0, 82.0, "2024-01-10".into());
        patient.treatment_status = TreatmentStatus::Completed;
        assert!(!patient.is_consistent());
    }

    #[test]
    fn test_current_weight_prefers_latest_administration() {
        let patient = Patient::new("Ana".into(), 165.0, 82.0, "2024-01-10".into());
        let mut doses = vec![
            Dose::pending(1, "2024-01-10".into()),
            Dose::pending(2, "2024-01-17".into()),
        ];
        assert_eq!(PatientRecord::new(patient.clone(), doses.clone()).current_weight_kg(), 82.0);

        doses[0].status = DoseState::Administered;
        doses[0].weight_kg = Some(80.5);
        let record = PatientRecord::new(patient, doses);
        assert_eq!(record.current_weight_kg(), 80.5);
        assert_eq!(record.administered_count(), 1);
    }
}
