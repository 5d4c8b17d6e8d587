//! Bioimpedance evolution models.

use serde::{Deserialize, Serialize};

/// Body-composition metrics from a bioimpedance scale. Every field is optional
/// because scale reports vary by device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Bioimpedance {
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub fat_percentage: Option<f64>,
    pub muscle_percentage: Option<f64>,
    pub water_percentage: Option<f64>,
    pub visceral_fat: Option<f64>,
    /// Basal metabolic rate in kcal
    pub basal_metabolism_kcal: Option<f64>,
    pub metabolic_age: Option<f64>,
    pub bone_mass_kg: Option<f64>,
    pub protein_percentage: Option<f64>,
}

impl Bioimpedance {
    /// True when no metric was captured.
    pub fn is_empty(&self) -> bool {
        *self == Bioimpedance::default()
    }
}

/// A dated bioimpedance snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evolution {
    pub evolution_id: String,
    pub patient_id: String,
    /// Measurement date (YYYY-MM-DD)
    pub date: String,
    pub metrics: Bioimpedance,
    pub notes: Option<String>,
    pub created_at: String,
}

impl Evolution {
    pub fn new(patient_id: String, date: String, metrics: Bioimpedance) -> Self {
        Self {
            evolution_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            date,
            metrics,
            notes: None,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
