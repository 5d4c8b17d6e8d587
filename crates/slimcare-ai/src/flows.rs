//! Typed AI flows: each builds a prompt, makes one provider call and
//! validates the structured answer.

use serde::{Deserialize, Serialize};

use crate::extraction::{parse_response, require_text, AiError, AiResult};
use crate::prompts;
use crate::provider::{InferenceProvider, InferenceRequest};

// =========================================================================
// Bioimpedance photo analysis
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BioimpedanceRequest {
    /// Photo of the report as a `data:image/...;base64,` URI
    pub photo_data_uri: String,
}

/// Values read from a bioimpedance report. Anything illegible stays `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BioimpedanceReading {
    pub weight_kg: Option<f64>,
    pub bmi: Option<f64>,
    pub fat_percentage: Option<f64>,
    pub muscle_percentage: Option<f64>,
    pub water_percentage: Option<f64>,
    pub visceral_fat: Option<f64>,
    pub basal_metabolism_kcal: Option<f64>,
    pub metabolic_age: Option<f64>,
    pub bone_mass_kg: Option<f64>,
    pub protein_percentage: Option<f64>,
}

impl BioimpedanceReading {
    fn values(&self) -> [(&'static str, Option<f64>); 10] {
        [
            ("weight_kg", self.weight_kg),
            ("bmi", self.bmi),
            ("fat_percentage", self.fat_percentage),
            ("muscle_percentage", self.muscle_percentage),
            ("water_percentage", self.water_percentage),
            ("visceral_fat", self.visceral_fat),
            ("basal_metabolism_kcal", self.basal_metabolism_kcal),
            ("metabolic_age", self.metabolic_age),
            ("bone_mass_kg", self.bone_mass_kg),
            ("protein_percentage", self.protein_percentage),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|(_, v)| v.is_none())
    }

    fn validate(&self) -> AiResult<()> {
        if self.is_empty() {
            return Err(AiError::InvalidFormat("No legible metrics in the report".into()));
        }
        for (field, value) in self.values() {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AiError::InvalidFormat(format!("{} out of range: {}", field, v)));
                }
            }
        }
        for (field, value) in [
            ("fat_percentage", self.fat_percentage),
            ("muscle_percentage", self.muscle_percentage),
            ("water_percentage", self.water_percentage),
            ("protein_percentage", self.protein_percentage),
        ] {
            if value.is_some_and(|v| v > 100.0) {
                return Err(AiError::InvalidFormat(format!("{} above 100%", field)));
            }
        }
        Ok(())
    }
}

/// Check that `uri` is a base64 image data URI.
pub fn validate_image_data_uri(uri: &str) -> AiResult<()> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| AiError::InvalidInput("Photo must be a data: URI".into()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| AiError::InvalidInput("Photo must be base64 encoded".into()))?;
    if !mime.starts_with("image/") {
        return Err(AiError::InvalidInput(format!("Unsupported media type: {}", mime)));
    }
    let is_base64 = payload
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='));
    if payload.is_empty() || !is_base64 {
        return Err(AiError::InvalidInput("Photo payload is not valid base64".into()));
    }
    Ok(())
}

/// Read bioimpedance metrics from a photo of the report.
pub fn analyze_bioimpedance<P: InferenceProvider>(
    provider: &P,
    request: &BioimpedanceRequest,
) -> AiResult<BioimpedanceReading> {
    validate_image_data_uri(&request.photo_data_uri)?;

    let inference = InferenceRequest {
        system: prompts::BIOIMPEDANCE_SYSTEM_PROMPT.to_string(),
        prompt: prompts::make_bioimpedance_prompt(),
        images: vec![request.photo_data_uri.clone()],
        json_output: true,
    };
    tracing::debug!(flow = "bioimpedance", "Requesting inference");
    let response = provider.generate(&inference)?;

    let reading: BioimpedanceReading = parse_response(&response)?;
    reading.validate()?;
    Ok(reading)
}

// =========================================================================
// Health data summary
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRequest {
    pub health_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSummary {
    pub summary: String,
}

/// Summarize patient health data for staff.
pub fn summarize_health_data<P: InferenceProvider>(
    provider: &P,
    request: &SummaryRequest,
) -> AiResult<HealthSummary> {
    if request.health_data.trim().is_empty() {
        return Err(AiError::InvalidInput("Health data is empty".into()));
    }

    let inference = InferenceRequest {
        system: prompts::SUMMARY_SYSTEM_PROMPT.to_string(),
        prompt: prompts::make_summary_prompt(&request.health_data),
        images: Vec::new(),
        json_output: true,
    };
    tracing::debug!(flow = "summary", "Requesting inference");
    let response = provider.generate(&inference)?;

    let summary: HealthSummary = parse_response(&response)?;
    require_text("summary", &summary.summary)?;
    Ok(summary)
}

// =========================================================================
// Dosage recommendation
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageRequest {
    pub patient_data: String,
    pub treatment_goals: String,
}

/// A suggestion for clinician review, never applied automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DosageRecommendation {
    pub recommendation: String,
    pub reasoning: String,
    /// Free-text warnings; empty when the model raised none
    #[serde(default, deserialize_with = "free_text")]
    pub warnings: String,
}

/// Accept free text, null, or a list of lines (joined one per line).
fn free_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        One(String),
        Lines(Vec<String>),
    }

    Ok(match Option::<Text>::deserialize(deserializer)? {
        Some(Text::One(text)) => text.trim().to_string(),
        Some(Text::Lines(lines)) => lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    })
}

/// Suggest a dose given patient data and treatment goals.
pub fn recommend_dosage<P: InferenceProvider>(
    provider: &P,
    request: &DosageRequest,
) -> AiResult<DosageRecommendation> {
    if request.patient_data.trim().is_empty() {
        return Err(AiError::InvalidInput("Patient data is empty".into()));
    }
    if request.treatment_goals.trim().is_empty() {
        return Err(AiError::InvalidInput("Treatment goals are empty".into()));
    }

    let inference = InferenceRequest {
        system: prompts::DOSAGE_SYSTEM_PROMPT.to_string(),
        prompt: prompts::make_dosage_prompt(&request.patient_data, &request.treatment_goals),
        images: Vec::new(),
        json_output: true,
    };
    tracing::debug!(flow = "dosage", "Requesting inference");
    let response = provider.generate(&inference)?;

    let recommendation: DosageRecommendation = parse_response(&response)?;
    require_text("recommendation", &recommendation.recommendation)?;
    require_text("reasoning", &recommendation.reasoning)?;
    if !recommendation.warnings.is_empty() {
        tracing::info!("Dosage recommendation carries warnings");
    }
    Ok(recommendation)
}
