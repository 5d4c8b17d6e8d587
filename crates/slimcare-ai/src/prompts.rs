//! Prompts for the clinic's AI-assisted flows.
//!
//! Every prompt asks for a single JSON object so the response can be parsed
//! with [`crate::extraction::parse_response`].

/// System prompt for reading a bioimpedance scale printout from a photo.
pub const BIOIMPEDANCE_SYSTEM_PROMPT: &str = r#"You read bioimpedance reports from photos of scale printouts or screens.

Extract only values that are clearly legible. Never estimate or invent a value.
Use kilograms for masses, percentages as plain numbers (31.5, not 0.315) and kcal for basal metabolism.

Output a single JSON object and nothing else."#;

/// JSON shape expected from the bioimpedance flow.
pub const BIOIMPEDANCE_SCHEMA: &str = r#"{
  "weight_kg": number | null,
  "bmi": number | null,
  "fat_percentage": number | null,
  "muscle_percentage": number | null,
  "water_percentage": number | null,
  "visceral_fat": number | null,
  "basal_metabolism_kcal": number | null,
  "metabolic_age": number | null,
  "bone_mass_kg": number | null,
  "protein_percentage": number | null
}"#;

/// User prompt for the bioimpedance flow. The photo travels as an image.
pub fn make_bioimpedance_prompt() -> String {
    format!(
        "Read the bioimpedance report in the attached photo.\n\nReturn JSON with exactly these keys, using null for anything not shown:\n{}",
        BIOIMPEDANCE_SCHEMA
    )
}

/// System prompt for summarizing a patient's health data.
pub const SUMMARY_SYSTEM_PROMPT: &str = r#"You are an assistant for a weight-loss clinic.

Summarize patient health data for clinic staff in plain language: weight trend, body composition changes, adherence to the dose schedule and anything that needs attention.
Do not diagnose and do not recommend medication changes.

Output a single JSON object and nothing else."#;

/// User prompt for the summary flow.
pub fn make_summary_prompt(health_data: &str) -> String {
    format!(
        r#"Summarize the following patient health data:

"{}"

Return a JSON object: {{"summary": string}}"#,
        health_data.trim()
    )
}

/// System prompt for dosage suggestions.
pub const DOSAGE_SYSTEM_PROMPT: &str = r#"You support clinicians at a weight-loss clinic that administers weekly injections.

Given patient data and treatment goals, suggest a dose for the next application and explain the reasoning.
The suggestion is reviewed by a clinician before any use. List every risk or contraindication you notice as a warning.

Output a single JSON object and nothing else."#;

/// User prompt for the dosage flow.
pub fn make_dosage_prompt(patient_data: &str, treatment_goals: &str) -> String {
    format!(
        r#"Patient data:
"{}"

Treatment goals:
"{}"

Return a JSON object:
{{"recommendation": string, "reasoning": string, "warnings": string}}
Use an empty string for "warnings" when there is nothing to flag."#,
        patient_data.trim(),
        treatment_goals.trim()
    )
}
