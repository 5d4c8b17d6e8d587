//! Form validation with explicit schemas.
//!
//! A [`FormSchema`] maps field names to a tagged [`FieldRule`]; input is the
//! JSON object submitted by a form. All field errors are collected so they can
//! be shown inline.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::parse_date;

/// Constraint for a single field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldRule {
    Text {
        required: bool,
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Number {
        required: bool,
        min: Option<f64>,
        max: Option<f64>,
    },
    Integer {
        required: bool,
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Calendar date in YYYY-MM-DD form
    Date { required: bool },
    Choice {
        required: bool,
        options: Vec<String>,
    },
}

impl FieldRule {
    fn required(&self) -> bool {
        match self {
            FieldRule::Text { required, .. }
            | FieldRule::Number { required, .. }
            | FieldRule::Integer { required, .. }
            | FieldRule::Date { required }
            | FieldRule::Choice { required, .. } => *required,
        }
    }

    /// Check a present, non-null value.
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            FieldRule::Text { min_len, max_len, .. } => {
                let s = value.as_str().ok_or("Must be text")?;
                let len = s.trim().chars().count();
                if let Some(min) = min_len {
                    if len < *min {
                        return Err(format!("Must have at least {} characters", min));
                    }
                }
                if let Some(max) = max_len {
                    if len > *max {
                        return Err(format!("Must have at most {} characters", max));
                    }
                }
                Ok(())
            }
            FieldRule::Number { min, max, .. } => {
                let n = value.as_f64().ok_or("Must be a number")?;
                if !n.is_finite() {
                    return Err("Must be a number".into());
                }
                if let Some(min) = min {
                    if n < *min {
                        return Err(format!("Must be at least {}", min));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(format!("Must be at most {}", max));
                    }
                }
                Ok(())
            }
            FieldRule::Integer { min, max, .. } => {
                let n = value.as_i64().ok_or("Must be a whole number")?;
                if let Some(min) = min {
                    if n < *min {
                        return Err(format!("Must be at least {}", min));
                    }
                }
                if let Some(max) = max {
                    if n > *max {
                        return Err(format!("Must be at most {}", max));
                    }
                }
                Ok(())
            }
            FieldRule::Date { .. } => {
                let s = value.as_str().ok_or("Must be a date")?;
                parse_date(s)
                    .map(|_| ())
                    .ok_or_else(|| "Must be a date in YYYY-MM-DD format".to_string())
            }
            FieldRule::Choice { options, .. } => {
                let s = value.as_str().ok_or("Must be one of the listed options")?;
                if options.iter().any(|o| o == s) {
                    Ok(())
                } else {
                    Err(format!("Must be one of: {}", options.join(", ")))
                }
            }
        }
    }
}

/// Per-field validation messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, String>,
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.fields.insert(field.to_string(), message.into());
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Ordered field → rule mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormSchema {
    pub fields: Vec<(String, FieldRule)>,
}

impl FormSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, rule: FieldRule) -> Self {
        self.fields.push((name.to_string(), rule));
        self
    }

    /// Validate a JSON object against every rule.
    pub fn validate(&self, input: &Value) -> Result<(), ValidationErrors> {
        let Some(object) = input.as_object() else {
            return Err(ValidationErrors::single("_form", "Expected an object"));
        };

        let mut errors = ValidationErrors::default();
        for (name, rule) in &self.fields {
            let value = object.get(name).filter(|v| !is_blank(v));
            match value {
                None if rule.required() => {
                    errors.fields.insert(name.clone(), "Required".into());
                }
                None => {}
                Some(value) => {
                    if let Err(message) = rule.check(value) {
                        errors.fields.insert(name.clone(), message);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn text(required: bool, min_len: Option<usize>, max_len: Option<usize>) -> FieldRule {
    FieldRule::Text { required, min_len, max_len }
}

fn number(required: bool, min: Option<f64>, max: Option<f64>) -> FieldRule {
    FieldRule::Number { required, min, max }
}

/// Built-in schemas for the clinic forms.
pub mod schemas {
    use super::*;

    /// New patient enrollment.
    pub fn patient_enrollment() -> FormSchema {
        FormSchema::new()
            .field("full_name", text(true, Some(3), Some(120)))
            .field("birth_date", FieldRule::Date { required: false })
            .field("height_cm", number(true, Some(50.0), Some(250.0)))
            .field("initial_weight_kg", number(true, Some(20.0), Some(400.0)))
            .field("desired_weight_kg", number(false, Some(20.0), Some(400.0)))
            .field("first_dose_date", FieldRule::Date { required: true })
            .field("default_dose_mg", number(false, Some(0.0), Some(90.0)))
            .field("phone", text(false, Some(8), Some(20)))
            .field("notes", text(false, None, Some(2000)))
    }

    /// Vial purchase.
    pub fn vial_purchase() -> FormSchema {
        FormSchema::new()
            .field("purchase_date", FieldRule::Date { required: true })
            .field(
                "total_mg",
                FieldRule::Integer {
                    required: true,
                    min: Some(40),
                    max: Some(90),
                },
            )
            .field("cost", number(true, Some(0.0), None))
    }

    /// Cash-flow entry.
    pub fn cash_flow_entry() -> FormSchema {
        FormSchema::new()
            .field(
                "kind",
                FieldRule::Choice {
                    required: true,
                    options: vec!["entrada".into(), "saida".into()],
                },
            )
            .field("description", text(true, Some(2), Some(200)))
            .field("amount", number(true, Some(0.01), None))
            .field("date", FieldRule::Date { required: true })
            .field("due_date", FieldRule::Date { required: false })
            .field(
                "payment_method",
                FieldRule::Choice {
                    required: false,
                    options: vec![
                        "pix".into(),
                        "dinheiro".into(),
                        "cartao".into(),
                        "transferencia".into(),
                    ],
                },
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_enrollment() {
        let form = json!({
            "full_name": "Maria Lima",
            "height_cm": 168,
            "initial_weight_kg": 91.5,
            "first_dose_date": "2024-01-10"
        });
        assert!(schemas::patient_enrollment().validate(&form).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let form = json!({
            "full_name": "Al",
            "height_cm": 0,
            "first_dose_date": "10/01/2024",
            "birth_date": ""
        });
        let errors = schemas::patient_enrollment().validate(&form).unwrap_err();
        assert_eq!(errors.get("full_name"), Some("Must have at least 3 characters"));
        assert_eq!(errors.get("height_cm"), Some("Must be at least 50"));
        assert_eq!(errors.get("initial_weight_kg"), Some("Required"));
        assert_eq!(errors.get("first_dose_date"), Some("Must be a date in YYYY-MM-DD format"));
        assert_eq!(errors.get("birth_date"), None);
    }

    #[test]
    fn test_choice_and_type_errors() {
        let form = json!({
            "kind": "transfer",
            "description": "Vial",
            "amount": "100",
            "date": "2024-01-10"
        });
        let errors = schemas::cash_flow_entry().validate(&form).unwrap_err();
        assert_eq!(errors.get("kind"), Some("Must be one of: entrada, saida"));
        assert_eq!(errors.get("amount"), Some("Must be a number"));
        assert_eq!(errors.fields.len(), 2);
    }

    #[test]
    fn test_non_object_input() {
        let errors = schemas::vial_purchase().validate(&json!([1, 2])).unwrap_err();
        assert!(errors.get("_form").is_some());
    }

    #[test]
    fn test_schema_serializes_tagged() {
        let rule = FieldRule::Date { required: true };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json, json!({"type": "date", "required": true}));
    }
}
