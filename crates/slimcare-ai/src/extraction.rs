//! Structured output extraction from model responses.

use serde::de::DeserializeOwned;
use thiserror::Error;

/// AI flow errors.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Inference provider error: {0}")]
    Provider(String),
}

pub type AiResult<T> = Result<T, AiError>;

/// Slice out the outermost JSON object, skipping any prose the model wrapped
/// around it (including markdown fences).
pub fn extract_json_object(response: &str) -> AiResult<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| AiError::InvalidFormat("No JSON object found in response".into()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| AiError::InvalidFormat("No closing brace found in response".into()))?;
    if end < start {
        return Err(AiError::InvalidFormat("Closing brace precedes opening brace".into()));
    }
    Ok(&response[start..=end])
}

/// Extract and deserialize the JSON object in a response.
pub fn parse_response<T: DeserializeOwned>(response: &str) -> AiResult<T> {
    let json = extract_json_object(response)?;
    Ok(serde_json::from_str(json)?)
}

/// Fail with `InvalidFormat` if a required text field is blank.
pub(crate) fn require_text(field: &str, value: &str) -> AiResult<()> {
    if value.trim().is_empty() {
        return Err(AiError::InvalidFormat(format!("Missing required field: {}", field)));
    }
    Ok(())
}
