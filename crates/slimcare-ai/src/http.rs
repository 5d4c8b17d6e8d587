//! Ollama-compatible HTTP inference provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extraction::{AiError, AiResult};
use crate::provider::{InferenceProvider, InferenceRequest};

/// Blocking client for a local `/api/generate` endpoint.
pub struct HttpProvider {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpProvider {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> AiResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AiError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        })
    }

    /// Local instance at localhost:11434 with a 2-minute timeout.
    pub fn default_local(model: &str) -> AiResult<Self> {
        Self::new("http://localhost:11434", model, 120)
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Base64 payload of a data URI; the endpoint takes bare base64.
fn data_uri_payload(uri: &str) -> &str {
    uri.split_once(";base64,").map(|(_, payload)| payload).unwrap_or(uri)
}

impl InferenceProvider for HttpProvider {
    fn generate(&self, request: &InferenceRequest) -> AiResult<String> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            system: &request.system,
            stream: false,
            images: request.images.iter().map(|i| data_uri_payload(i)).collect(),
            format: request.json_output.then_some("json"),
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                AiError::Provider(format!("Cannot connect to {}", self.base_url))
            } else if e.is_timeout() {
                AiError::Provider(format!("Request timed out after {}s", self.timeout_secs))
            } else {
                AiError::Provider(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Inference request failed");
            return Err(AiError::Provider(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| AiError::InvalidFormat(e.to_string()))?;
        Ok(parsed.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_payload() {
        assert_eq!(data_uri_payload("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(data_uri_payload("AAAA"), "AAAA");
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            model: "llava",
            prompt: "p",
            system: "s",
            stream: false,
            images: Vec::new(),
            format: Some("json"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["format"], "json");
        assert!(json.get("images").is_none());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider = HttpProvider::new("http://localhost:11434/", "llava", 5).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434");
    }
}
