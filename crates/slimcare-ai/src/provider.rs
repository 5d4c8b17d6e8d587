//! Inference provider seam.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::extraction::{AiError, AiResult};

/// One generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InferenceRequest {
    pub system: String,
    pub prompt: String,
    /// Images as `data:` URIs
    pub images: Vec<String>,
    /// Ask the backend to constrain output to JSON
    pub json_output: bool,
}

/// A model backend that turns a request into raw text.
pub trait InferenceProvider {
    fn generate(&self, request: &InferenceRequest) -> AiResult<String>;
}

impl<P: InferenceProvider + ?Sized> InferenceProvider for &P {
    fn generate(&self, request: &InferenceRequest) -> AiResult<String> {
        (**self).generate(request)
    }
}

/// Provider returning canned responses in order, recording every request.
#[derive(Debug, Default)]
pub struct MockProvider {
    responses: Mutex<VecDeque<AiResult<String>>>,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that answers once with `response`.
    pub fn with_response(response: &str) -> Self {
        let provider = Self::new();
        provider.push_response(response);
        provider
    }

    pub fn push_response(&self, response: &str) {
        self.lock_responses().push_back(Ok(response.to_string()));
    }

    /// Queue a provider failure.
    pub fn push_error(&self, message: &str) {
        self.lock_responses()
            .push_back(Err(AiError::Provider(message.to_string())));
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<InferenceRequest> {
        match self.requests.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<AiResult<String>>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl InferenceProvider for MockProvider {
    fn generate(&self, request: &InferenceRequest) -> AiResult<String> {
        match self.requests.lock() {
            Ok(mut guard) => guard.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        self.lock_responses()
            .pop_front()
            .unwrap_or_else(|| Err(AiError::Provider("No canned response left".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_answers_in_order() {
        let provider = MockProvider::with_response("first");
        provider.push_error("offline");

        let request = InferenceRequest {
            prompt: "hello".into(),
            ..Default::default()
        };
        assert_eq!(provider.generate(&request).unwrap(), "first");
        assert!(matches!(provider.generate(&request), Err(AiError::Provider(_))));
        assert!(matches!(provider.generate(&request), Err(AiError::Provider(_))));
        assert_eq!(provider.requests().len(), 3);
    }
}
