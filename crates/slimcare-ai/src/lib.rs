//! AI-assisted data entry for SlimCare.
//!
//! Three flows sit behind the [`InferenceProvider`] trait: reading a
//! bioimpedance report from a photo, summarizing patient health data and
//! suggesting a dose. Each makes a single call and validates the JSON it gets
//! back. Enable the `http` feature for an Ollama-compatible provider.

pub mod extraction;
pub mod flows;
pub mod prompts;
pub mod provider;

#[cfg(feature = "http")]
pub mod http;

pub use extraction::{extract_json_object, parse_response, AiError, AiResult};
pub use flows::*;
pub use provider::{InferenceProvider, InferenceRequest, MockProvider};

#[cfg(feature = "http")]
pub use http::HttpProvider;
