use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Non-2xx status from the model endpoint.
    Http,
    /// The body decoded but carried no usable text.
    EmptyResponse,
    /// The prompt or the candidate was blocked by the provider.
    Blocked,
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::EmptyResponse => "empty_response",
            Self::Blocked => "blocked",
        }
    }
}

/// Model failure with enough context to log or report the raw exchange.
/// Travels inside `anyhow::Error`; recover it with `downcast_ref`.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: FailureStage,
    pub detail: String,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    pub fn new(provider: Provider, stage: FailureStage, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_response_json: None,
        }
    }

    pub fn with_raw(mut self, raw: Option<Value>) -> Self {
        self.raw_response_json = raw;
        self
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model error (provider={:?}, stage={}): {}",
            self.provider,
            self.stage.as_str(),
            self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_a_round_trip_through_anyhow() {
        let err: anyhow::Error =
            LlmDiagnosticsError::new(Provider::Gemini, FailureStage::Blocked, "SAFETY").into();
        let diag = err.downcast_ref::<LlmDiagnosticsError>().unwrap();
        assert_eq!(diag.stage, FailureStage::Blocked);
        assert_eq!(
            err.to_string(),
            "model error (provider=Gemini, stage=blocked): SAFETY"
        );
    }
}
