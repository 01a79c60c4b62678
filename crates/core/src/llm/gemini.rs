use crate::config::Settings;
use crate::llm::error::{FailureStage, LlmDiagnosticsError};
use crate::llm::{Provider, TextGenerator};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const FINISH_REASON_MAX_TOKENS: &str = "MAX_TOKENS";
const FINISH_REASON_SAFETY: &str = "SAFETY";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url =
            std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_output_tokens = std::env::var("GEMINI_MAX_OUTPUT_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS);

        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_output_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn generate_content(
        &self,
        req: &GenerateContentRequest,
    ) -> anyhow::Result<(serde_json::Value, GenerateContentResponse)> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);

        let res = self
            .http
            .post(self.endpoint())
            .headers(headers)
            .json(req)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        if !status.is_success() {
            let raw = serde_json::from_str::<serde_json::Value>(&text).ok();
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                FailureStage::Http,
                format!("status={status} body={text}"),
            )
            .with_raw(raw)
            .into());
        }

        let raw_json = serde_json::from_str::<serde_json::Value>(&text)
            .with_context(|| format!("failed to parse Gemini response JSON: {text}"))?;
        let parsed = serde_json::from_value::<GenerateContentResponse>(raw_json.clone())
            .context("failed to decode Gemini response into GenerateContentResponse")?;
        Ok((raw_json, parsed))
    }

    fn request(prompt: &str, max_output_tokens: u32) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig { max_output_tokens },
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let (mut raw_json, mut res) = self
            .generate_content(&Self::request(prompt, self.max_output_tokens))
            .await?;

        // Truncated output breaks the block format; retry once with a higher ceiling.
        if res.finish_reason() == Some(FINISH_REASON_MAX_TOKENS) {
            let bumped = self.max_output_tokens.saturating_mul(2).max(4096);
            tracing::warn!(
                model = %self.model,
                from = self.max_output_tokens,
                to = bumped,
                "Gemini finishReason=MAX_TOKENS; retrying once with higher maxOutputTokens"
            );
            let (rj, r) = self.generate_content(&Self::request(prompt, bumped)).await?;
            raw_json = rj;
            res = r;
        }

        response_text(&res).map_err(|err| err.with_raw(Some(raw_json)).into())
    }
}

fn response_text(res: &GenerateContentResponse) -> Result<String, LlmDiagnosticsError> {
    if let Some(reason) = res
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(LlmDiagnosticsError::new(
            Provider::Gemini,
            FailureStage::Blocked,
            format!("prompt blocked: {reason}"),
        ));
    }

    let Some(candidate) = res.candidates.first() else {
        return Err(LlmDiagnosticsError::new(
            Provider::Gemini,
            FailureStage::EmptyResponse,
            "response has no candidates",
        ));
    };

    let mut out = String::new();
    if let Some(content) = &candidate.content {
        for text in content.parts.iter().filter_map(|p| p.text.as_deref()) {
            out.push_str(text);
        }
    }

    if out.trim().is_empty() {
        let stage = if candidate.finish_reason.as_deref() == Some(FINISH_REASON_SAFETY) {
            FailureStage::Blocked
        } else {
            FailureStage::EmptyResponse
        };
        return Err(LlmDiagnosticsError::new(
            Provider::Gemini,
            stage,
            format!(
                "candidate has no text (finishReason={})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ),
        ));
    }

    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    fn finish_reason(&self) -> Option<&str> {
        self.candidates.first()?.finish_reason.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let res = decode(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Title: A\n"}, {"text": "Year: 2010"}]},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(response_text(&res).unwrap(), "Title: A\nYear: 2010");
        assert_eq!(res.finish_reason(), Some("STOP"));
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let res = decode(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        let err = response_text(&res).unwrap_err();
        assert_eq!(err.stage, FailureStage::Blocked);
    }

    #[test]
    fn missing_text_is_an_empty_response() {
        let res = decode(json!({"candidates": [{"finishReason": "RECITATION"}]}));
        let err = response_text(&res).unwrap_err();
        assert_eq!(err.stage, FailureStage::EmptyResponse);
        assert!(err.detail.contains("RECITATION"));

        let res = decode(json!({"candidates": []}));
        assert_eq!(
            response_text(&res).unwrap_err().stage,
            FailureStage::EmptyResponse
        );
    }

    #[test]
    fn request_serializes_in_gemini_shape() {
        let req = GeminiClient::request("hello", 128);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}],
                "generationConfig": {"maxOutputTokens": 128}
            })
        );
    }
}
