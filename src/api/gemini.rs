//! Implements the `Completion` trait with the Gemini `generateContent` REST endpoint.

use crate::api::Completion;
use crate::error::Res;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub(crate) const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// What the Gemini client needs to know: which key to use and which model to ask.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct GeminiSettings {
    api_key: String,
    model: String,
}

impl GeminiSettings {
    pub(crate) fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub(crate) fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{GEMINI_BASE_URL}/v1beta/models/{model}:generateContent")
    }
}

/// A completion client for Gemini. One request per call, no retries and no streaming.
pub(crate) struct GeminiModel {
    settings: GeminiSettings,
    client: reqwest::Client,
}

impl GeminiModel {
    pub(crate) fn new(settings: GeminiSettings) -> Res<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Unable to build the Gemini HTTP client")?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl Completion for GeminiModel {
    async fn complete(&mut self, prompt: &str) -> Res<String> {
        debug!("Sending prompt to {}", self.settings.model());
        trace!("Prompt:\n{prompt}");
        let request = GenerateContentRequest::new(prompt);
        let response = self
            .client
            .post(self.settings.endpoint())
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send the request to the Gemini API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            bail!("The Gemini API returned status {status}: {body}");
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse the Gemini API response")?;
        let text = body.text()?;
        trace!("Completion:\n{text}");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn new(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// The concatenated text parts of the first candidate.
    fn text(&self) -> Res<String> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            bail!("The Gemini API blocked the prompt: {reason}");
        }
        let candidate = self
            .candidates
            .first()
            .context("The Gemini API returned no candidates")?;
        let text: String = candidate
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            bail!(
                "The Gemini API returned an empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            );
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let settings = GeminiSettings::new("k", "models/gemini-2.5-flash-lite");
        assert_eq!(
            settings.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-lite:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(GenerateContentRequest::new("Parse: \"lunch 200\"")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contents": [{"parts": [{"text": "Parse: \"lunch 200\""}]}]})
        );
    }

    #[test]
    fn test_response_text_joins_parts() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "```json\n{\"items\":"}, {"text": " []}\n```"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 12}
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text().unwrap(), "```json\n{\"items\": []}\n```");
    }

    #[test]
    fn test_response_without_candidates() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(response.text().unwrap_err().to_string().contains("no candidates"));
    }

    #[test]
    fn test_response_blocked() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert!(response.text().unwrap_err().to_string().contains("SAFETY"));
    }

    #[test]
    fn test_response_empty_candidate() {
        let body = r#"{"candidates": [{"finishReason": "MAX_TOKENS"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert!(response.text().unwrap_err().to_string().contains("MAX_TOKENS"));
    }
}
