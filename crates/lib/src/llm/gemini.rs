//! Gemini API client (Generative Language API, `models/{model}:generateContent`).
//! Non-streaming only: one request, one reply.

use crate::config::Settings;
use crate::llm::{CompletionBackend, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the Gemini generateContent endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiClient {
    /// `timeout` bounds the whole request; None means wait as long as the server takes.
    pub fn new(
        api_key: Option<String>,
        model: &str,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            base_url,
            model: model.trim().to_string(),
            api_key,
            client: builder.build()?,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, LlmError> {
        Self::new(
            settings.model_api_key.clone(),
            &settings.model_name,
            Some(settings.model_api_base.clone()),
            settings.model_timeout,
        )
    }

    /// POST /models/{model}:generateContent with a system instruction and one user turn.
    pub async fn generate_content(
        &self,
        system_instruction: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = GenerateContentRequest::new(system_instruction, prompt);
        let res = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        let data: GenerateContentResponse = res.json().await?;
        data.into_text()
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String, LlmError> {
        self.generate_content(system_instruction, prompt).await
    }
}

/// Build an error from a non-2xx response, using the `{"error": {...}}` envelope when present.
fn api_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    let message = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => match error.status {
            Some(s) if !s.is_empty() => format!("{}: {}", s, error.message),
            _ => error.message,
        },
        Err(_) => body.trim().to_string(),
    };
    LlmError::Api {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
}

impl GenerateContentRequest {
    fn new(system_instruction: &str, prompt: &str) -> Self {
        Self {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(system_instruction)],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(prompt)],
            }],
        }
    }
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
    /// Absent for non-text parts (e.g. inline data).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

impl Part {
    fn text(s: &str) -> Self {
        Self {
            text: Some(s.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate (all text parts joined). Blocked prompts and empty candidates are errors.
    fn into_text(self) -> Result<String, LlmError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(match block_reason {
                Some(reason) => LlmError::Blocked(format!("prompt blocked: {}", reason)),
                None => LlmError::Empty,
            });
        };
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if !text.trim().is_empty() {
            return Ok(text);
        }
        match candidate.finish_reason {
            Some(reason) if reason != "STOP" => {
                Err(LlmError::Blocked(format!("finish reason: {}", reason)))
            }
            _ => Err(LlmError::Empty),
        }
    }
}
