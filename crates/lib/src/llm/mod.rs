//! Model backend abstraction and the Gemini client.
//!
//! The relay only needs "system instruction + one prompt in, text out", so the backend trait is that small.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("model api key not configured (set GEMINI_API_KEY)")]
    MissingApiKey,
    #[error("model request timed out")]
    Timeout,
    #[error("model request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("model api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("model response blocked: {0}")]
    Blocked(String),
    #[error("model returned no text")]
    Empty,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Request(e)
        }
    }
}

/// A hosted model that turns a system instruction and one prompt into text.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Model name, for logs.
    fn model(&self) -> &str;
    async fn generate(&self, system_instruction: &str, prompt: &str) -> Result<String, LlmError>;
}
