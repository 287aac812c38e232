//! Google Gemini client (completion + embeddings).
//!
//! Uses the generative language REST API. Quota errors come back as 429
//! with a `retry_delay { seconds: N }` fragment in the message, which the
//! retry layer knows how to read.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::traits::{CompletionApi, EmbeddingApi};
use super::ProviderError;

const DEFAULT_COMPLETION_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";

/// Vectors produced by the Gemini embedding model.
pub const EMBEDDING_DIMENSION: usize = 3072;

pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: api_key.into(),
            model,
        }
    }

    #[cfg(test)]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::new("test-key", None)
        }
    }

    fn completion_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_COMPLETION_MODEL)
    }

    fn embedding_model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_EMBEDDING_MODEL)
    }

    async fn post(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        check_status(response).await
    }
}

#[async_trait]
impl CompletionApi for GeminiClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url,
            self.completion_model(),
            self.api_key
        );
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": max_tokens,
            }
        });

        let parsed: GenerateResponse = self
            .post(url, body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderError::Parse("response contained no candidates".to_string()))
    }
}

#[async_trait]
impl EmbeddingApi for GeminiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let model = self.embedding_model();
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, model, self.api_key
        );
        let body = json!({
            "model": format!("models/{}", model),
            "content": {"parts": [{"text": text}]},
        });

        let parsed: EmbedResponse = self
            .post(url, body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parsed.embedding.values)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}

/// Shared across the provider clients: map transport errors to the taxonomy.
pub(super) fn classify_reqwest_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(error.to_string())
    } else {
        ProviderError::Network(error.to_string())
    }
}

/// Shared across the provider clients: map HTTP status codes, keeping the
/// body text so the retry layer can mine it for suggested delays.
pub(super) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited(body));
    }
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ProviderError::Auth(body));
    }
    if status.is_server_error() {
        return Err(ProviderError::Server(format!("HTTP {}: {}", status, body)));
    }
    Err(ProviderError::Api(format!("HTTP {}: {}", status, body)))
}
