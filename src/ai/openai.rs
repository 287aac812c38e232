//! OpenAI client (completion + embeddings).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::gemini::{check_status, classify_reqwest_error};
use super::traits::{CompletionApi, EmbeddingApi};
use super::ProviderError;

const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Vectors produced by text-embedding-3-small.
pub const EMBEDDING_DIMENSION: usize = 1536;

pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingObject>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".to_string(),
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

    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        check_status(response).await
    }
}

#[async_trait]
impl CompletionApi for OpenAiClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model.as_deref().unwrap_or(DEFAULT_COMPLETION_MODEL),
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let parsed: ChatResponse = self
            .post("/chat/completions", body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Parse("response contained no choices".to_string()))
    }
}

#[async_trait]
impl EmbeddingApi for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let vectors = self.embed_batch(std::slice::from_ref(&text.to_string()), 1).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Parse("response contained no embeddings".to_string()))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut result = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(batch_size.max(1)) {
            let body = json!({
                "model": self.model.as_deref().unwrap_or(DEFAULT_EMBEDDING_MODEL),
                "input": chunk,
            });

            let parsed: EmbeddingsResponse = self
                .post("/embeddings", body)
                .await?
                .json()
                .await
                .map_err(|e| ProviderError::Parse(e.to_string()))?;

            result.extend(parsed.data.into_iter().map(|d| d.embedding));
        }
        Ok(result)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}
