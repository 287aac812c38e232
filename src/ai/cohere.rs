//! Cohere client (completion + embeddings).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::gemini::{check_status, classify_reqwest_error};
use super::traits::{CompletionApi, EmbeddingApi};
use super::ProviderError;

const DEFAULT_COMPLETION_MODEL: &str = "command-r7b-12-2024";
const DEFAULT_EMBEDDING_MODEL: &str = "embed-v4";

/// Output dimension we request from the embed endpoint.
pub const EMBEDDING_DIMENSION: usize = 1024;

pub struct CohereClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: EmbedVectors,
}

#[derive(Debug, Deserialize)]
struct EmbedVectors {
    float: Vec<Vec<f32>>,
}

impl CohereClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: "https://api.cohere.com/v2".to_string(),
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
impl CompletionApi for CohereClient {
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
            .post("/chat", body)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .message
            .and_then(|m| m.content.into_iter().next())
            .map(|block| block.text)
            .ok_or_else(|| ProviderError::Parse("response contained no message".to_string()))
    }
}

#[async_trait]
impl EmbeddingApi for CohereClient {
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
                "texts": chunk,
                "input_type": "search_document",
                "embedding_types": ["float"],
                "output_dimension": EMBEDDING_DIMENSION,
            });

            let parsed: EmbedResponse = self
                .post("/embed", body)
                .await?
                .json()
                .await
                .map_err(|e| ProviderError::Parse(e.to_string()))?;

            result.extend(parsed.embeddings.float);
        }
        Ok(result)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }
}
