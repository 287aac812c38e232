//! Anthropic Claude client (completion only; Anthropic has no embedding
//! endpoint).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::gemini::{check_status, classify_reqwest_error};
use super::traits::CompletionApi;
use super::ProviderError;

const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const API_VERSION: &str = "2023-06-01";

pub struct ClaudeClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: "https://api.anthropic.com/v1".to_string(),
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
}

#[async_trait]
impl CompletionApi for ClaudeClient {
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError> {
        let body = json!({
            "model": self.model.as_deref().unwrap_or(DEFAULT_MODEL),
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http_client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let parsed: MessagesResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| ProviderError::Parse("response contained no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let client = ClaudeClient::new("key", None);
        assert_eq!(client.base_url, "https://api.anthropic.com/v1");
    }

    #[test]
    fn test_with_base_url() {
        let client = ClaudeClient::with_base_url("http://localhost:9002");
        assert_eq!(client.base_url, "http://localhost:9002");
    }

    #[test]
    fn test_messages_response_parsing() {
        let body = r#"{"content": [{"type": "text", "text": "{\"1\": []}"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.content[0].text, "{\"1\": []}");
    }
}
