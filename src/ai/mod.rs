//! AI provider integration.
//!
//! Two capabilities, each behind a trait: text completion
//! ([`traits::CompletionApi`]) and embeddings ([`traits::EmbeddingApi`]).
//! Concrete backends are small HTTP clients (Gemini, OpenAI, Claude,
//! Cohere); the rest of the crate selects one through the factory functions
//! here and never names a backend directly.

pub mod claude;
pub mod cohere;
pub mod gemini;
pub mod openai;
pub mod retry;
pub mod tagger;
pub mod traits;

pub use traits::{CompletionApi, EmbeddingApi};

use crate::config::{Config, Credentials};

/// Errors from AI providers.
///
/// The first three variants are transient and retried; the rest fail fast.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Provider asked us to slow down. The message may carry a suggested
    /// delay that [`retry`] knows how to extract.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Provider-side failure (5xx)
    #[error("Provider server error: {0}")]
    Server(String),

    /// Invalid or missing API key
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Provider rejected the request
    #[error("API error: {0}")]
    Api(String),

    /// Network failure
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be parsed
    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    /// Provider/capability mismatch or missing configuration
    #[error("Provider configuration error: {0}")]
    Config(String),
}

/// Supported provider backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Claude,
    Cohere,
}

impl std::str::FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "claude" | "anthropic" => Ok(Self::Claude),
            "cohere" => Ok(Self::Cohere),
            other => Err(ProviderError::Config(format!(
                "unknown provider '{}' (expected gemini, openai, claude or cohere)",
                other
            ))),
        }
    }
}

fn require_key(key: &Option<String>, name: &str) -> Result<String, ProviderError> {
    key.clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ProviderError::Config(format!("{} is not configured", name)))
}

/// Build the configured completion backend.
pub fn completion_provider(config: &Config) -> Result<Box<dyn CompletionApi>, ProviderError> {
    let kind: ProviderKind = config.ai.provider.parse()?;
    let model = config.ai.model.clone();
    let creds: &Credentials = &config.credentials;

    Ok(match kind {
        ProviderKind::Gemini => Box::new(gemini::GeminiClient::new(
            require_key(&creds.gemini_api_key, "gemini_api_key")?,
            model,
        )),
        ProviderKind::OpenAi => Box::new(openai::OpenAiClient::new(
            require_key(&creds.openai_api_key, "openai_api_key")?,
            model,
        )),
        ProviderKind::Claude => Box::new(claude::ClaudeClient::new(
            require_key(&creds.anthropic_api_key, "anthropic_api_key")?,
            model,
        )),
        ProviderKind::Cohere => Box::new(cohere::CohereClient::new(
            require_key(&creds.cohere_api_key, "cohere_api_key")?,
            model,
        )),
    })
}

/// Build the configured embedding backend.
///
/// Claude offers no embedding endpoint; selecting it here is a
/// configuration error.
pub fn embedding_provider(config: &Config) -> Result<Box<dyn EmbeddingApi>, ProviderError> {
    let kind: ProviderKind = config.embedding.provider.parse()?;
    let model = config.embedding.model.clone();
    let creds: &Credentials = &config.credentials;

    Ok(match kind {
        ProviderKind::Gemini => Box::new(gemini::GeminiClient::new(
            require_key(&creds.gemini_api_key, "gemini_api_key")?,
            model,
        )),
        ProviderKind::OpenAi => Box::new(openai::OpenAiClient::new(
            require_key(&creds.openai_api_key, "openai_api_key")?,
            model,
        )),
        ProviderKind::Cohere => Box::new(cohere::CohereClient::new(
            require_key(&creds.cohere_api_key, "cohere_api_key")?,
            model,
        )),
        ProviderKind::Claude => {
            return Err(ProviderError::Config(
                "claude does not provide embeddings; pick gemini, openai or cohere".to_string(),
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("gemini".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!("cohere".parse::<ProviderKind>().unwrap(), ProviderKind::Cohere);
        assert!("llama".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_completion_provider_requires_key() {
        let config = Config::default();
        let result = completion_provider(&config);
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_claude_embeddings_rejected() {
        let mut config = Config::default();
        config.embedding.provider = "claude".to_string();
        config.credentials.anthropic_api_key = Some("key".to_string());
        let result = embedding_provider(&config);
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }

    #[test]
    fn test_embedding_provider_builds_with_key() {
        let mut config = Config::default();
        config.credentials.gemini_api_key = Some("key".to_string());
        let provider = embedding_provider(&config).unwrap();
        assert_eq!(provider.dimension(), 3072);
    }
}
