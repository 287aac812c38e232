//! Trait definitions for AI capabilities.
//!
//! The tagger, sync engine and playlist generator depend on these traits
//! rather than concrete backends, so tests substitute scripted mocks.

use async_trait::async_trait;

use super::ProviderError;

/// Text completion.
#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Send a prompt, get the model's text back.
    async fn complete(
        &self,
        prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ProviderError>;
}

/// Text embeddings.
#[async_trait]
pub trait EmbeddingApi: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embed many texts, issuing requests in `batch_size` chunks.
    ///
    /// The default implementation loops over [`EmbeddingApi::embed`];
    /// backends with a batch endpoint override it.
    async fn embed_batch(
        &self,
        texts: &[String],
        batch_size: usize,
    ) -> Result<Vec<Vec<f32>>, ProviderError> {
        let _ = batch_size;
        let mut result = Vec::with_capacity(texts.len());
        for text in texts {
            result.push(self.embed(text).await?);
        }
        Ok(result)
    }

    /// Dimensionality of the vectors this backend produces.
    fn dimension(&self) -> usize;
}

/// Scripted mock providers for testing.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Completion mock that plays back a script of responses, one per call.
    /// Once the script runs out the last entry repeats.
    pub struct MockCompletion {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        last: Mutex<Option<Result<String, ProviderError>>>,
        pub calls: AtomicUsize,
    }

    impl MockCompletion {
        pub fn new(script: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
            }
        }

        /// A mock that always returns the same response.
        pub fn always(response: &str) -> Self {
            Self::new(vec![Ok(response.to_string())])
        }

        /// A mock that always fails with the given error.
        pub fn failing(error: ProviderError) -> Self {
            Self::new(vec![Err(error)])
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionApi for MockCompletion {
        async fn complete(
            &self,
            _prompt: &str,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = script.pop_front() {
                *last = Some(next.clone());
                next
            } else {
                last.clone()
                    .unwrap_or_else(|| Err(ProviderError::Api("empty mock script".to_string())))
            }
        }
    }

    /// Embedding mock producing deterministic vectors from the text length.
    pub struct MockEmbedding {
        pub dimension: usize,
    }

    impl MockEmbedding {
        pub fn new(dimension: usize) -> Self {
            Self { dimension }
        }
    }

    #[async_trait]
    impl EmbeddingApi for MockEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
            let seed = text.len() as f32;
            Ok((0..self.dimension)
                .map(|i| (seed + i as f32 * 0.01) / 100.0)
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_completion_plays_script() {
            let mock = MockCompletion::new(vec![
                Err(ProviderError::RateLimited("slow down".to_string())),
                Ok("{}".to_string()),
            ]);

            assert!(mock.complete("p", 0.3, 100).await.is_err());
            assert_eq!(mock.complete("p", 0.3, 100).await.unwrap(), "{}");
            // Script exhausted: last entry repeats
            assert_eq!(mock.complete("p", 0.3, 100).await.unwrap(), "{}");
            assert_eq!(mock.call_count(), 3);
        }

        #[tokio::test]
        async fn test_mock_embedding_is_deterministic() {
            let mock = MockEmbedding::new(8);
            let a = mock.embed("hello").await.unwrap();
            let b = mock.embed("hello").await.unwrap();
            assert_eq!(a, b);
            assert_eq!(a.len(), 8);
        }

        #[tokio::test]
        async fn test_default_embed_batch() {
            let mock = MockEmbedding::new(4);
            let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
            let vectors = mock.embed_batch(&texts, 2).await.unwrap();
            assert_eq!(vectors.len(), 3);
            assert_ne!(vectors[0], vectors[1]);
        }
    }
}
