use kenning_llm::LlmProvider;
use kenning_llm::any::AnyProvider;
use kenning_llm::error::LlmError;

/// Turns text into fixed-size vectors.
///
/// Embedding never fails from the caller's point of view: a backend error or a
/// vector of the wrong size degrades to the zero vector so indexing keeps going.
#[derive(Debug, Clone)]
pub struct Embedder {
    provider: AnyProvider,
    dimension: usize,
}

impl Embedder {
    #[must_use]
    pub fn new(provider: AnyProvider, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    #[must_use]
    pub fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.dimension]
    }

    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if !self.provider.supports_embeddings() {
            return self.zero_vector();
        }
        match self.provider.embed(text).await {
            Ok(v) if v.len() == self.dimension => v,
            Ok(v) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    expected = self.dimension,
                    got = v.len(),
                    "embedding dimension mismatch, using zero vector"
                );
                self.zero_vector()
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "embedding failed, using zero vector");
                self.zero_vector()
            }
        }
    }

    /// Embed a short probe string and report the backend's native dimension.
    ///
    /// # Errors
    ///
    /// Returns the provider error when the backend is unreachable or cannot embed.
    pub async fn probe(&self) -> Result<usize, LlmError> {
        if !self.provider.supports_embeddings() {
            return Err(LlmError::EmbedUnsupported {
                provider: self.provider.name().to_owned(),
            });
        }
        let v = self.provider.embed("probe").await?;
        Ok(v.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kenning_llm::hashing::HashingProvider;
    use kenning_llm::mock::MockProvider;

    #[tokio::test]
    async fn hashing_backend_embeds() {
        let e = Embedder::new(AnyProvider::Hashing(HashingProvider::new(32)), 32);
        let v = e.embed("parse config").await;
        assert_eq!(v.len(), 32);
        assert!(v.iter().any(|x| *x != 0.0));
        assert_eq!(e.probe().await.unwrap(), 32);
    }

    #[tokio::test]
    async fn failure_degrades_to_zero() {
        let mut mock = MockProvider::default();
        mock.supports_embeddings = false;
        let e = Embedder::new(AnyProvider::Mock(mock), 8);
        assert_eq!(e.embed("x").await, vec![0.0; 8]);
        assert!(e.probe().await.is_err());
    }

    #[tokio::test]
    async fn wrong_dimension_degrades_to_zero() {
        let e = Embedder::new(
            AnyProvider::Mock(MockProvider::default().with_embedding(vec![1.0, 2.0])),
            4,
        );
        assert_eq!(e.embed("x").await, vec![0.0; 4]);
        assert_eq!(e.probe().await.unwrap(), 2);
    }
}
