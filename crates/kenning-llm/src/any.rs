#[cfg(any(test, feature = "mock"))]
use crate::mock::MockProvider;
use crate::error::LlmError;
use crate::hashing::HashingProvider;
use crate::ollama::OllamaProvider;
use crate::provider::{LlmProvider, Message};

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given closure for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::Ollama($p) => $expr,
            AnyProvider::Hashing($p) => $expr,
            #[cfg(any(test, feature = "mock"))]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    Ollama(OllamaProvider),
    Hashing(HashingProvider),
    #[cfg(any(test, feature = "mock"))]
    Mock(MockProvider),
}

impl LlmProvider for AnyProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        delegate_provider!(self, |p| p.chat(messages).await)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        delegate_provider!(self, |p| p.embed(text).await)
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_variant_delegates_name() {
        let p = AnyProvider::Hashing(HashingProvider::new(8));
        assert_eq!(p.name(), "hashing");
        assert!(p.supports_embeddings());
    }

    #[tokio::test]
    async fn hashing_variant_delegates_embed() {
        let p = AnyProvider::Hashing(HashingProvider::new(8));
        let v = p.embed("hello world").await.unwrap();
        assert_eq!(v.len(), 8);
    }

    #[test]
    fn ollama_variant_delegates_name() {
        let p = AnyProvider::Ollama(OllamaProvider::new(
            "http://localhost:11434",
            "m".into(),
            "e".into(),
        ));
        assert_eq!(p.name(), "ollama");
    }
}
