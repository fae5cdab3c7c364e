//! Deterministic offline embeddings via signed feature hashing.
//!
//! Not a language model: two texts end up close when they share identifier
//! tokens. Good enough to keep the index usable with no model server running.

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

#[derive(Debug, Clone)]
pub struct HashingProvider {
    dimension: usize,
}

impl HashingProvider {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Synchronous embedding used by both the trait impl and tests.
    #[must_use]
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for token in tokenize(text) {
            let hash = blake3::hash(token.as_bytes());
            let bytes = hash.as_bytes();
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&bytes[..8]);
            let bucket = u64::from_le_bytes(bucket_bytes) % self.dimension as u64;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            #[allow(clippy::cast_possible_truncation)]
            let idx = bucket as usize;
            vector[idx] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

/// Lowercased identifier tokens plus their `snake_case` parts.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .flat_map(|t| {
            let lower = t.to_lowercase();
            let mut out = vec![lower.clone()];
            if lower.contains('_') {
                out.extend(
                    lower
                        .split('_')
                        .filter(|p| !p.is_empty())
                        .map(str::to_owned),
                );
            }
            out
        })
}

impl LlmProvider for HashingProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::ChatUnsupported {
            provider: "hashing".into(),
        })
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(self.embed_text(text))
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "hashing"
    }
}
