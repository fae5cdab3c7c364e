//! LLM provider abstraction, tiered failover, and prompt sanitization.

pub mod any;
pub mod error;
pub mod hashing;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod ollama;
pub mod privacy;
pub mod provider;
pub mod tiers;

pub use error::LlmError;
pub use provider::LlmProvider;
