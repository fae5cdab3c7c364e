#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: String },

    #[error("chat not supported by {provider}")]
    ChatUnsupported { provider: String },

    #[error("no providers available")]
    NoProviders,

    #[error("all tiers failed, last error: {last_error}")]
    TiersExhausted { last_error: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;
