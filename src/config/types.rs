use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub privacy: PrivacyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IndexConfig {
    pub chunk_lines: usize,
    pub cache_capacity: usize,
    pub history_capacity: usize,
    pub debounce_ms: u64,
    pub ignore_dirs: Vec<String>,
    /// Keep the index current while `watch` runs.
    pub watch: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let defaults = kenning_index::IndexConfig::default();
        Self {
            chunk_lines: defaults.chunk_lines,
            cache_capacity: defaults.cache_capacity,
            history_capacity: defaults.history_capacity,
            debounce_ms: defaults.debounce_ms,
            ignore_dirs: defaults.ignore_dirs,
            watch: true,
        }
    }
}

impl IndexConfig {
    #[must_use]
    pub fn to_index_config(&self) -> kenning_index::IndexConfig {
        kenning_index::IndexConfig {
            chunk_lines: self.chunk_lines,
            cache_capacity: self.cache_capacity,
            history_capacity: self.history_capacity,
            debounce_ms: self.debounce_ms,
            ignore_dirs: self.ignore_dirs.clone(),
        }
    }
}

/// Embedding backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Hashing,
    Ollama,
}

impl EmbeddingProvider {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hashing => "hashing",
            Self::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_dimension() -> usize {
    384
}

fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    /// Ollama embedding model; unused by the hashing backend.
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            dimension: default_dimension(),
            model: default_embedding_model(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".into()
}

fn default_model() -> String {
    "mistral:7b".into()
}

fn default_tiers() -> Vec<TierConfig> {
    vec![TierConfig {
        name: "local".into(),
        model: None,
        trusted: true,
    }]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Chat model for tiers that do not name their own.
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            tiers: default_tiers(),
        }
    }
}

/// One entry of the ordered failover chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TierConfig {
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub trusted: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PrivacyConfig {
    pub enabled: bool,
}
