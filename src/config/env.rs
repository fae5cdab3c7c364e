use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("KENNING_EMBEDDING_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid KENNING_EMBEDDING_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("KENNING_EMBEDDING_DIMENSION") {
            match v.parse::<usize>() {
                Ok(dim) if dim > 0 => self.embedding.dimension = dim,
                _ => tracing::warn!("ignoring invalid KENNING_EMBEDDING_DIMENSION value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("KENNING_OLLAMA_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("KENNING_OLLAMA_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("KENNING_OLLAMA_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("KENNING_DEBOUNCE_MS")
            && let Ok(ms) = v.parse::<u64>()
        {
            self.index.debounce_ms = ms;
        }
        if let Ok(v) = std::env::var("KENNING_CACHE_CAPACITY")
            && let Ok(capacity) = v.parse::<usize>()
        {
            self.index.cache_capacity = capacity;
        }
        if let Ok(v) = std::env::var("KENNING_CHUNK_LINES") {
            match v.parse::<usize>() {
                Ok(lines) if lines > 0 => self.index.chunk_lines = lines,
                _ => tracing::warn!("ignoring invalid KENNING_CHUNK_LINES value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("KENNING_PRIVACY_MODE") {
            self.privacy.enabled = matches!(v.to_lowercase().as_str(), "true" | "1" | "on");
        }
    }
}
