use std::io::Write;

use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 9] = [
    "KENNING_EMBEDDING_PROVIDER",
    "KENNING_EMBEDDING_DIMENSION",
    "KENNING_OLLAMA_URL",
    "KENNING_OLLAMA_MODEL",
    "KENNING_OLLAMA_EMBEDDING_MODEL",
    "KENNING_DEBOUNCE_MS",
    "KENNING_CACHE_CAPACITY",
    "KENNING_CHUNK_LINES",
    "KENNING_PRIVACY_MODE",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.index.chunk_lines, 50);
    assert_eq!(config.index.cache_capacity, 100);
    assert_eq!(config.index.history_capacity, 50);
    assert_eq!(config.index.debounce_ms, 1500);
    assert!(config.index.watch);
    assert!(config.index.ignore_dirs.iter().any(|d| d == "node_modules"));
    assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
    assert_eq!(config.embedding.dimension, 384);
    assert_eq!(config.llm.base_url, "http://localhost:11434");
    assert_eq!(config.llm.tiers.len(), 1);
    assert!(config.llm.tiers[0].trusted);
    assert!(!config.privacy.enabled);
}

#[test]
#[serial]
fn load_nonexistent_path_uses_defaults() {
    clear_env();
    let config = Config::load(Path::new("/nonexistent/kenning.toml")).unwrap();
    assert_eq!(config.index.debounce_ms, 1500);
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kenning.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(
        f,
        r#"
[index]
chunk_lines = 20
ignore_dirs = ["vendor"]
watch = false

[embedding]
provider = "ollama"
dimension = 768

[llm]
base_url = "http://gpu-box:11434"

[[llm.tiers]]
name = "local"
model = "qwen2.5-coder:7b"
trusted = true

[[llm.tiers]]
name = "remote"
model = "llama3:70b"

[privacy]
enabled = true
"#
    )
    .unwrap();

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.index.chunk_lines, 20);
    assert_eq!(config.index.cache_capacity, 100);
    assert_eq!(config.index.ignore_dirs, vec!["vendor"]);
    assert!(!config.index.watch);
    assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
    assert_eq!(config.embedding.dimension, 768);
    assert_eq!(config.embedding.model, "nomic-embed-text");
    assert_eq!(config.llm.base_url, "http://gpu-box:11434");
    assert_eq!(config.llm.model, "mistral:7b");
    assert_eq!(config.llm.tiers.len(), 2);
    assert_eq!(config.llm.tiers[1].name, "remote");
    assert!(!config.llm.tiers[1].trusted);
    assert!(config.privacy.enabled);
}

#[test]
#[serial]
fn malformed_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kenning.toml");
    std::fs::write(&path, "[index\nchunk_lines = ").unwrap();

    let err = Config::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("KENNING_EMBEDDING_PROVIDER", "ollama");
        std::env::set_var("KENNING_EMBEDDING_DIMENSION", "1024");
        std::env::set_var("KENNING_OLLAMA_URL", "http://remote:11434");
        std::env::set_var("KENNING_OLLAMA_MODEL", "phi3:mini");
        std::env::set_var("KENNING_OLLAMA_EMBEDDING_MODEL", "mxbai-embed-large");
        std::env::set_var("KENNING_DEBOUNCE_MS", "250");
        std::env::set_var("KENNING_CACHE_CAPACITY", "10");
        std::env::set_var("KENNING_CHUNK_LINES", "30");
        std::env::set_var("KENNING_PRIVACY_MODE", "true");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
    assert_eq!(config.embedding.dimension, 1024);
    assert_eq!(config.llm.base_url, "http://remote:11434");
    assert_eq!(config.llm.model, "phi3:mini");
    assert_eq!(config.embedding.model, "mxbai-embed-large");
    assert_eq!(config.index.debounce_ms, 250);
    assert_eq!(config.index.cache_capacity, 10);
    assert_eq!(config.index.chunk_lines, 30);
    assert!(config.privacy.enabled);
}

#[test]
#[serial]
fn invalid_env_values_ignored() {
    clear_env();
    let mut config = Config::default();

    unsafe {
        std::env::set_var("KENNING_EMBEDDING_PROVIDER", "word2vec");
        std::env::set_var("KENNING_EMBEDDING_DIMENSION", "0");
        std::env::set_var("KENNING_DEBOUNCE_MS", "soon");
        std::env::set_var("KENNING_CHUNK_LINES", "-5");
    }
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.embedding.provider, EmbeddingProvider::Hashing);
    assert_eq!(config.embedding.dimension, 384);
    assert_eq!(config.index.debounce_ms, 1500);
    assert_eq!(config.index.chunk_lines, 50);
}

#[test]
fn to_index_config_carries_values() {
    let mut config = Config::default();
    config.index.chunk_lines = 12;
    config.index.ignore_dirs = vec!["out".into()];
    let index = config.index.to_index_config();
    assert_eq!(index.chunk_lines, 12);
    assert_eq!(index.ignore_dirs, vec!["out"]);
    assert_eq!(index.debounce_ms, 1500);
}
