use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct RedreamConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub translation: TranslationConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub models: ModelsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_connect_retries() -> usize {
    5
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Which `RecordStore` implementation backs the service.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TranslationProvider {
    Google,
    Passthrough,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationConfig {
    pub provider: TranslationProvider,
    pub source_lang: String,
    pub target_lang: String,
    #[serde(default = "default_translate_url")]
    pub base_url: String,
    /// Falls back to `GOOGLE_API_KEY` when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_translate_timeout")]
    pub timeout_seconds: u64,
}

fn default_translate_url() -> String {
    "https://translation.googleapis.com".to_string()
}

fn default_translate_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub base_url: String,
    pub query_suffix: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.bing.com".to_string(),
            query_suffix: "꿈 해석".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36"
                .to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    /// Directory holding `model.onnx`, `tokenizer.json` and `config.json`.
    pub sentiment_dir: String,
    pub tagger_dir: String,
    /// 0 means one thread per logical CPU.
    #[serde(default)]
    pub intra_threads: usize,
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_seconds: u64,
}

fn default_inference_timeout() -> u64 {
    30
}

impl ModelsConfig {
    pub fn sentiment_path(&self) -> PathBuf {
        expand_path(&self.sentiment_dir)
    }

    pub fn tagger_path(&self) -> PathBuf {
        expand_path(&self.tagger_dir)
    }

    pub fn effective_intra_threads(&self) -> usize {
        if self.intra_threads == 0 {
            num_cpus::get()
        } else {
            self.intra_threads
        }
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8767,
        }
    }
}

impl RedreamConfig {
    /// Load from a TOML file, then overlay `REDREAM__SECTION__KEY` variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("REDREAM").separator("__"))
            .build()?;
        s.try_deserialize()
    }
}
