//! Application settings
//!
//! Layered loading: compiled-in defaults, then an optional config file, then
//! environment variable overrides (`config` crate, `Environment::with_prefix`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Runtime environment; gates how strictly `Settings::validate` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Development,
    Staging,
    Production,
}

impl RuntimeEnvironment {
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default = "default_vector_store_host")]
    pub host: String,
    #[serde(default = "default_vector_store_port")]
    pub port: u16,
    #[serde(default = "default_document_collection")]
    pub document_collection: String,
    #[serde(default = "default_faq_collection")]
    pub faq_collection: String,
}

fn default_vector_store_host() -> String {
    std::env::var("VECTOR_STORE_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}
fn default_vector_store_port() -> u16 {
    std::env::var("VECTOR_STORE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(6334)
}
fn default_document_collection() -> String {
    std::env::var("DOCUMENT_COLLECTION").unwrap_or_else(|_| "document_embeddings".to_string())
}
fn default_faq_collection() -> String {
    std::env::var("FAQ_COLLECTION").unwrap_or_else(|_| "faq_embeddings".to_string())
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            host: default_vector_store_host(),
            port: default_vector_store_port(),
            document_collection: default_document_collection(),
            faq_collection: default_faq_collection(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

fn default_llm_base_url() -> String {
    std::env::var("LLM_BASE_URL").unwrap_or_else(|_| "http://localhost:11434".to_string())
}
fn default_llm_model() -> String {
    std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-oss:20b".to_string())
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dim")]
    pub dim: usize,
}

fn default_embedding_model() -> String {
    std::env::var("EMBEDDING_MODEL").unwrap_or_else(|_| "keepitreal/vietnamese-sbert".to_string())
}
fn default_embedding_dim() -> usize {
    std::env::var("EMBEDDING_DIM")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1024)
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dim: default_embedding_dim(),
        }
    }
}

/// Document search tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_document_rerank_threshold")]
    pub document_rerank_threshold: f32,
}

fn default_similarity_threshold() -> f32 {
    0.2
}
fn default_top_k() -> usize {
    15
}
fn default_document_rerank_threshold() -> f32 {
    0.6
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
            document_rerank_threshold: default_document_rerank_threshold(),
        }
    }
}

/// FAQ responder tuning (§4.2 / §6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqConfig {
    #[serde(default = "default_faq_top_k")]
    pub top_k: usize,
    #[serde(default = "default_faq_vector_threshold")]
    pub vector_threshold: f32,
    #[serde(default = "default_faq_rerank_threshold")]
    pub rerank_threshold: f32,
    #[serde(default = "default_faq_rerank_direct_threshold")]
    pub rerank_direct_threshold: f32,
    #[serde(default = "default_faq_similarity_force_threshold")]
    pub similarity_force_threshold: f32,
    #[serde(default = "default_faq_question_weight")]
    pub question_weight: f32,
    #[serde(default = "default_faq_qa_weight")]
    pub qa_weight: f32,
    #[serde(default = "default_faq_answer_weight")]
    pub answer_weight: f32,
    #[serde(default = "default_faq_consistency_threshold")]
    pub consistency_threshold: f32,
    #[serde(default = "default_faq_consistency_bonus")]
    pub consistency_bonus: f32,
}

fn default_faq_top_k() -> usize {
    10
}
fn default_faq_vector_threshold() -> f32 {
    0.5
}
fn default_faq_rerank_threshold() -> f32 {
    0.6
}
fn default_faq_rerank_direct_threshold() -> f32 {
    0.75
}
fn default_faq_similarity_force_threshold() -> f32 {
    0.85
}
fn default_faq_question_weight() -> f32 {
    0.5
}
fn default_faq_qa_weight() -> f32 {
    0.3
}
fn default_faq_answer_weight() -> f32 {
    0.2
}
fn default_faq_consistency_threshold() -> f32 {
    0.6
}
fn default_faq_consistency_bonus() -> f32 {
    1.1
}

impl Default for FaqConfig {
    fn default() -> Self {
        Self {
            top_k: default_faq_top_k(),
            vector_threshold: default_faq_vector_threshold(),
            rerank_threshold: default_faq_rerank_threshold(),
            rerank_direct_threshold: default_faq_rerank_direct_threshold(),
            similarity_force_threshold: default_faq_similarity_force_threshold(),
            question_weight: default_faq_question_weight(),
            qa_weight: default_faq_qa_weight(),
            answer_weight: default_faq_answer_weight(),
            consistency_threshold: default_faq_consistency_threshold(),
            consistency_bonus: default_faq_consistency_bonus(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    #[serde(default = "default_reranker_model")]
    pub model: String,
    #[serde(default = "default_reranker_max_input_len")]
    pub max_input_len: usize,
    #[serde(default = "default_reranker_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_reranker_model() -> String {
    "cross-encoder/ms-marco-MiniLM-L-12-v2".to_string()
}
fn default_reranker_max_input_len() -> usize {
    512
}
fn default_reranker_batch_size() -> usize {
    32
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model: default_reranker_model(),
            max_input_len: default_reranker_max_input_len(),
            batch_size: default_reranker_batch_size(),
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default)]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_enabled: true,
        }
    }
}

fn default_support_phone() -> String {
    std::env::var("SUPPORT_PHONE")
        .unwrap_or_else(|_| "Phòng vận hành 0904540490 - Phòng kinh doanh: 0914616081".to_string())
}

/// Root settings object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub faq: FaqConfig,
    #[serde(default)]
    pub reranker: RerankerConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default = "default_support_phone")]
    pub support_phone: String,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch table of per-section validation, matching the shape of the
    /// ambient stack's layered settings: one method per sub-config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_search()?;
        self.validate_faq()?;
        self.validate_reranker()?;
        Ok(())
    }

    fn validate_search(&self) -> Result<(), ConfigError> {
        check_unit_interval("search.similarity_threshold", self.search.similarity_threshold)?;
        check_unit_interval(
            "search.document_rerank_threshold",
            self.search.document_rerank_threshold,
        )?;
        if self.search.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                field: "search.top_k".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn validate_faq(&self) -> Result<(), ConfigError> {
        let faq = &self.faq;
        for (field, value) in [
            ("faq.vector_threshold", faq.vector_threshold),
            ("faq.rerank_threshold", faq.rerank_threshold),
            ("faq.rerank_direct_threshold", faq.rerank_direct_threshold),
            ("faq.similarity_force_threshold", faq.similarity_force_threshold),
            ("faq.question_weight", faq.question_weight),
            ("faq.qa_weight", faq.qa_weight),
            ("faq.answer_weight", faq.answer_weight),
            ("faq.consistency_threshold", faq.consistency_threshold),
        ] {
            check_unit_interval(field, value)?;
        }

        let weight_sum = faq.question_weight + faq.qa_weight + faq.answer_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            let message = format!("variant weights must sum to 1.0, got {weight_sum}");
            if self.environment.is_strict() {
                return Err(ConfigError::InvalidValue {
                    field: "faq.{question,qa,answer}_weight".to_string(),
                    message,
                });
            }
            tracing::warn!("{message}");
        }

        if faq.consistency_bonus < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "faq.consistency_bonus".to_string(),
                message: "must be >= 1.0".to_string(),
            });
        }

        Ok(())
    }

    fn validate_reranker(&self) -> Result<(), ConfigError> {
        if self.reranker.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reranker.batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.reranker.max_input_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "reranker.max_input_len".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn check_unit_interval(field: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            message: format!("must be between 0.0 and 1.0, got {value}"),
        });
    }
    Ok(())
}

/// Load settings from (in increasing priority order) compiled-in defaults,
/// `config/default.{toml,yaml}`, `config/{env}.{toml,yaml}`, then `VIA_RAG__`
/// prefixed environment variables.
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder =
            builder.add_source(File::with_name(&format!("config/{env_name}")).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("VIA_RAG")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize().unwrap_or_default();

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.search.top_k, 15);
        assert_eq!(settings.faq.rerank_threshold, 0.6);
    }

    #[test]
    fn rejects_threshold_out_of_range() {
        let mut settings = Settings::default();
        settings.search.similarity_threshold = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_top_k() {
        let mut settings = Settings::default();
        settings.search.top_k = 0;
        assert!(settings.validate().is_err());
    }
}
