//! Configuration management for the RAG service
//!
//! Supports loading configuration from a TOML file plus `VIA_RAG__`-prefixed
//! environment variables, with compiled-in defaults matching the original
//! deployment's env var contract.

pub mod settings;

pub use settings::{
    load_settings, ConfigError, EmbeddingSettings, FaqConfig, LlmSettings, ObservabilityConfig,
    RerankerConfig, RuntimeEnvironment, SearchConfig, ServerConfig, Settings, VectorStoreConfig,
};
