//! Application state
//!
//! The singleton clients (LLM, vector store, embedder, reranker) are built
//! once at startup and wired into one `RagWorkflow`; every request borrows
//! the same `Arc`s rather than constructing its own (§5, §9).

use std::sync::Arc;

use via_rag_agent::RagWorkflow;
use via_rag_config::Settings;
use via_rag_rag::VectorStoreAdapter;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub vector_store: Arc<VectorStoreAdapter>,
    pub workflow: Arc<RagWorkflow>,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        vector_store: Arc<VectorStoreAdapter>,
        workflow: Arc<RagWorkflow>,
    ) -> Self {
        Self {
            settings,
            vector_store,
            workflow,
        }
    }
}
