//! Retrieval pipeline: vector-store adapter, embedding client, cross-encoder
//! reranker client, and the pure score-fusion function the FAQ responder and
//! Grader both build on.

pub mod embeddings;
pub mod reranker;
pub mod score_fusion;
pub mod vector_store;

pub use embeddings::{EmbeddingClient, EmbeddingConfig, HttpEmbedder, SimpleEmbedder};
pub use reranker::{HttpReranker, RerankPair, RerankerClient, RerankerConfig};
pub use score_fusion::{fuse_faq_scores, FaqVariantScores, FusionWeights};
pub use vector_store::{Collection, VectorStoreAdapter, VectorStoreConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("reranker error: {0}")]
    Reranker(String),

    #[error("connection error: {0}")]
    Connection(String),
}

impl From<RagError> for via_rag_core::Error {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Embedding(m) => via_rag_core::Error::Embedding(m),
            RagError::Reranker(m) => via_rag_core::Error::Reranker(m),
            RagError::VectorStore(m) | RagError::Connection(m) => {
                via_rag_core::Error::VectorStore(m)
            }
        }
    }
}
