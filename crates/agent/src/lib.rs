//! Multi-agent RAG workflow
//!
//! Nine logical agents — Classifier, FAQ Responder, Document Retriever,
//! Grader, Generator, and four terminal responders — wired together by a
//! pure Decision Router and a parallel fan-out orchestrator.

pub mod classifier;
pub mod context;
pub mod faq;
pub mod generator;
pub mod grader;
pub mod responders;
pub mod retriever;
pub mod router;
pub mod workflow;

pub use classifier::{Classifier, ClassifierConfig};
pub use faq::{FaqConfig, FaqResponder, FaqResult};
pub use generator::{Generator, GeneratorInput};
pub use grader::{Grader, GraderConfig};
pub use responders::{ChatterResponder, NotEnoughInfoResponder, OtherResponder, ReporterResponder};
pub use retriever::{DocumentRetriever, RetrieverConfig, RetrieverResult};
pub use router::{decide, Route};
pub use workflow::{RagWorkflow, WorkflowConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("rag error: {0}")]
    Rag(String),

    #[error("llm error: {0}")]
    Llm(String),
}

impl From<via_rag_rag::RagError> for AgentError {
    fn from(err: via_rag_rag::RagError) -> Self {
        AgentError::Rag(err.to_string())
    }
}

impl From<via_rag_llm::LlmError> for AgentError {
    fn from(err: via_rag_llm::LlmError) -> Self {
        AgentError::Llm(err.to_string())
    }
}

impl From<AgentError> for via_rag_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Rag(m) => via_rag_core::Error::VectorStore(m),
            AgentError::Llm(m) => via_rag_core::Error::Llm(m),
        }
    }
}
