//! Core data model for the Vietnamese RAG service
//!
//! This crate holds the types threaded through the workflow graph
//! (`RequestState` and its pieces) plus the top-level error type that every
//! other crate's error converts into at its boundary.

pub mod model;

pub use model::{
    dedupe_references, validate_question, AgentLabel, Answer, AnswerStatus, Classification,
    ConversationTurn, RankedCandidate, Reference, ReferenceKind, RequestState, SearchCandidate,
    TurnRole, VariantBreakdown, QUESTION_MAX_LEN, QUESTION_MIN_LEN,
};

use thiserror::Error;

/// Top-level application error. Every crate boundary error converts into this
/// via `From`, so the server crate has one type to turn into an HTTP response.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid question: {0}")]
    InvalidQuestion(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("reranker error: {0}")]
    Reranker(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
