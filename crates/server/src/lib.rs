//! HTTP surface for the Vietnamese RAG service
//!
//! Builds one shared `AppState` from the singleton clients and exposes it
//! over the axum router defined in `http`.

pub mod http;
pub mod state;

pub use http::build_router;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Top-level HTTP error. Every crate-boundary error composes into
/// `via_rag_core::Error` already; this just maps that to a status code and a
/// Vietnamese-safe JSON body (§7: never leak an internal `Display` string
/// verbatim without wrapping).
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] via_rag_core::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let ServerError::Core(ref err) = self;
        let status = match err {
            via_rag_core::Error::InvalidQuestion(_) => StatusCode::BAD_REQUEST,
            via_rag_core::Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
    }
}
