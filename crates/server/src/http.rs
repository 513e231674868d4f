//! HTTP endpoints
//!
//! Service descriptor, health, agent listing, and chat — both the streaming
//! (SSE) and non-streaming paths drive the same `RagWorkflow::run` call;
//! the non-streaming handler just drains the token channel in the
//! background and returns the finished `Answer` (§9).

use std::convert::Infallible;

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use via_rag_config::RuntimeEnvironment;
use via_rag_core::{validate_question, AnswerStatus, ConversationTurn, Reference};

use crate::state::AppState;
use crate::ServerError;

pub fn build_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.settings.environment);

    Router::new()
        .route("/", get(service_descriptor))
        .route("/health", get(health))
        .route("/agents", get(agents))
        .route("/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Permissive in development, matching the origin-less `?` configuration the
/// layered settings don't yet expose an allow-list for in this deployment
/// (§10.5: "configured allow-list in production-flavored settings").
fn build_cors_layer(environment: &RuntimeEnvironment) -> CorsLayer {
    if environment.is_strict() {
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    }
}

#[derive(Serialize)]
struct ServiceDescriptor {
    name: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
}

async fn service_descriptor() -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        name: "via-rag",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: vec!["/", "/health", "/agents", "/chat"],
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    database_connected: bool,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_connected = state.vector_store.is_live().await;

    let (status_code, body) = if database_connected {
        (
            StatusCode::OK,
            HealthResponse {
                status: "healthy",
                message: "service is operating normally",
                database_connected,
            },
        )
    } else {
        (
            StatusCode::OK,
            HealthResponse {
                status: "degraded",
                message: "vector store is unreachable; FAQ and document answers are unavailable",
                database_connected,
            },
        )
    };

    (status_code, Json(body))
}

#[derive(Serialize)]
struct AgentDescriptor {
    name: &'static str,
    role: &'static str,
}

#[derive(Serialize)]
struct AgentsResponse {
    agents: Vec<AgentDescriptor>,
    flow: &'static str,
}

async fn agents() -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: vec![
            AgentDescriptor { name: "classifier", role: "routes the question to FAQ, CHATTER, REPORTER or OTHER and rewrites follow-up questions into standalone form" },
            AgentDescriptor { name: "faq_responder", role: "answers directly when a single FAQ entry covers the question" },
            AgentDescriptor { name: "document_retriever", role: "fetches candidate document passages by embedding similarity" },
            AgentDescriptor { name: "grader", role: "reranks retrieved passages and filters by dual similarity/rerank thresholds" },
            AgentDescriptor { name: "generator", role: "synthesizes a streamed answer from graded passages" },
            AgentDescriptor { name: "not_enough_info_responder", role: "produces a graceful decline when nothing qualifies" },
            AgentDescriptor { name: "chatter_responder", role: "handles emotional/complaint-style messages" },
            AgentDescriptor { name: "reporter_responder", role: "handles system-outage reports, framed by vector-store liveness" },
            AgentDescriptor { name: "other_responder", role: "handles out-of-scope questions" },
        ],
        flow: "classifier, faq_responder and document_retriever run in parallel; the decision router picks one of faq_responder's answer, grader→generator, or a terminal responder",
    })
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    question: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
    #[serde(default)]
    stream: bool,
}

#[derive(Serialize)]
struct ChatResponse {
    answer: String,
    references: Vec<Reference>,
    status: AnswerStatus,
}

async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    if let Err(e) = validate_question(&request.question) {
        return ServerError::from(e).into_response();
    }

    if request.stream {
        chat_stream(state, request).await.into_response()
    } else {
        chat_sync(state, request).await.into_response()
    }
}

/// A fatal reranker failure propagates as `Err` from the workflow (§4.2,
/// §4.4, §7); a normal-looking `Answer` can also carry `status: Error` when
/// the Grader or Generator caught a fatal failure downstream. Both map to a
/// 5xx — a well-formed `Answer` with an error status is never wrapped in an
/// ordinary 200.
async fn chat_sync(state: AppState, request: ChatRequest) -> Response {
    let (tx, mut rx) = mpsc::channel::<String>(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    match state.workflow.run(request.question, request.history, tx).await {
        Ok(answer) if answer.status == AnswerStatus::Error => {
            ServerError::Core(via_rag_core::Error::Internal(answer.text)).into_response()
        }
        Ok(answer) => Json(ChatResponse {
            answer: answer.text,
            references: answer.references,
            status: answer.status,
        })
        .into_response(),
        Err(e) => ServerError::Core(e.into()).into_response(),
    }
}

/// §6.1's five SSE event shapes. `status` carries the lowercase "processing"
/// sentinel on `start` (not an `AnswerStatus` value) and the serialized
/// `AnswerStatus` string on `end`/`error`.
#[derive(Serialize)]
struct SseBody {
    #[serde(rename = "type")]
    kind: &'static str,
    content: Option<String>,
    references: Option<Vec<Reference>>,
    status: Option<String>,
}

fn answer_status_str(status: AnswerStatus) -> String {
    match serde_json::to_value(status) {
        Ok(serde_json::Value::String(s)) => s,
        _ => "ERROR".to_string(),
    }
}

async fn chat_stream(state: AppState, request: ChatRequest) -> Response {
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let workflow = state.workflow.clone();
    let handle = tokio::spawn(async move { workflow.run(request.question, request.history, tx).await });

    let stream = async_stream::stream! {
        yield Ok::<Event, Infallible>(Event::default().json_data(SseBody {
            kind: "start",
            content: None,
            references: None,
            status: Some("processing".to_string()),
        }).expect("SseBody always serializes"));

        while let Some(token) = rx.recv().await {
            yield Ok(Event::default().json_data(SseBody {
                kind: "chunk",
                content: Some(token),
                references: None,
                status: None,
            }).expect("SseBody always serializes"));
        }

        match handle.await {
            Ok(Ok(answer)) if answer.status == AnswerStatus::Error => {
                yield Ok(Event::default().json_data(SseBody {
                    kind: "error",
                    content: Some(answer.text),
                    references: None,
                    status: Some("ERROR".to_string()),
                }).expect("SseBody always serializes"));
            }
            Ok(Ok(answer)) => {
                yield Ok(Event::default().json_data(SseBody {
                    kind: "references",
                    content: None,
                    references: Some(answer.references),
                    status: None,
                }).expect("SseBody always serializes"));

                yield Ok(Event::default().json_data(SseBody {
                    kind: "end",
                    content: None,
                    references: None,
                    status: Some(answer_status_str(answer.status)),
                }).expect("SseBody always serializes"));
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "chat workflow failed fatally");
                yield Ok(Event::default().json_data(SseBody {
                    kind: "error",
                    content: Some("Đã xảy ra lỗi nội bộ. Vui lòng thử lại sau.".to_string()),
                    references: None,
                    status: Some("ERROR".to_string()),
                }).expect("SseBody always serializes"));
            }
            Err(e) => {
                tracing::error!(error = %e, "chat workflow task panicked");
                yield Ok(Event::default().json_data(SseBody {
                    kind: "error",
                    content: Some("Đã xảy ra lỗi nội bộ. Vui lòng thử lại sau.".to_string()),
                    references: None,
                    status: Some("ERROR".to_string()),
                }).expect("SseBody always serializes"));
            }
        }
    };

    let mut response = Sse::new(stream).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_status_str_matches_wire_contract() {
        assert_eq!(answer_status_str(AnswerStatus::Success), "SUCCESS");
        assert_eq!(answer_status_str(AnswerStatus::NotFound), "NOT_FOUND");
    }
}
