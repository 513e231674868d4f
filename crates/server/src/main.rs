//! Process entry point
//!
//! Loads settings, initializes tracing, builds the singleton clients (LLM,
//! vector store, embedder, reranker), wires them into one `RagWorkflow`, and
//! serves the axum router (§10.5).

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use via_rag_agent::{
    ChatterResponder, Classifier, ClassifierConfig, DocumentRetriever, FaqConfig as AgentFaqConfig,
    FaqResponder, Generator, Grader, GraderConfig, NotEnoughInfoResponder, OtherResponder,
    RagWorkflow, ReporterResponder, RetrieverConfig, WorkflowConfig,
};
use via_rag_config::{load_settings, Settings};
use via_rag_llm::{LlmBackend, LlmConfig, OllamaBackend};
use via_rag_rag::{
    EmbeddingClient, EmbeddingConfig, FusionWeights, HttpEmbedder, HttpReranker, RerankerClient,
    RerankerConfig, VectorStoreAdapter, VectorStoreConfig,
};
use via_rag_server::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env = std::env::var("VIA_RAG_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Warning: failed to load configuration: {e}. Using defaults.");
            Settings::default()
        }
    };

    init_tracing(&settings);

    tracing::info!(environment = ?settings.environment, "starting via-rag server");

    let llm: Arc<dyn LlmBackend> = Arc::new(OllamaBackend::new(LlmConfig {
        model: settings.llm.model.clone(),
        endpoint: settings.llm.base_url.clone(),
        ..LlmConfig::default()
    })?);

    let vector_store = Arc::new(VectorStoreAdapter::new(VectorStoreConfig {
        host: settings.vector_store.host.clone(),
        port: settings.vector_store.port,
        document_collection: settings.vector_store.document_collection.clone(),
        faq_collection: settings.vector_store.faq_collection.clone(),
        ..VectorStoreConfig::default()
    })?);

    let embedder: Arc<dyn EmbeddingClient> = Arc::new(HttpEmbedder::new(EmbeddingConfig {
        model: settings.embedding.model.clone(),
        embedding_dim: settings.embedding.dim,
        ..EmbeddingConfig::default()
    })?);

    let reranker: Arc<dyn RerankerClient> = Arc::new(HttpReranker::new(RerankerConfig {
        model: settings.reranker.model.clone(),
        max_input_len: settings.reranker.max_input_len,
        batch_size: settings.reranker.batch_size,
        fail_fast: settings.reranker.fail_fast,
        ..RerankerConfig::default()
    })?);

    let workflow = Arc::new(build_workflow(
        &settings,
        llm.clone(),
        vector_store.clone(),
        embedder,
        reranker,
    ));

    let state = AppState::new(Arc::new(settings.clone()), vector_store, workflow);
    let app = via_rag_server::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

fn build_workflow(
    settings: &Settings,
    llm: Arc<dyn LlmBackend>,
    vector_store: Arc<VectorStoreAdapter>,
    embedder: Arc<dyn EmbeddingClient>,
    reranker: Arc<dyn RerankerClient>,
) -> RagWorkflow {
    let classifier = Arc::new(Classifier::new(
        llm.clone(),
        vector_store.clone(),
        ClassifierConfig::default(),
    ));

    let faq_responder = Arc::new(FaqResponder::new(
        vector_store.clone(),
        embedder.clone(),
        reranker.clone(),
        llm.clone(),
        AgentFaqConfig {
            top_k: settings.faq.top_k,
            vector_threshold: settings.faq.vector_threshold,
            rerank_threshold: settings.faq.rerank_threshold,
            rerank_direct_threshold: settings.faq.rerank_direct_threshold,
            similarity_force_threshold: settings.faq.similarity_force_threshold,
            weights: FusionWeights {
                question: settings.faq.question_weight,
                question_answer: settings.faq.qa_weight,
                answer: settings.faq.answer_weight,
            },
            consistency_threshold: settings.faq.consistency_threshold,
            consistency_bonus: settings.faq.consistency_bonus,
        },
    ));

    let retriever = Arc::new(DocumentRetriever::new(
        vector_store.clone(),
        embedder,
        RetrieverConfig {
            top_k: settings.search.top_k,
            similarity_threshold: settings.search.similarity_threshold,
        },
    ));

    let grader = Arc::new(Grader::new(
        reranker,
        GraderConfig {
            rerank_threshold: settings.search.document_rerank_threshold,
            similarity_threshold: settings.search.similarity_threshold,
        },
    ));

    let generator = Arc::new(Generator::new(llm.clone()));
    let not_enough_info = Arc::new(NotEnoughInfoResponder::new(llm.clone()));
    let chatter = Arc::new(ChatterResponder::new(llm.clone(), settings.support_phone.clone()));
    let reporter = Arc::new(ReporterResponder::new(llm.clone(), settings.support_phone.clone()));
    let other = Arc::new(OtherResponder::new(llm));

    RagWorkflow::new(
        classifier,
        faq_responder,
        retriever,
        grader,
        generator,
        not_enough_info,
        chatter,
        reporter,
        other,
        vector_store,
        WorkflowConfig::default(),
    )
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("via_rag={},tower_http=info", settings.observability.log_level).into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if settings.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
