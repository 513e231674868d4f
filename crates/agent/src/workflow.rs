//! Parallel fan-out orchestrator — §2, §5.
//!
//! Mirrors the original system's single shared executor bounding branch
//! concurrency to a fixed worker count: a semaphore with `pool_size` permits
//! is shared by every request, not allocated per request, so at most
//! `pool_size` branches run at once across the whole process.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};

use via_rag_core::{Answer, AnswerStatus, Classification, ConversationTurn, RankedCandidate};
use via_rag_rag::VectorStoreAdapter;

use crate::classifier::Classifier;
use crate::faq::FaqResult;
use crate::faq::FaqResponder;
use crate::generator::{Generator, GeneratorInput};
use crate::grader::Grader;
use crate::responders::{ChatterResponder, NotEnoughInfoResponder, OtherResponder, ReporterResponder};
use crate::retriever::{DocumentRetriever, RetrieverResult};
use crate::router::{decide, Route};
use crate::AgentError;

#[derive(Debug, Clone, Copy)]
pub struct WorkflowConfig {
    pub pool_size: usize,
    pub classifier_timeout: Duration,
    pub faq_timeout: Duration,
    pub retriever_timeout: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            pool_size: 3,
            classifier_timeout: Duration::from_secs(20),
            faq_timeout: Duration::from_secs(10),
            retriever_timeout: Duration::from_secs(10),
        }
    }
}

pub struct RagWorkflow {
    classifier: Arc<Classifier>,
    faq_responder: Arc<FaqResponder>,
    retriever: Arc<DocumentRetriever>,
    grader: Arc<Grader>,
    generator: Arc<Generator>,
    not_enough_info: Arc<NotEnoughInfoResponder>,
    chatter: Arc<ChatterResponder>,
    reporter: Arc<ReporterResponder>,
    other: Arc<OtherResponder>,
    vector_store: Arc<VectorStoreAdapter>,
    branch_pool: Arc<Semaphore>,
    config: WorkflowConfig,
}

#[allow(clippy::too_many_arguments)]
impl RagWorkflow {
    pub fn new(
        classifier: Arc<Classifier>,
        faq_responder: Arc<FaqResponder>,
        retriever: Arc<DocumentRetriever>,
        grader: Arc<Grader>,
        generator: Arc<Generator>,
        not_enough_info: Arc<NotEnoughInfoResponder>,
        chatter: Arc<ChatterResponder>,
        reporter: Arc<ReporterResponder>,
        other: Arc<OtherResponder>,
        vector_store: Arc<VectorStoreAdapter>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
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
            branch_pool: Arc::new(Semaphore::new(config.pool_size)),
            config,
        }
    }

    /// Runs one request end to end, streaming generated tokens into `tx`.
    /// Both the streaming and non-streaming HTTP handlers call this; the
    /// non-streaming handler simply joins everything it reads from the
    /// receiver side of an equivalent channel instead of forwarding it as
    /// SSE (§9).
    ///
    /// A fatal reranker failure in the FAQ branch (§4.2, §7) propagates as
    /// `Err` rather than being folded into a deferred `FaqResult` — the
    /// caller must turn this into a 5xx / SSE `error` event, never a normal
    /// completed answer.
    pub async fn run(
        &self,
        question: String,
        history: Vec<ConversationTurn>,
        tx: mpsc::Sender<String>,
    ) -> Result<Answer, AgentError> {
        let (classification, faq_result, retriever_result) =
            self.fan_out(&question, &history).await?;

        let vector_store_live = self.vector_store.is_live().await;

        let answer = match decide(&classification, &faq_result, &retriever_result.documents) {
            Route::Chatter => self.chatter.respond(&classification.contextualized_question, tx).await,
            Route::Reporter => {
                self.reporter
                    .respond(&classification.contextualized_question, vector_store_live, tx)
                    .await
            }
            Route::Other => self.other.respond(&classification.contextualized_question, tx).await,
            Route::FaqAnswer => Answer {
                text: faq_result.answer,
                status: AnswerStatus::Success,
                references: faq_result.references,
            },
            Route::Grader => {
                self.grade_and_generate(&classification, &history, retriever_result, tx).await
            }
            Route::NotEnoughInfo => {
                self.not_enough_info
                    .respond(&classification.contextualized_question, tx)
                    .await
            }
        };

        Ok(answer)
    }

    async fn fan_out(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<(Classification, FaqResult, RetrieverResult), AgentError> {
        let classifier_fut = self.run_branch(self.classifier.classify(question, history));
        let faq_fut = self.run_branch(self.faq_responder.answer(question));
        let retriever_fut = self.run_branch(self.retriever.retrieve(question));

        let (classifier_res, faq_res, retriever_res) =
            tokio::join!(
                tokio::time::timeout(self.config.classifier_timeout, classifier_fut),
                tokio::time::timeout(self.config.faq_timeout, faq_fut),
                tokio::time::timeout(self.config.retriever_timeout, retriever_fut),
            );

        let classification = match classifier_res {
            Ok((classification, _live)) => classification,
            Err(_) => {
                tracing::warn!(timeout = ?self.config.classifier_timeout, "classifier branch timed out");
                Classification::fallback(question)
            }
        };

        let faq_result = match faq_res {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "FAQ reranker failed fatally");
                return Err(AgentError::from(e));
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.config.faq_timeout, "FAQ branch timed out");
                FaqResult::timeout_fallback()
            }
        };

        let retriever_result = match retriever_res {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "retriever branch failed");
                RetrieverResult { documents: Vec::new() }
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.config.retriever_timeout, "retriever branch timed out");
                RetrieverResult { documents: Vec::new() }
            }
        };

        Ok((classification, faq_result, retriever_result))
    }

    /// Acquires a pool permit before running `fut`, bounding total concurrent
    /// branch execution across every in-flight request to `pool_size`.
    async fn run_branch<F: std::future::Future>(&self, fut: F) -> F::Output {
        let _permit = self.branch_pool.acquire().await.expect("semaphore never closed");
        fut.await
    }

    async fn grade_and_generate(
        &self,
        classification: &Classification,
        history: &[ConversationTurn],
        retriever_result: RetrieverResult,
        tx: mpsc::Sender<String>,
    ) -> Answer {
        let qualified: Vec<RankedCandidate> = match self
            .grader
            .grade(&classification.contextualized_question, &retriever_result.documents)
            .await
        {
            Ok(q) => q,
            Err(e) => {
                tracing::error!(error = %e, "grader reranker failed fatally");
                return Answer::error("Đã xảy ra lỗi khi xử lý yêu cầu. Vui lòng thử lại sau.");
            }
        };

        if qualified.is_empty() {
            return self
                .not_enough_info
                .respond(&classification.contextualized_question, tx)
                .await;
        }

        let input = GeneratorInput {
            question: &classification.contextualized_question,
            history,
            is_followup: classification.is_followup,
            passages: &qualified,
        };

        match self.generator.generate(input, tx).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                Answer::error("Đã xảy ra lỗi khi tạo câu trả lời. Vui lòng thử lại sau.")
            }
        }
    }
}
