//! Vector-store adapter (Qdrant)
//!
//! Wraps the two logical collections the workflow reads from — documents and
//! FAQs — behind one client. Responsible for reconciling query-vector
//! dimension against each collection's declared dimension (zero-pad or
//! truncate) and for a cheap liveness probe the Classifier consults before
//! doing anything else.

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{SearchPointsBuilder, Value};
use qdrant_client::Qdrant;
use std::time::Duration;

use via_rag_core::SearchCandidate;

use crate::RagError;

/// Which logical collection a search targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Document,
    Faq,
}

#[derive(Debug, Clone)]
pub struct VectorStoreConfig {
    pub host: String,
    pub port: u16,
    pub document_collection: String,
    pub faq_collection: String,
    /// Upper bound on the liveness probe (§5: 2s).
    pub liveness_timeout: Duration,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6334,
            document_collection: "document_embeddings".to_string(),
            faq_collection: "faq_embeddings".to_string(),
            liveness_timeout: Duration::from_secs(2),
        }
    }
}

impl VectorStoreConfig {
    fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    fn collection_name(&self, collection: Collection) -> &str {
        match collection {
            Collection::Document => &self.document_collection,
            Collection::Faq => &self.faq_collection,
        }
    }

    /// Which payload field carries the text shown back to the caller, per §6.3.
    fn text_field(&self, collection: Collection) -> &'static str {
        match collection {
            Collection::Document => "description",
            Collection::Faq => "question",
        }
    }
}

pub struct VectorStoreAdapter {
    client: Qdrant,
    config: VectorStoreConfig,
}

impl VectorStoreAdapter {
    pub fn new(config: VectorStoreConfig) -> Result<Self, RagError> {
        let client = Qdrant::from_url(&config.url())
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// §5: liveness probe must complete within ~2s and never panic the caller.
    pub async fn is_live(&self) -> bool {
        tokio::time::timeout(self.config.liveness_timeout, self.client.health_check())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }

    /// Declared vector dimension of a collection's configured field, used to
    /// reconcile embedding-service output against what Qdrant actually holds.
    pub async fn collection_dimension(&self, collection: Collection) -> Result<usize, RagError> {
        let name = self.config.collection_name(collection);
        let info = self
            .client
            .collection_info(name)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        let config = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|vc| vc.config);

        use qdrant_client::qdrant::vectors_config::Config as VecCfg;
        match config {
            Some(VecCfg::Params(params)) => Ok(params.size as usize),
            _ => Err(RagError::VectorStore(format!(
                "collection {name} has no scalar vector params"
            ))),
        }
    }

    /// Zero-pad or truncate `vector` to exactly `target_dim`, logging when an
    /// adjustment is made (§3 invariant, §9 open question).
    fn reconcile(vector: &[f32], target_dim: usize) -> Vec<f32> {
        if vector.len() == target_dim {
            return vector.to_vec();
        }

        tracing::warn!(
            embedding_dim = vector.len(),
            collection_dim = target_dim,
            "reconciling query vector dimension"
        );

        let mut adjusted = vector.to_vec();
        adjusted.resize(target_dim, 0.0);
        adjusted
    }

    async fn search(
        &self,
        collection: Collection,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>, RagError> {
        let name = self.config.collection_name(collection);
        let target_dim = self.collection_dimension(collection).await?;
        let vector = Self::reconcile(query_embedding, target_dim);

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(name, vector, top_k as u64).with_payload(true),
            )
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        let text_field = self.config.text_field(collection);

        Ok(results
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        }
                        None => String::new(),
                    })
                    .unwrap_or_default();

                let payload_text = extract_string(&point.payload, text_field);

                SearchCandidate {
                    id,
                    payload_text,
                    similarity_score: point.score,
                }
            })
            .collect())
    }

    pub async fn search_documents(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchCandidate>, RagError> {
        self.search(Collection::Document, query_embedding, top_k).await
    }

    /// FAQ search needs both `question` and `answer` payload fields (§4.2's
    /// three scoring variants), so it returns the richer `FaqCandidate` rather
    /// than the generic `SearchCandidate`.
    pub async fn search_faq(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<FaqCandidate>, RagError> {
        let name = self.config.faq_collection.clone();
        let target_dim = self.collection_dimension(Collection::Faq).await?;
        let vector = Self::reconcile(query_embedding, target_dim);

        let results = self
            .client
            .search_points(SearchPointsBuilder::new(&name, vector, top_k as u64).with_payload(true))
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))?;

        Ok(results
            .result
            .into_iter()
            .map(|point| {
                let id = point
                    .id
                    .clone()
                    .map(|pid| match pid.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u)) => u,
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => {
                            n.to_string()
                        }
                        None => String::new(),
                    })
                    .unwrap_or_default();

                FaqCandidate {
                    id,
                    question: extract_string(&point.payload, "question"),
                    answer: extract_string(&point.payload, "answer"),
                    similarity_score: point.score,
                }
            })
            .collect())
    }
}

/// FAQ search hit carrying the full (question, answer) pair needed for the
/// three-variant cross-encoder scoring in §4.2.
#[derive(Debug, Clone)]
pub struct FaqCandidate {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub similarity_score: f32,
}

fn extract_string(
    payload: &std::collections::HashMap<String, Value>,
    field: &str,
) -> String {
    payload
        .get(field)
        .and_then(|v| match &v.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconcile_pads_short_vector() {
        let v = vec![1.0, 2.0, 3.0];
        let out = VectorStoreAdapter::reconcile(&v, 5);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn reconcile_truncates_long_vector() {
        let v = vec![1.0, 2.0, 3.0, 4.0];
        let out = VectorStoreAdapter::reconcile(&v, 2);
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn reconcile_is_noop_when_dims_match() {
        let v = vec![1.0, 2.0];
        let out = VectorStoreAdapter::reconcile(&v, 2);
        assert_eq!(out, v);
    }
}
