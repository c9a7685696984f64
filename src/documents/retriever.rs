//! Document Retrieval
//!
//! Ephemeral similarity index over a document's page texts. Built fresh for
//! each question, searched once, then dropped.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::embeddings::{cosine_similarity, Embedding};
use crate::provider::{EmbeddingProvider, ProviderError};

/// Passages returned per question unless configured otherwise
pub const DEFAULT_TOP_K: usize = 4;

/// Search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Position in the page-text sequence the index was built from
    pub position: usize,
    pub content: String,
    pub score: f32,
}

/// In-memory index of texts and their embeddings
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    entries: Vec<(String, Embedding)>,
}

impl SimilarityIndex {
    /// Embed every text with one provider call and index the results.
    pub async fn from_texts<P>(texts: &[String], provider: &P) -> Result<Self, ProviderError>
    where
        P: EmbeddingProvider,
    {
        let embeddings = provider.embed_documents(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let entries: Vec<(String, Embedding)> = texts.iter().cloned().zip(embeddings).collect();
        info!(entries = entries.len(), "Built similarity index");
        Ok(Self { entries })
    }

    /// Build from precomputed embeddings
    pub fn from_embeddings(entries: Vec<(String, Embedding)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embed the query and return the `top_k` closest texts.
    pub async fn search<P>(
        &self,
        query: &str,
        provider: &P,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, ProviderError>
    where
        P: EmbeddingProvider,
    {
        let query_embedding = provider.embed_query(query).await?;
        Ok(self.search_by_embedding(&query_embedding, top_k))
    }

    /// Rank every entry by cosine similarity, highest first.
    ///
    /// Equal scores keep their original order. At most `top_k` results.
    pub fn search_by_embedding(&self, query_embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = self.entries.iter()
            .enumerate()
            .map(|(position, (content, embedding))| SearchResult {
                position,
                content: content.clone(),
                score: cosine_similarity(query_embedding, embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);

        debug!(
            returned = results.len(),
            best = results.first().map(|r| r.score).unwrap_or(0.0),
            "Similarity search"
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::embeddings::HashingEmbedder;

    /// Returns a fixed number of vectors regardless of input
    struct ShortEmbedder;

    impl EmbeddingProvider for ShortEmbedder {
        async fn embed_documents(&self, _texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
            Ok(vec![vec![1.0, 0.0]])
        }

        async fn embed_query(&self, _text: &str) -> Result<Embedding, ProviderError> {
            Ok(vec![1.0, 0.0])
        }
    }

    #[test]
    fn test_search_orders_by_score() {
        let index = SimilarityIndex::from_embeddings(vec![
            ("b".to_string(), vec![0.0, 1.0, 0.0]),
            ("a".to_string(), vec![1.0, 0.0, 0.0]),
            ("c".to_string(), vec![0.7, 0.7, 0.0]),
        ]);

        let results = index.search_by_embedding(&[1.0, 0.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "a");
        assert_eq!(results[0].position, 1);
        assert_eq!(results[1].content, "c");
        assert!(results[0].score >= results[1].score);
    }

    #[test]
    fn test_search_ties_keep_page_order() {
        let index = SimilarityIndex::from_embeddings(vec![
            ("first".to_string(), vec![1.0, 0.0]),
            ("second".to_string(), vec![1.0, 0.0]),
            ("third".to_string(), vec![1.0, 0.0]),
        ]);
        let results = index.search_by_embedding(&[1.0, 0.0], 3);
        let order: Vec<_> = results.iter().map(|r| r.position).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_search_returns_at_most_k() {
        let index = SimilarityIndex::from_embeddings(vec![
            ("only".to_string(), vec![1.0, 0.0]),
        ]);
        assert_eq!(index.search_by_embedding(&[0.0, 1.0], DEFAULT_TOP_K).len(), 1);
    }

    #[tokio::test]
    async fn test_from_texts_with_hashing_embedder() {
        let pages = vec![
            "Pension rate is 2.5%.".to_string(),
            "Effective 2024.".to_string(),
        ];
        let index = SimilarityIndex::from_texts(&pages, &HashingEmbedder).await.unwrap();
        assert_eq!(index.len(), 2);

        let results = index.search("What is the pension rate?", &HashingEmbedder, DEFAULT_TOP_K)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "Pension rate is 2.5%.");
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn test_from_texts_rejects_count_mismatch() {
        let pages = vec!["one".to_string(), "two".to_string()];
        let result = SimilarityIndex::from_texts(&pages, &ShortEmbedder).await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
