//! Retrieved Context
//!
//! The passages retrieved for one question and the single context string
//! the language model is grounded on.

pub mod tokens;

use serde::{Deserialize, Serialize};

use crate::documents::retriever::SearchResult;

pub use tokens::{count_tokens, estimate_tokens_quick, exceeds_token_limit, split_by_token_limit};

/// Passages retrieved for one question, best match first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedContext {
    pub passages: Vec<SearchResult>,
}

impl RetrievedContext {
    pub fn new(passages: Vec<SearchResult>) -> Self {
        Self { passages }
    }

    /// Passage texts in retrieval order
    pub fn texts(&self) -> Vec<&str> {
        self.passages.iter().map(|p| p.content.as_str()).collect()
    }

    /// Passages joined with a single space, verbatim
    pub fn document_text(&self) -> String {
        join_passages(&self.texts())
    }

    pub fn token_count(&self) -> u32 {
        count_tokens(&self.document_text())
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// Join passages with a single space separator.
pub fn join_passages<S: AsRef<str>>(passages: &[S]) -> String {
    passages.iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(position: usize, content: &str) -> SearchResult {
        SearchResult { position, content: content.to_string(), score: 1.0 }
    }

    #[test]
    fn test_join_passages_verbatim() {
        let passages = ["Pension rate is 2.5%.\n", "  Effective 2024."];
        assert_eq!(join_passages(&passages), "Pension rate is 2.5%.\n   Effective 2024.");
    }

    #[test]
    fn test_join_single_and_empty() {
        assert_eq!(join_passages(&["alleen"]), "alleen");
        assert_eq!(join_passages::<&str>(&[]), "");
    }

    #[test]
    fn test_retrieved_context() {
        let context = RetrievedContext::new(vec![result(1, "tweede"), result(0, "eerste")]);
        assert_eq!(context.texts(), vec!["tweede", "eerste"]);
        assert_eq!(context.document_text(), "tweede eerste");
        assert!(context.token_count() > 0);
        assert!(!context.is_empty());
    }
}
