//! Embeddings
//!
//! Vector type, similarity metric, and a local embedder using feature
//! hashing. The hashing embedder needs no network and no vocabulary: the
//! same text always produces the same vector regardless of what else has
//! been embedded.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::provider::{EmbeddingProvider, ProviderError};

/// Dimensionality of the hashing embedder's vectors.
pub const HASHING_DIM: usize = 256;

/// Embedding vector
pub type Embedding = Vec<f32>;

/// Local embedding provider backed by [`generate_embedding`]
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingEmbedder;

impl EmbeddingProvider for HashingEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        Ok(texts.iter().map(|t| generate_embedding(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, ProviderError> {
        Ok(generate_embedding(text))
    }
}

/// Hash a token to a bucket index in `[0, HASHING_DIM)`.
fn hash_token(token: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    token.hash(&mut hasher);
    (hasher.finish() as usize) % HASHING_DIM
}

/// Generate an embedding for text using feature hashing.
///
/// Tokens are split on whitespace, stripped of surrounding punctuation and
/// lowercased, then hashed into a term-frequency vector which is
/// L2-normalized. Text with no tokens maps to the zero vector.
pub fn generate_embedding(text: &str) -> Embedding {
    let tokens: Vec<&str> = text.split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .collect();

    let mut tf = vec![0.0f32; HASHING_DIM];
    if tokens.is_empty() {
        return tf;
    }

    for token in &tokens {
        let idx = hash_token(&token.to_lowercase());
        tf[idx] += 1.0;
    }

    // L2 normalize
    let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut tf {
            *x /= norm;
        }
    }

    tf
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_embedding() {
        let embedding = generate_embedding("Pension rate is 2.5%.");
        assert_eq!(embedding.len(), HASHING_DIM);
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_same_text_same_vector() {
        let page = "Het opbouwpercentage bedraagt 1,875% per dienstjaar.";
        let before = generate_embedding(page);
        generate_embedding("Partnerpensioen op risicobasis");
        assert_eq!(generate_embedding(page), before);
    }

    #[test]
    fn test_shared_terms_score_higher() {
        let question = generate_embedding("Wat is het opbouwpercentage?");
        let related = generate_embedding("Het opbouwpercentage bedraagt 1,875%.");
        let unrelated = generate_embedding("Ingangsdatum 1 januari 2024.");
        assert!(cosine_similarity(&question, &related) > cosine_similarity(&question, &unrelated));
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        assert_eq!(generate_embedding("Pension, RATE!"), generate_embedding("pension rate"));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedding = generate_embedding("  ... ");
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_cosine_similarity_bounds() {
        let page = generate_embedding("Franchise 17.545 euro");
        assert!((cosine_similarity(&page, &page) - 1.0).abs() < 1e-5);
        assert!(cosine_similarity(&[0.0, 2.0], &[3.0, 0.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 1.0], &[-1.0, -1.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_mismatched() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn test_hashing_embedder_batch() {
        let texts = vec!["Pension rate".to_string(), "Effective 2024".to_string()];
        let embeddings = HashingEmbedder.embed_documents(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        assert_eq!(embeddings[0], HashingEmbedder.embed_query("pension rate").await.unwrap());
    }
}
