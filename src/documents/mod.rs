//! Document Processing Module
//!
//! Handles page text extraction, embeddings, and retrieval for one document.

pub mod embeddings;
pub mod extractor;
pub mod retriever;

// Re-export key public types
pub use embeddings::{cosine_similarity, generate_embedding, Embedding, HashingEmbedder};
pub use extractor::{extract_text_from_pdf_by_page, ExtractError};
pub use retriever::{SearchResult, SimilarityIndex, DEFAULT_TOP_K};
