// Pensionbot Library
// Exports core modules for use by the CLI binary and integration tests

pub mod catalog;
pub mod composer;
pub mod config;
pub mod context;
pub mod documents;
pub mod openai;
pub mod pipeline;
pub mod provider;

// Re-export commonly used types for CLI
pub use catalog::{Catalog, CatalogError, Document};
pub use composer::{compose_prompt, fill_template, AnswerComposer, ComposedAnswer, ANSWER_TEMPLATE};
pub use config::{default_config_path, ConfigError, EmbeddingBackend, Settings};
pub use context::{count_tokens, join_passages, RetrievedContext};

pub use documents::{
    cosine_similarity, extract_text_from_pdf_by_page, generate_embedding,
    Embedding, ExtractError, HashingEmbedder, SearchResult, SimilarityIndex, DEFAULT_TOP_K,
};

pub use openai::OpenAiClient;
pub use pipeline::{Embedder, Pipeline, PipelineError, PreparedAnswer, QuestionRequest};
pub use provider::{AnswerStream, CompletionProvider, EmbeddingProvider, ProviderError};
