//! Question Pipeline
//!
//! One self-contained request per user question: resolve the document,
//! extract its pages, index them, retrieve the best passages, and start
//! streaming the answer. Nothing is kept between requests.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use ulid::Ulid;

use crate::catalog::{Catalog, CatalogError, Document};
use crate::composer::{AnswerComposer, ComposedAnswer};
use crate::config::{EmbeddingBackend, Settings};
use crate::context::RetrievedContext;
use crate::documents::embeddings::{Embedding, HashingEmbedder};
use crate::documents::extractor::{extract_text_from_pdf_by_page, ExtractError};
use crate::documents::retriever::SimilarityIndex;
use crate::openai::OpenAiClient;
use crate::provider::{AnswerStream, CompletionProvider, EmbeddingProvider, ProviderError};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Question is empty")]
    EmptyQuestion,
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl PipelineError {
    /// Short banner shown to the user
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::EmptyQuestion => "Stel eerst een vraag.".to_string(),
            PipelineError::Catalog(e) => e.user_message(),
            PipelineError::Extract(e) => e.user_message(),
            PipelineError::Provider(e) => e.user_message(),
        }
    }
}

/// One question about one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRequest {
    /// Correlates the log lines of one request
    pub id: String,
    pub category: String,
    pub document: String,
    pub question: String,
}

impl QuestionRequest {
    pub fn new(category: impl Into<String>, document: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: Ulid::new().to_string(),
            category: category.into(),
            document: document.into(),
            question: question.into(),
        }
    }
}

/// Retrieval results plus the answer stream, ready to render
#[derive(Debug)]
pub struct PreparedAnswer {
    pub request_id: String,
    pub document: Document,
    pub context: RetrievedContext,
    pub prompt_tokens: u32,
    pub stream: AnswerStream,
}

/// Embedding provider chosen at runtime from settings
#[derive(Debug, Clone)]
pub enum Embedder {
    OpenAi(OpenAiClient),
    Hashing(HashingEmbedder),
}

impl Embedder {
    pub fn for_backend(backend: EmbeddingBackend, client: &OpenAiClient) -> Self {
        match backend {
            EmbeddingBackend::Openai => Embedder::OpenAi(client.clone()),
            EmbeddingBackend::Hashing => Embedder::Hashing(HashingEmbedder),
        }
    }
}

impl EmbeddingProvider for Embedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        match self {
            Embedder::OpenAi(client) => client.embed_documents(texts).await,
            Embedder::Hashing(hashing) => hashing.embed_documents(texts).await,
        }
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, ProviderError> {
        match self {
            Embedder::OpenAi(client) => client.embed_query(text).await,
            Embedder::Hashing(hashing) => hashing.embed_query(text).await,
        }
    }
}

/// Runs question requests against a catalog
pub struct Pipeline<E, C> {
    catalog: Catalog,
    embedder: E,
    composer: AnswerComposer<C>,
    top_k: usize,
}

impl Pipeline<Embedder, OpenAiClient> {
    /// Wire the pipeline to the configured providers.
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let client = OpenAiClient::from_settings(settings)?;
        let embedder = Embedder::for_backend(settings.embedding_backend, &client);
        Ok(Pipeline::new(Catalog::new(&settings.catalog_root), embedder, client, settings.top_k))
    }
}

impl<E, C> Pipeline<E, C>
where
    E: EmbeddingProvider,
    C: CompletionProvider,
{
    pub fn new(catalog: Catalog, embedder: E, completion: C, top_k: usize) -> Self {
        Self {
            catalog,
            embedder,
            composer: AnswerComposer::new(completion),
            top_k,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn composer(&self) -> &AnswerComposer<C> {
        &self.composer
    }

    /// Run one request up to the point where the answer starts streaming.
    ///
    /// Catalog and extraction failures end the request before any provider
    /// call. Provider failures are returned as they are, without retry.
    pub async fn answer(&self, request: &QuestionRequest) -> Result<PreparedAnswer, PipelineError> {
        if request.question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }

        info!(
            request_id = %request.id,
            category = %request.category,
            document = %request.document,
            "Processing question"
        );

        let document = self.catalog.resolve_document(&request.category, &request.document)?;
        let pages = extract_text_from_pdf_by_page(&document.path)?;
        info!(request_id = %request.id, pages = pages.len(), "Extracted document text");

        let index = SimilarityIndex::from_texts(&pages, &self.embedder).await?;
        let passages = index.search(&request.question, &self.embedder, self.top_k).await?;
        let context = RetrievedContext::new(passages);
        info!(
            request_id = %request.id,
            passages = context.passages.len(),
            context_tokens = context.token_count(),
            "Retrieved context"
        );

        let ComposedAnswer { prompt_tokens, stream } =
            self.composer.answer(&context.texts(), &request.question).await?;

        Ok(PreparedAnswer {
            request_id: request.id.clone(),
            document,
            context,
            prompt_tokens,
            stream,
        })
    }
}
