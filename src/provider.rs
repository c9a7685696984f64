//! External model providers
//!
//! The seams between the pipeline and the services it calls: an embedding
//! provider (text to vector) and a streaming completion provider
//! (prompt to answer fragments).

use futures::stream::{Stream, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

use crate::documents::embeddings::Embedding;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No API key configured")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.to_string())
    }
}

impl ProviderError {
    /// Short banner shown to the user
    pub fn user_message(&self) -> String {
        match self {
            ProviderError::MissingApiKey => {
                "Geen API-sleutel ingesteld. Zet OPENAI_API_KEY of vul openai_api_key in.".to_string()
            }
            other => format!("Fout bij de taalmodeldienst: {}", other),
        }
    }
}

/// Text to fixed-dimension vectors
pub trait EmbeddingProvider {
    /// One vector per input text, in input order.
    fn embed_documents(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Embedding>, ProviderError>> + Send;

    fn embed_query(&self, text: &str) -> impl Future<Output = Result<Embedding, ProviderError>> + Send;
}

/// Prompt to a stream of answer fragments
pub trait CompletionProvider {
    /// Submit `prompt` and return the answer as it is generated.
    ///
    /// Request-level failures (auth, bad model) are the `Err`. Failures after
    /// streaming has started arrive as `Err` items of the stream.
    fn stream_completion(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<AnswerStream, ProviderError>> + Send;
}

/// Forward-only stream of answer text fragments.
///
/// Consuming it drives the network read. It cannot be restarted.
pub struct AnswerStream {
    inner: Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>,
}

impl AnswerStream {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
    {
        Self { inner: Box::pin(stream) }
    }

    /// A stream over already-known fragments
    pub fn from_fragments<I>(fragments: I) -> Self
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: Send + 'static,
    {
        Self::new(futures::stream::iter(fragments.into_iter().map(Ok)))
    }

    /// Drain the stream into one string, stopping at the first error.
    pub async fn collect_text(mut self) -> Result<String, ProviderError> {
        let mut answer = String::new();
        while let Some(fragment) = self.next().await {
            answer.push_str(&fragment?);
        }
        Ok(answer)
    }
}

impl Stream for AnswerStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream").finish_non_exhaustive()
    }
}
