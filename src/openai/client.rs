//! OpenAI HTTP Client
//!
//! Direct HTTP client for the OpenAI-compatible REST API: batch embeddings
//! and streaming chat completions. Uses reqwest instead of third-party
//! wrapper crates for stability and full API control.

use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

use super::stream::answer_stream_from_chunks;
use crate::config::Settings;
use crate::context::{count_tokens, split_by_token_limit};
use crate::documents::embeddings::Embedding;
use crate::provider::{AnswerStream, CompletionProvider, EmbeddingProvider, ProviderError};

/// Inputs per `/embeddings` request
pub const EMBEDDING_BATCH_SIZE: usize = 1000;

/// Longest input the embedding model accepts
pub const MAX_EMBEDDING_INPUT_TOKENS: u32 = 8191;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// OpenAI HTTP client
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    temperature: f32,
    request_timeout: Duration,
    batch_size: usize,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl OpenAiClient {
    /// Build a client from settings. Requires an API key.
    pub fn from_settings(settings: &Settings) -> Result<Self, ProviderError> {
        let api_key = settings.openai_api_key.clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::MissingApiKey)?;

        // No whole-request timeout on the client: answers stream for as long
        // as the model writes. Embedding calls set their own.
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Http(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            temperature: settings.temperature,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
            batch_size: EMBEDDING_BATCH_SIZE,
        })
    }

    /// Embed texts, one vector per input in input order.
    ///
    /// Inputs longer than the model accepts are split on word boundaries and
    /// their piece vectors averaged, weighted by token count. Pieces go out
    /// in batches of at most `EMBEDDING_BATCH_SIZE`.
    pub async fn embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut pieces = Vec::with_capacity(texts.len());
        let mut owners = Vec::with_capacity(texts.len());
        for (owner, text) in texts.iter().enumerate() {
            for piece in split_by_token_limit(text, MAX_EMBEDDING_INPUT_TOKENS) {
                owners.push((owner, count_tokens(&piece).max(1)));
                pieces.push(piece);
            }
        }
        if pieces.len() > texts.len() {
            info!(texts = texts.len(), pieces = pieces.len(), "Split long inputs for embedding");
        }

        let mut vectors = Vec::with_capacity(pieces.len());
        for batch in pieces.chunks(self.batch_size.max(1)) {
            vectors.extend(self.embed_batch(batch).await?);
        }

        Ok(combine_pieces(texts.len(), &owners, vectors))
    }

    /// One `/embeddings` request
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });

        debug!(model = %self.embedding_model, count = texts.len(), "Requesting embeddings");
        let resp = self.http.post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.request_timeout)
            .json(&body)
            .send().await?;
        let resp = check_status(resp, "Embeddings").await?;

        let text = resp.text().await?;
        let mut parsed: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::Deserialize(e.to_string()))?;

        if parsed.data.len() != texts.len() {
            return Err(ProviderError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }

        parsed.data.sort_by_key(|d| d.index);
        info!(model = %self.embedding_model, count = parsed.data.len(), "Embedded texts");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Start a streaming chat completion for a single user message
    pub async fn stream_chat(&self, prompt: &str) -> Result<AnswerStream, ProviderError> {
        let body = build_chat_request_body(&self.chat_model, prompt, self.temperature);

        debug!(model = %self.chat_model, "Requesting chat completion stream");
        let resp = self.http.post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send().await?;
        let resp = check_status(resp, "Chat completion").await?;

        info!(model = %self.chat_model, "Chat completion stream started");
        let chunks = futures::stream::try_unfold(resp, next_chunk);
        Ok(answer_stream_from_chunks(chunks))
    }
}

impl EmbeddingProvider for OpenAiClient {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, ProviderError> {
        self.embeddings(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Embedding, ProviderError> {
        self.embeddings(&[text.to_string()]).await?
            .pop()
            .ok_or_else(|| ProviderError::InvalidResponse("no embedding for query".to_string()))
    }
}

impl CompletionProvider for OpenAiClient {
    async fn stream_completion(&self, prompt: &str) -> Result<AnswerStream, ProviderError> {
        self.stream_chat(prompt).await
    }
}

/// Fold piece vectors back into one vector per owner.
///
/// `owners[i]` is `(owner index, token weight)` of `vectors[i]`. Owners with a
/// single piece keep its vector. Others get the weighted mean, L2-normalized.
fn combine_pieces(count: usize, owners: &[(usize, u32)], vectors: Vec<Embedding>) -> Vec<Embedding> {
    let mut grouped: Vec<Vec<(u32, Embedding)>> = vec![Vec::new(); count];
    for (&(owner, weight), vector) in owners.iter().zip(vectors) {
        grouped[owner].push((weight, vector));
    }

    grouped.into_iter()
        .map(|mut pieces| {
            if pieces.len() <= 1 {
                return pieces.pop().map(|(_, vector)| vector).unwrap_or_default();
            }

            let dim = pieces[0].1.len();
            let total: f32 = pieces.iter().map(|(weight, _)| *weight as f32).sum();
            let mut mean = vec![0.0f32; dim];
            for (weight, vector) in &pieces {
                for (acc, x) in mean.iter_mut().zip(vector) {
                    *acc += x * *weight as f32 / total;
                }
            }

            let norm: f32 = mean.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut mean {
                    *x /= norm;
                }
            }
            mean
        })
        .collect()
}

/// Request body for a streamed single-message chat completion
pub fn build_chat_request_body(model: &str, prompt: &str, temperature: f32) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "user", "content": prompt }
        ],
        "temperature": temperature,
        "stream": true,
    })
}

async fn next_chunk(mut resp: Response) -> Result<Option<(Vec<u8>, Response)>, ProviderError> {
    Ok(resp.chunk().await?.map(|bytes| (bytes.to_vec(), resp)))
}

/// Turn a non-success response into [`ProviderError::Api`].
async fn check_status(resp: Response, what: &str) -> Result<Response, ProviderError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let text = resp.text().await.unwrap_or_default();
    error!(status = %status, what = what, "Provider HTTP error");
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(|m| m.to_string()))
        .unwrap_or(text);
    Err(ProviderError::Api { status: status.as_u16(), message })
}
