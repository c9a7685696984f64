//! OpenAI-compatible API Integration
//!
//! Embeddings and streaming chat completions over HTTP.

pub mod client;
pub mod stream;

pub use client::OpenAiClient;
pub use stream::{answer_stream_from_chunks, SseDecoder, SseEvent};
