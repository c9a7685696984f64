//! Streaming response decoding.
//!
//! Chat completions stream as server-sent events: `data: {json}` lines,
//! terminated by `data: [DONE]`. This module turns raw body chunks into
//! answer text fragments.

use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

use crate::provider::{AnswerStream, ProviderError};

/// One decoded event line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Line splitter for an event stream.
///
/// Bytes are buffered until a full line is available, so multi-byte
/// characters split across chunks decode intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed a body chunk and return the events completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(idx) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=idx).collect();
            if let Some(event) = parse_line(&String::from_utf8_lossy(&line)) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final line that had no trailing newline.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&line))
    }
}

/// Comments, `event:`/`id:` fields and blank lines carry no data.
fn parse_line(line: &str) -> Option<SseEvent> {
    let data = line.trim().strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        Some(SseEvent::Done)
    } else if data.is_empty() {
        None
    } else {
        Some(SseEvent::Data(data.to_string()))
    }
}

/// Extract the text delta from one Chat Completions stream payload.
///
/// Returns `Ok(None)` for payloads without text (role headers, finish
/// markers). An `error` object in the payload is a provider error.
pub fn extract_text_from_stream_chunk(data: &str) -> Result<Option<String>, ProviderError> {
    let json: Value = serde_json::from_str(data)
        .map_err(|e| ProviderError::Deserialize(format!("{}: {}", e, data)))?;

    if let Some(error) = json.get("error") {
        let message = error.get("message")
            .and_then(|m| m.as_str())
            .map(|m| m.to_string())
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::InvalidResponse(format!("stream error: {}", message)));
    }

    let Some(content) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("delta"))
        .and_then(|d| d.get("content"))
    else {
        return Ok(None);
    };

    if let Some(text) = content.as_str() {
        return Ok((!text.is_empty()).then(|| text.to_string()));
    }

    if let Some(parts) = content.as_array() {
        let mut buf = String::new();
        for part in parts {
            if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                buf.push_str(text);
            } else if let Some(text) = part.as_str() {
                buf.push_str(text);
            }
        }
        return Ok((!buf.is_empty()).then_some(buf));
    }

    Ok(None)
}

struct DecodeState {
    chunks: BoxStream<'static, Result<Vec<u8>, ProviderError>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

/// Turn a stream of body chunks into an [`AnswerStream`].
pub fn answer_stream_from_chunks<S>(chunks: S) -> AnswerStream
where
    S: Stream<Item = Result<Vec<u8>, ProviderError>> + Send + 'static,
{
    let state = DecodeState {
        chunks: chunks.boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };
    AnswerStream::new(futures::stream::try_unfold(state, next_fragment))
}

async fn next_fragment(
    mut state: DecodeState,
) -> Result<Option<(String, DecodeState)>, ProviderError> {
    loop {
        if let Some(fragment) = state.pending.pop_front() {
            return Ok(Some((fragment, state)));
        }
        if state.finished {
            return Ok(None);
        }

        let events = match state.chunks.next().await {
            Some(chunk) => state.decoder.push(&chunk?),
            None => {
                debug!("Answer stream ended without [DONE]");
                state.finished = true;
                state.decoder.finish().into_iter().collect()
            }
        };

        for event in events {
            match event {
                SseEvent::Done => {
                    debug!("Answer stream DONE");
                    state.finished = true;
                    break;
                }
                SseEvent::Data(data) => {
                    if let Some(text) = extract_text_from_stream_chunk(&data)? {
                        state.pending.push_back(text);
                    }
                }
            }
        }
    }
}
