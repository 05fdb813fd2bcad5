//! Streaming decoder (Bytes -> ProviderChunk)
//!
//! Splits the upstream body into lines, keeps only `data:` lines, and maps each
//! payload to at most two [`ProviderChunk`]s. Lines may arrive split across
//! network reads; partial lines stay buffered until their newline shows up.

use crate::types::events::{ProviderChunk, DONE_SENTINEL};
use crate::BoxStream;
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Longest line kept in memory while waiting for its newline.
pub const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;

/// Line-oriented SSE decoder for chat-completions chunks:
/// - strips `prefix` (default "data: "; "data:" without the space is accepted too)
/// - stops on `done_signal` (default "[DONE]")
/// - stops after the first chunk carrying a finish reason
/// - drops lines longer than `max_line_len` as malformed
#[derive(Debug, Clone)]
pub struct SseLineDecoder {
    prefix: String,
    done_signal: String,
    max_line_len: usize,
}

impl Default for SseLineDecoder {
    fn default() -> Self {
        Self::new(None, None)
    }
}

struct DecodeState {
    input: BoxStream<'static, Bytes>,
    buf: BytesMut,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
    pending: VecDeque<ProviderChunk>,
    finished: bool,
}

impl SseLineDecoder {
    pub fn new(prefix: Option<String>, done_signal: Option<String>) -> Self {
        Self {
            prefix: prefix.unwrap_or_else(|| "data: ".to_string()),
            done_signal: done_signal.unwrap_or_else(|| DONE_SENTINEL.to_string()),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Decode one line into zero or more chunks. Malformed payloads are logged and skipped.
    pub fn decode_line(&self, line: &str) -> Vec<ProviderChunk> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        let payload = if let Some(rest) = line.strip_prefix(self.prefix.as_str()) {
            rest
        } else if let Some(rest) = line.strip_prefix("data:") {
            rest.trim_start()
        } else {
            debug!(line, "ignoring non-data line");
            return Vec::new();
        };

        if payload.trim() == self.done_signal {
            return vec![ProviderChunk::Done];
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => chunks_from_value(&value),
            Err(e) => {
                warn!(error = %e, payload, "skipping unparseable upstream chunk");
                Vec::new()
            }
        }
    }

    /// Decode a byte stream lazily. Transport errors are passed through and end the stream.
    pub fn decode_stream(
        &self,
        input: BoxStream<'static, Bytes>,
    ) -> BoxStream<'static, ProviderChunk> {
        let decoder = self.clone();
        let state = DecodeState {
            input,
            buf: BytesMut::new(),
            scanned: 0,
            discarding: false,
            pending: VecDeque::new(),
            finished: false,
        };

        let stream = stream::unfold(state, move |mut state| {
            let decoder = decoder.clone();
            async move {
                loop {
                    if let Some(chunk) = state.pending.pop_front() {
                        return Some((Ok(chunk), state));
                    }
                    if state.finished {
                        return None;
                    }

                    // Emit every complete line already buffered.
                    if let Some(offset) = state.buf[state.scanned..].iter().position(|b| *b == b'\n') {
                        let pos = state.scanned + offset;
                        let line = state.buf.split_to(pos + 1);
                        state.scanned = 0;
                        if state.discarding {
                            state.discarding = false;
                            continue;
                        }
                        let text = String::from_utf8_lossy(&line[..pos]);
                        decoder.enqueue(&text, &mut state);
                        continue;
                    }
                    state.scanned = state.buf.len();

                    if state.buf.len() > decoder.max_line_len {
                        if !state.discarding {
                            warn!(
                                max_line_len = decoder.max_line_len,
                                "dropping oversized upstream line"
                            );
                        }
                        state.discarding = true;
                        state.buf.clear();
                        state.scanned = 0;
                    }

                    match state.input.next().await {
                        Some(Ok(bytes)) => state.buf.extend_from_slice(&bytes),
                        Some(Err(e)) => {
                            state.finished = true;
                            return Some((Err(e), state));
                        }
                        None => {
                            // EOF: a trailing line without newline is still a line.
                            let rest = state.buf.split();
                            if !rest.is_empty() && !state.discarding {
                                let text = String::from_utf8_lossy(&rest).into_owned();
                                decoder.enqueue(&text, &mut state);
                            }
                            state.finished = true;
                        }
                    }
                }
            }
        });

        Box::pin(stream)
    }

    fn enqueue(&self, line: &str, state: &mut DecodeState) {
        for chunk in self.decode_line(line) {
            let terminal = chunk.is_terminal();
            state.pending.push_back(chunk);
            if terminal {
                // Anything after the terminal chunk is ignored.
                state.finished = true;
                state.buf.clear();
                return;
            }
        }
    }
}

/// Extract the first choice's content delta and finish reason.
fn chunks_from_value(value: &Value) -> Vec<ProviderChunk> {
    let mut out = Vec::new();
    let choice = match value.pointer("/choices/0") {
        Some(choice) => choice,
        None => return out,
    };

    if let Some(content) = choice.pointer("/delta/content").and_then(Value::as_str) {
        if !content.is_empty() {
            out.push(ProviderChunk::Delta(content.to_string()));
        }
    }
    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        out.push(ProviderChunk::Finished(reason.to_string()));
    }
    out
}
