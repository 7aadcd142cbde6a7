//! Upstream chat completion stream to Anthropic Messages SSE translation.
//!
//! [`AnthropicStreamTranslator`] is a per-request state machine: it is fed
//! decoded upstream [`StreamEvent`]s and returns the Anthropic events each one
//! produces. Block indices are handed out in first-seen order across text and
//! tool blocks, and every block that was started is stopped exactly once.
//!
//! [`pump_anthropic_stream`] drives a translator over an upstream stream and
//! writes framed events into a channel consumed by the HTTP response.

use std::collections::{BTreeSet, HashMap};

use copilot_client::api::models::{ChatCompletionStreamChunk, StreamEvent, StreamToolCall};
use copilot_client::CopilotError;
use futures_util::{Stream, StreamExt};
use log::{debug, error, info};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::conversion::map_stop_reason;

/// One server-sent event: the `event:` name and its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: &'static str,
    pub data: Value,
}

impl SseEvent {
    fn new(event: &'static str, data: Value) -> Self {
        Self { event, data }
    }

    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

/// Output token estimate for one emitted fragment.
fn estimate_fragment_tokens(text: &str) -> u32 {
    let chars = text.chars().count() as u32;
    ((chars + 3) / 4).max(1)
}

#[derive(Debug)]
struct ToolBlockState {
    id: String,
    has_upstream_id: bool,
    name: String,
    arguments: String,
}

/// Block bookkeeping for one in-flight response.
#[derive(Debug, Default)]
pub struct TranslatorState {
    next_block_index: usize,
    text_block_index: Option<usize>,
    /// upstream tool-call index -> Anthropic block index
    tool_block_indices: HashMap<u32, usize>,
    tool_blocks: HashMap<usize, ToolBlockState>,
    started_tool_blocks: BTreeSet<usize>,
}

impl TranslatorState {
    fn assign_block_index(&mut self) -> usize {
        let index = self.next_block_index;
        self.next_block_index += 1;
        index
    }
}

pub struct AnthropicStreamTranslator {
    state: TranslatorState,
    request_id: String,
    message_id: String,
    model: String,
    input_tokens: u32,
    output_tokens: u32,
    stop_reason: &'static str,
    finished: bool,
}

impl AnthropicStreamTranslator {
    /// `model` is the model name the client asked for; `input_tokens` is the
    /// caller's estimate reported in `message_start`.
    pub fn new(request_id: impl Into<String>, model: impl Into<String>, input_tokens: u32) -> Self {
        let request_id = request_id.into();
        let suffix = Uuid::new_v4().simple().to_string();
        let message_id = format!("msg_stream_{}_{}", request_id, &suffix[..8]);
        Self {
            state: TranslatorState::default(),
            request_id,
            message_id,
            model: model.into(),
            input_tokens,
            output_tokens: 0,
            stop_reason: "end_turn",
            finished: false,
        }
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn output_tokens(&self) -> u32 {
        self.output_tokens
    }

    /// True once a finish reason or the `[DONE]` marker has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// `message_start` followed by `ping`.
    pub fn start(&self) -> Vec<SseEvent> {
        vec![
            SseEvent::new(
                "message_start",
                json!({
                    "type": "message_start",
                    "message": {
                        "id": self.message_id,
                        "type": "message",
                        "role": "assistant",
                        "model": self.model,
                        "content": [],
                        "stop_reason": null,
                        "stop_sequence": null,
                        "usage": {
                            "input_tokens": self.input_tokens,
                            "output_tokens": 0
                        }
                    }
                }),
            ),
            SseEvent::new("ping", json!({ "type": "ping" })),
        ]
    }

    pub fn handle_event(&mut self, event: &StreamEvent) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        match event {
            StreamEvent::Done => {
                self.finished = true;
                Vec::new()
            }
            StreamEvent::Chunk(chunk) => self.handle_chunk(chunk),
        }
    }

    fn handle_chunk(&mut self, chunk: &ChatCompletionStreamChunk) -> Vec<SseEvent> {
        let mut output = Vec::new();
        // Only the first choice is translated
        let Some(choice) = chunk.choices.first() else {
            return output;
        };

        if let Some(content) = choice.delta.content.as_deref().filter(|c| !c.is_empty()) {
            self.handle_text_delta(content, &mut output);
        }

        for tool_call in choice.delta.tool_calls.as_deref().unwrap_or_default() {
            self.handle_tool_call(tool_call, &mut output);
        }

        if let Some(reason) = choice.finish_reason.as_deref() {
            self.stop_reason = map_stop_reason(Some(reason));
            if reason == "tool_calls" {
                self.stop_reason = "tool_use";
            }
            self.finished = true;
        }

        output
    }

    fn handle_text_delta(&mut self, content: &str, output: &mut Vec<SseEvent>) {
        self.output_tokens += estimate_fragment_tokens(content);

        let index = match self.state.text_block_index {
            Some(index) => index,
            None => {
                let index = self.state.assign_block_index();
                self.state.text_block_index = Some(index);
                output.push(SseEvent::new(
                    "content_block_start",
                    json!({
                        "type": "content_block_start",
                        "index": index,
                        "content_block": { "type": "text", "text": "" }
                    }),
                ));
                index
            }
        };

        output.push(SseEvent::new(
            "content_block_delta",
            json!({
                "type": "content_block_delta",
                "index": index,
                "delta": { "type": "text_delta", "text": content }
            }),
        ));
    }

    /// Arguments buffered before the block starts are replayed as its first `input_json_delta`.
    fn handle_tool_call(&mut self, tool_call: &StreamToolCall, output: &mut Vec<SseEvent>) {
        let state = &mut self.state;
        let index = match state.tool_block_indices.get(&tool_call.index).copied() {
            Some(index) => index,
            None => {
                let index = state.assign_block_index();
                state.tool_block_indices.insert(tool_call.index, index);
                state.tool_blocks.insert(
                    index,
                    ToolBlockState {
                        id: format!("tool_ph_{}_{}", self.request_id, index),
                        has_upstream_id: false,
                        name: String::new(),
                        arguments: String::new(),
                    },
                );
                index
            }
        };
        let Some(block) = state.tool_blocks.get_mut(&index) else {
            return;
        };

        if let Some(id) = tool_call.id.as_deref().filter(|id| !id.is_empty()) {
            if !block.has_upstream_id {
                block.id = id.to_string();
                block.has_upstream_id = true;
            }
        }

        let function = tool_call.function.as_ref();
        if let Some(name) = function.and_then(|f| f.name.as_deref()).filter(|n| !n.is_empty()) {
            block.name = name.to_string();
        }
        let fragment = function
            .and_then(|f| f.arguments.as_deref())
            .filter(|a| !a.is_empty());
        if let Some(fragment) = fragment {
            block.arguments.push_str(fragment);
            self.output_tokens += estimate_fragment_tokens(fragment);
        }

        if !state.started_tool_blocks.contains(&index) {
            if !block.has_upstream_id || block.name.is_empty() {
                return;
            }
            output.push(SseEvent::new(
                "content_block_start",
                json!({
                    "type": "content_block_start",
                    "index": index,
                    "content_block": {
                        "type": "tool_use",
                        "id": block.id,
                        "name": block.name,
                        "input": {}
                    }
                }),
            ));
            state.started_tool_blocks.insert(index);

            // Arguments that arrived before the start are replayed as the first delta
            if !block.arguments.is_empty() {
                output.push(input_json_delta(index, &block.arguments));
            }
        } else if let Some(fragment) = fragment {
            output.push(input_json_delta(index, fragment));
        }
    }

    /// Closing events: block stops, `message_delta` and `message_stop`.
    pub fn finish(&mut self) -> Vec<SseEvent> {
        self.finished = true;
        let mut output = Vec::new();

        if let Some(index) = self.state.text_block_index {
            output.push(content_block_stop(index));
        }
        for index in &self.state.started_tool_blocks {
            output.push(content_block_stop(*index));
        }

        output.push(SseEvent::new(
            "message_delta",
            json!({
                "type": "message_delta",
                "delta": {
                    "stop_reason": self.stop_reason,
                    "stop_sequence": null
                },
                "usage": { "output_tokens": self.output_tokens }
            }),
        ));
        output.push(SseEvent::new("message_stop", json!({ "type": "message_stop" })));
        output
    }

    /// Terminal event sent in place of the closing sequence when the stream fails.
    pub fn error_event(message: &str) -> SseEvent {
        SseEvent::new(
            "error",
            json!({
                "type": "error",
                "error": { "type": "api_error", "message": message }
            }),
        )
    }
}

fn input_json_delta(index: usize, partial_json: &str) -> SseEvent {
    SseEvent::new(
        "content_block_delta",
        json!({
            "type": "content_block_delta",
            "index": index,
            "delta": { "type": "input_json_delta", "partial_json": partial_json }
        }),
    )
}

fn content_block_stop(index: usize) -> SseEvent {
    SseEvent::new(
        "content_block_stop",
        json!({ "type": "content_block_stop", "index": index }),
    )
}

async fn send_all(tx: &mpsc::Sender<String>, events: Vec<SseEvent>) -> bool {
    for event in events {
        if tx.send(event.to_sse()).await.is_err() {
            return false;
        }
    }
    true
}

/// Translate `events` and write framed SSE text into `tx` until the stream
/// ends, fails, or the receiver goes away.
///
/// Returning drops `events`, which releases the upstream connection.
pub async fn pump_anthropic_stream<S>(
    mut events: S,
    mut translator: AnthropicStreamTranslator,
    tx: mpsc::Sender<String>,
) where
    S: Stream<Item = Result<StreamEvent, CopilotError>> + Unpin,
{
    if !send_all(&tx, translator.start()).await {
        debug!("Client disconnected before {} started", translator.message_id());
        return;
    }

    while let Some(item) = events.next().await {
        match item {
            Ok(event) => {
                let output = translator.handle_event(&event);
                if !send_all(&tx, output).await {
                    debug!("Client disconnected from {}", translator.message_id());
                    return;
                }
                if translator.is_finished() {
                    break;
                }
            }
            Err(e) => {
                error!("Error in stream conversion for {}: {e}", translator.message_id());
                let _ = tx
                    .send(AnthropicStreamTranslator::error_event(&e.to_string()).to_sse())
                    .await;
                return;
            }
        }
    }

    let closing = translator.finish();
    if send_all(&tx, closing).await {
        info!(
            "Anthropic stream {} completed stopReason={} outputTokens={}",
            translator.message_id(),
            translator.stop_reason,
            translator.output_tokens()
        );
    }
}
