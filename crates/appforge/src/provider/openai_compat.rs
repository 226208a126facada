//! OpenAI-compatible streaming chat client.
//!
//! Speaks the `/chat/completions` SSE protocol: one `data: <json>` line per
//! delta, terminated by `data: [DONE]`. Tool call arguments arrive as
//! fragmented JSON strings indexed by content block; the decoder assembles
//! them and emits a `ToolUseComplete` per block once the choice finishes.

use crate::chat::{ChatMessage, ChatRole, MessageType, StreamChunk, Tool};
use crate::error::ProviderError;
use crate::provider::{ChatProvider, ChatStream};
use crate::{FunctionCall, ToolCall};
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug)]
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    system: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: String,
        base_url: String,
        api_key: String,
        model: String,
        system: Option<String>,
    ) -> Self {
        Self {
            name,
            base_url,
            api_key,
            model,
            system,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(&self, messages: &[ChatMessage], tools: Option<&[Tool]>) -> Value {
        let mut wire_messages = Vec::new();
        if let Some(system) = &self.system {
            wire_messages.push(json!({ "role": "system", "content": system }));
        }
        for message in messages {
            append_wire_message(&mut wire_messages, message);
        }

        let mut body = json!({
            "model": self.model,
            "messages": wire_messages,
            "stream": true,
        });
        if let Some(tools) = tools {
            body["tools"] = serde_json::to_value(tools).unwrap_or(Value::Null);
        }
        body
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_stream_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<ChatStream, ProviderError> {
        let body = self.request_body(messages, tools);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Provider(format!("{status}: {detail}")));
        }

        let bytes = response.bytes_stream();
        let state = (bytes, SseDecoder::default(), VecDeque::new());
        let chunks = futures::stream::try_unfold(state, |(mut bytes, mut decoder, mut pending)| async move {
            loop {
                if let Some(chunk) = pending.pop_front() {
                    return Ok(Some((chunk, (bytes, decoder, pending))));
                }
                if decoder.finished {
                    return Ok(None);
                }
                match bytes.next().await {
                    Some(Ok(frame)) => pending.extend(decoder.feed(&frame)?),
                    Some(Err(e)) => return Err(ProviderError::from(e)),
                    None => return Ok(None),
                }
            }
        });

        Ok(Box::pin(chunks))
    }
}

fn append_wire_message(out: &mut Vec<Value>, message: &ChatMessage) {
    match &message.message_type {
        MessageType::Text => {
            let role = match message.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            out.push(json!({ "role": role, "content": message.content }));
        }
        MessageType::ToolUse(calls) => {
            let tool_calls: Vec<Value> = calls
                .iter()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": call.call_type,
                        "function": {
                            "name": call.function.name,
                            "arguments": call.function.arguments,
                        },
                    })
                })
                .collect();
            out.push(json!({
                "role": "assistant",
                "content": message.content,
                "tool_calls": tool_calls,
            }));
        }
        MessageType::ToolResult(calls) => {
            for call in calls {
                out.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "content": call.function.arguments,
                }));
            }
        }
    }
}

#[derive(Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Deserialize)]
struct DeltaToolCall {
    #[serde(default)]
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<DeltaFunction>,
}

#[derive(Deserialize, Default)]
struct DeltaFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

#[derive(Default)]
struct ToolUseState {
    id: String,
    name: String,
    arguments: String,
    started: bool,
}

/// Incremental SSE line decoder. Bytes in, [`StreamChunk`]s out.
#[derive(Default)]
struct SseDecoder {
    buffer: String,
    tools: BTreeMap<usize, ToolUseState>,
    finished: bool,
}

impl SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StreamChunk>, ProviderError> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            self.handle_line(line.trim_end(), &mut out)?;
            if self.finished {
                break;
            }
        }
        Ok(out)
    }

    fn handle_line(&mut self, line: &str, out: &mut Vec<StreamChunk>) -> Result<(), ProviderError> {
        let Some(payload) = line.strip_prefix("data:").map(str::trim) else {
            return Ok(());
        };
        if payload.is_empty() {
            return Ok(());
        }
        if payload == "[DONE]" {
            if !self.finished {
                self.flush_tool_calls(out);
                out.push(StreamChunk::Done {
                    stop_reason: "stop".to_string(),
                });
                self.finished = true;
            }
            return Ok(());
        }

        let parsed: StreamPayload = serde_json::from_str(payload)
            .map_err(|e| ProviderError::Serialization(format!("bad stream payload: {e}")))?;

        if let Some(err) = parsed.error {
            return Err(ProviderError::Provider(err.message));
        }

        for choice in parsed.choices {
            if let Some(text) = choice.delta.content {
                if !text.is_empty() {
                    out.push(StreamChunk::Text(text));
                }
            }
            if let Some(calls) = choice.delta.tool_calls {
                for call in calls {
                    self.handle_tool_delta(call, out);
                }
            }
            if let Some(reason) = choice.finish_reason {
                self.flush_tool_calls(out);
                out.push(StreamChunk::Done {
                    stop_reason: reason,
                });
                self.finished = true;
            }
        }
        Ok(())
    }

    fn handle_tool_delta(&mut self, call: DeltaToolCall, out: &mut Vec<StreamChunk>) {
        let state = self.tools.entry(call.index).or_default();
        if let Some(id) = call.id {
            state.id = id;
        }
        if let Some(function) = call.function {
            if let Some(name) = function.name {
                state.name = name;
            }
            if !state.started && !state.id.is_empty() && !state.name.is_empty() {
                state.started = true;
                out.push(StreamChunk::ToolUseStart {
                    index: call.index,
                    id: state.id.clone(),
                    name: state.name.clone(),
                });
            }
            if let Some(arguments) = function.arguments {
                if !arguments.is_empty() {
                    state.arguments.push_str(&arguments);
                    out.push(StreamChunk::ToolUseInputDelta {
                        index: call.index,
                        partial_json: arguments,
                    });
                }
            }
        }
    }

    fn flush_tool_calls(&mut self, out: &mut Vec<StreamChunk>) {
        for (index, state) in std::mem::take(&mut self.tools) {
            if state.id.is_empty() && state.name.is_empty() {
                continue;
            }
            out.push(StreamChunk::ToolUseComplete {
                index,
                tool_call: ToolCall {
                    id: state.id,
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: state.name,
                        arguments: state.arguments,
                    },
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &str) -> Vec<StreamChunk> {
        let mut decoder = SseDecoder::default();
        decoder.feed(input.as_bytes()).expect("decode")
    }

    // ── Text deltas ─────────────────────────────────────────────────────────

    #[test]
    fn text_deltas_become_text_chunks() {
        let chunks = decode(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
        ));
        assert!(matches!(&chunks[0], StreamChunk::Text(t) if t == "Hel"));
        assert!(matches!(&chunks[1], StreamChunk::Text(t) if t == "lo"));
        assert!(matches!(&chunks[2], StreamChunk::Done { stop_reason } if stop_reason == "stop"));
    }

    #[test]
    fn split_frames_are_reassembled() {
        let mut decoder = SseDecoder::default();
        let first = decoder
            .feed(b"data: {\"choices\":[{\"delta\":{\"con")
            .unwrap();
        assert!(first.is_empty());
        let second = decoder
            .feed(b"tent\":\"hi\"}}]}\n")
            .unwrap();
        assert_eq!(second.len(), 1);
        assert!(matches!(&second[0], StreamChunk::Text(t) if t == "hi"));
    }

    // ── Tool call assembly ──────────────────────────────────────────────────

    #[test]
    fn tool_call_fragments_assemble_into_complete_call() {
        let chunks = decode(concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_9\",\"function\":{\"name\":\"writeFile\",\"arguments\":\"\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"path\\\":\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"a.txt\\\"}\"}}]}}]}\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n",
        ));

        let complete = chunks
            .iter()
            .find_map(|c| match c {
                StreamChunk::ToolUseComplete { tool_call, .. } => Some(tool_call.clone()),
                _ => None,
            })
            .expect("tool call completed");
        assert_eq!(complete.id, "call_9");
        assert_eq!(complete.function.name, "writeFile");
        assert_eq!(complete.function.arguments, "{\"path\":\"a.txt\"}");

        assert!(matches!(
            chunks.last().unwrap(),
            StreamChunk::Done { stop_reason } if stop_reason == "tool_calls"
        ));
    }

    #[test]
    fn done_sentinel_flushes_and_finishes() {
        let chunks = decode("data: [DONE]\n");
        assert_eq!(chunks.len(), 1);
        assert!(matches!(&chunks[0], StreamChunk::Done { .. }));
    }

    #[test]
    fn lines_after_finish_are_ignored() {
        let mut decoder = SseDecoder::default();
        let chunks = decoder
            .feed(b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n")
            .unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(decoder.finished);
    }

    // ── Errors ──────────────────────────────────────────────────────────────

    #[test]
    fn error_payload_surfaces_as_provider_error() {
        let mut decoder = SseDecoder::default();
        let err = decoder
            .feed(b"data: {\"error\":{\"message\":\"overloaded\"}}\n")
            .unwrap_err();
        assert!(matches!(err, ProviderError::Provider(m) if m == "overloaded"));
    }

    #[test]
    fn malformed_payload_surfaces_as_serialization_error() {
        let mut decoder = SseDecoder::default();
        let err = decoder.feed(b"data: {not json}\n").unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    // ── Request body shape ──────────────────────────────────────────────────

    #[test]
    fn request_body_maps_roles_and_tool_results() {
        let provider = OpenAiCompatProvider::new(
            "openai".into(),
            "https://example.invalid/v1".into(),
            "sk-test".into(),
            "test-model".into(),
            Some("build apps".into()),
        );
        let result_call = ToolCall {
            id: "call_1".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: "writeFile".into(),
                arguments: "{\"success\":true}".into(),
            },
        };
        let messages = vec![
            ChatMessage::user("make a counter"),
            ChatMessage::tool_use(vec![result_call.clone()]),
            ChatMessage::tool_result(vec![result_call]),
        ];
        let body = provider.request_body(&messages, None);
        let wire = body["messages"].as_array().unwrap();

        assert_eq!(wire[0]["role"], "system");
        assert_eq!(wire[1]["role"], "user");
        assert_eq!(wire[2]["role"], "assistant");
        assert_eq!(wire[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(wire[3]["role"], "tool");
        assert_eq!(wire[3]["tool_call_id"], "call_1");
        assert_eq!(body["stream"], true);
    }
}
