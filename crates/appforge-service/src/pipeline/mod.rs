//! The generation pipeline.
//!
//! Drives a multi-step tool-calling conversation against the configured
//! provider, emitting frames to the SSE edge while mutating the workspace
//! tree through the tool registry. Cancellation is cooperative: the token is
//! checked between chunks, and a cancelled run persists no assistant
//! message.

pub mod frames;
pub mod sessions;
pub mod template;

use crate::auth::AuthUser;
use crate::context::AppContext;
use crate::db::{Chat, Message, MessageRole};
use crate::pipeline::frames::StreamFrame;
use crate::tools::ToolContext;
use appforge::chat::{ChatMessage, StreamChunk};
use appforge::provider::ProviderSpec;
use appforge::{FunctionCall, ToolCall};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Upper bound on provider round-trips within one generation.
pub const MAX_STEPS: usize = 10;

const SYSTEM_DIRECTIVE: &str = "You are an expert app builder working inside a user's web app \
workspace. The project is a Vite + React app; its files are reachable through your tools. \
Use writeFile to create or overwrite files, readFile and listFiles to inspect the project, \
and deleteFile to remove files. Keep the app self-contained, prefer small focused components, \
and describe what you changed in plain language.";

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Regenerate the last reply against existing history without appending
    /// a new user message.
    #[serde(default)]
    pub redo: bool,
}

enum EndReason {
    /// Upstream or internal failure; reported as an `error` frame.
    Failed(String),
    /// Cooperative cancellation; the stream just closes.
    Cancelled,
    /// The SSE client went away; the stream just closes.
    Disconnected,
}

struct FrameSender(mpsc::Sender<StreamFrame>);

impl FrameSender {
    async fn send(&self, frame: StreamFrame) -> Result<(), EndReason> {
        self.0.send(frame).await.map_err(|_| EndReason::Disconnected)
    }
}

fn fail(e: impl std::fmt::Display) -> EndReason {
    EndReason::Failed(e.to_string())
}

/// Run one generation to completion, writing frames into `tx`.
///
/// The caller has already checked that `chat` is owned by `user`.
pub async fn run_generation(
    ctx: Arc<AppContext>,
    user: AuthUser,
    chat: Chat,
    request: GenerationRequest,
    tx: mpsc::Sender<StreamFrame>,
) {
    let tx = FrameSender(tx);
    match generate(&ctx, &user, &chat, &request, &tx).await {
        Ok(()) => {}
        Err(EndReason::Failed(message)) => {
            tracing::warn!(chat_id = chat.id, error = %message, "generation failed");
            let _ = tx.send(StreamFrame::Error { error: message }).await;
        }
        Err(EndReason::Cancelled) => {
            tracing::debug!(chat_id = chat.id, "generation cancelled");
        }
        Err(EndReason::Disconnected) => {
            tracing::debug!(chat_id = chat.id, "client disconnected mid-stream");
        }
    }
}

async fn generate(
    ctx: &Arc<AppContext>,
    user: &AuthUser,
    chat: &Chat,
    request: &GenerationRequest,
    tx: &FrameSender,
) -> Result<(), EndReason> {
    let store = ctx.store_for(user.id, chat.app_id).map_err(fail)?;

    if !store.exists("package.json").await.map_err(fail)? {
        tx.send(StreamFrame::Status {
            message: "Initializing workspace from template".to_string(),
        })
        .await?;
        let files = template::materialize(&store).await.map_err(fail)?;
        tx.send(StreamFrame::Status {
            message: format!("Created {} template files", files.len()),
        })
        .await?;
    }

    let chats = ctx.db.chats();
    let history = chats.list_messages(chat.id).await.map_err(fail)?;
    let mut conversation: Vec<ChatMessage> = history.iter().map(history_message).collect();

    let request_id = Uuid::new_v4().to_string();
    let user_message = if request.redo {
        None
    } else {
        let message = chats
            .append_message(
                chat.id,
                MessageRole::User,
                &request.prompt,
                Some(request_id.clone()),
            )
            .await
            .map_err(fail)?;
        conversation.push(ChatMessage::user(&request.prompt));
        Some(message)
    };

    let (stream_id, cancel) = ctx.sessions.register(chat.id, user.id);
    let result = stream_steps(
        ctx,
        user,
        chat,
        conversation,
        user_message,
        request_id,
        &stream_id,
        &cancel,
        tx,
    )
    .await;
    ctx.sessions.remove(&stream_id);
    result
}

#[allow(clippy::too_many_arguments)]
async fn stream_steps(
    ctx: &Arc<AppContext>,
    user: &AuthUser,
    chat: &Chat,
    mut conversation: Vec<ChatMessage>,
    user_message: Option<Message>,
    request_id: String,
    stream_id: &str,
    cancel: &CancellationToken,
    tx: &FrameSender,
) -> Result<(), EndReason> {
    tx.send(StreamFrame::StreamId {
        stream_id: stream_id.to_string(),
    })
    .await?;
    if let Some(message) = user_message {
        tx.send(StreamFrame::Message { message }).await?;
    }

    let settings = ctx.db.settings().get(user.id).await.map_err(fail)?;
    let spec = ProviderSpec {
        api_key: ctx.config.api_key_for(&settings.provider),
        provider: settings.provider,
        model: settings.model,
        system: Some(SYSTEM_DIRECTIVE.to_string()),
    };
    let provider = (ctx.providers)(&spec).map_err(fail)?;

    let tool_ctx = ToolContext {
        app_id: chat.app_id,
        store: ctx.store_for(user.id, chat.app_id).map_err(fail)?,
    };
    let definitions = ctx.tools.definitions();

    let mut full_content = String::new();
    for _ in 0..MAX_STEPS {
        let mut stream = provider
            .chat_stream_with_tools(&conversation, Some(definitions.as_slice()))
            .await
            .map_err(fail)?;

        let mut tool_calls: Vec<ToolCall> = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(EndReason::Cancelled),
                chunk = stream.next() => match chunk {
                    None => break,
                    Some(Err(e)) => return Err(fail(e)),
                    Some(Ok(StreamChunk::Text(text))) => {
                        full_content.push_str(&text);
                        tx.send(StreamFrame::Chunk {
                            content: text,
                            full_content: full_content.clone(),
                        })
                        .await?;
                    }
                    Some(Ok(StreamChunk::ToolUseComplete { tool_call, .. })) => {
                        tool_calls.push(tool_call);
                    }
                    Some(Ok(StreamChunk::Done { .. })) => break,
                    Some(Ok(_)) => {}
                },
            }
        }

        if tool_calls.is_empty() {
            break;
        }

        conversation.push(ChatMessage::tool_use(tool_calls.clone()));
        let mut results = Vec::with_capacity(tool_calls.len());
        for call in &tool_calls {
            if cancel.is_cancelled() {
                return Err(EndReason::Cancelled);
            }
            let execution = ctx.tools.execute(call, &tool_ctx).await;
            if let Some(path) = &execution.mutated_path {
                tx.send(StreamFrame::FileUpdate {
                    path: path.clone(),
                    message: format!("Updated {path}"),
                })
                .await?;
            }
            results.push(ToolCall {
                id: call.id.clone(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: call.function.name.clone(),
                    arguments: execution.result.to_string(),
                },
            });
        }
        conversation.push(ChatMessage::tool_result(results));
    }

    let assistant = ctx
        .db
        .chats()
        .append_message(
            chat.id,
            MessageRole::Assistant,
            &full_content,
            Some(request_id),
        )
        .await
        .map_err(fail)?;
    tx.send(StreamFrame::End {
        message: assistant,
        chat_id: chat.id,
    })
    .await?;
    Ok(())
}

fn history_message(message: &Message) -> ChatMessage {
    match message.role {
        MessageRole::User => ChatMessage::user(&message.content),
        MessageRole::Assistant => ChatMessage::assistant(&message.content),
    }
}
