//! Chat types shared between the generation pipeline and providers.

use crate::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    /// The user/human participant in the conversation
    User,
    /// The AI assistant participant in the conversation
    Assistant,
}

/// The type of a message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageType {
    /// A plain text message
    #[default]
    Text,
    /// A tool use request emitted by the assistant
    ToolUse(Vec<ToolCall>),
    /// Results for previously requested tool calls
    ToolResult(Vec<ToolCall>),
}

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// The role of who sent this message
    pub role: ChatRole,
    /// The type of the message
    #[serde(default)]
    pub message_type: MessageType,
    /// The text content of the message
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            message_type: MessageType::Text,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            message_type: MessageType::Text,
            content: content.into(),
        }
    }

    /// An assistant turn that requests tool invocations.
    pub fn tool_use(calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::Assistant,
            message_type: MessageType::ToolUse(calls),
            content: String::new(),
        }
    }

    /// A user turn carrying tool results. Each call's `arguments` field holds
    /// the serialized tool output.
    pub fn tool_result(calls: Vec<ToolCall>) -> Self {
        Self {
            role: ChatRole::User,
            message_type: MessageType::ToolResult(calls),
            content: String::new(),
        }
    }
}

/// The function definition of a tool offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionTool {
    /// The name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// The parameters schema for the function
    pub parameters: Value,
}

/// A tool the model may call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// The type of tool (e.g. "function")
    #[serde(rename = "type")]
    pub tool_type: String,
    /// The function definition if this is a function tool
    pub function: FunctionTool,
}

/// One incremental unit of a streaming chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamChunk {
    /// Text content delta
    Text(String),

    /// Tool use block started (contains tool id and name)
    ToolUseStart {
        /// The index of this content block in the response
        index: usize,
        /// The unique ID for this tool use
        id: String,
        /// The name of the tool being called
        name: String,
    },

    /// Tool use input JSON delta (partial JSON string)
    ToolUseInputDelta {
        /// The index of this content block
        index: usize,
        /// Partial JSON string for the tool input
        partial_json: String,
    },

    /// Tool use block complete with assembled ToolCall
    ToolUseComplete {
        /// The index of this content block
        index: usize,
        /// The complete tool call with id, name, and arguments
        tool_call: ToolCall,
    },

    /// Stream ended with stop reason
    Done {
        /// The reason the stream stopped (e.g. "stop", "tool_calls")
        stop_reason: String,
    },
}
