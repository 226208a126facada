//! AppForge core: wire-neutral chat types and the streaming provider
//! abstraction consumed by the service's generation pipeline.

pub mod chat;
pub mod error;
pub mod provider;

pub use error::ProviderError;

use serde::{Deserialize, Serialize};

/// A single tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The ID of the tool call.
    pub id: String,
    /// The type of the tool call (usually "function").
    #[serde(rename = "type")]
    pub call_type: String,
    /// The function to call.
    pub function: FunctionCall,
}

/// Which function to call and with what arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the function to call.
    pub name: String,
    /// The arguments, serialized as a JSON string.
    pub arguments: String,
}
