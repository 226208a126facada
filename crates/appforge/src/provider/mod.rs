//! Streaming chat provider abstraction.
//!
//! The service consumes exactly one capability from a model vendor: a
//! streaming text completion with tool calls. Vendors are resolved by name
//! through [`build_provider`]; all shipped vendors speak the OpenAI-compatible
//! chat completions envelope, differing only in base URL and credential.

pub mod openai_compat;

use crate::chat::{ChatMessage, StreamChunk, Tool};
use crate::error::ProviderError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub use openai_compat::OpenAiCompatProvider;

/// A pinned, boxed stream of completion chunks.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send>>;

/// Unified streaming chat capability.
#[async_trait]
pub trait ChatProvider: Send + Sync + std::fmt::Debug {
    /// The vendor name this provider was built for.
    fn name(&self) -> &str;

    /// Start a streaming completion over `messages`, offering `tools`.
    async fn chat_stream_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[Tool]>,
    ) -> Result<ChatStream, ProviderError>;
}

/// Everything needed to construct a provider for one generation run.
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub provider: String,
    pub model: String,
    pub api_key: Option<String>,
    pub system: Option<String>,
}

/// Resolve a vendor name into a ready provider.
///
/// Fails with `MissingCredential` when the spec carries no API key and with
/// `UnknownProvider` for names outside the shipped set.
pub fn build_provider(spec: &ProviderSpec) -> Result<Box<dyn ChatProvider>, ProviderError> {
    let base_url = match spec.provider.as_str() {
        "openai" => "https://api.openai.com/v1",
        "anthropic" => "https://api.anthropic.com/v1",
        "google" => "https://generativelanguage.googleapis.com/v1beta/openai",
        other => {
            return Err(ProviderError::UnknownProvider {
                name: other.to_string(),
            });
        }
    };

    let api_key = spec
        .api_key
        .clone()
        .ok_or_else(|| ProviderError::MissingCredential {
            provider: spec.provider.clone(),
        })?;

    Ok(Box::new(OpenAiCompatProvider::new(
        spec.provider.clone(),
        base_url.to_string(),
        api_key,
        spec.model.clone(),
        spec.system.clone(),
    )))
}
