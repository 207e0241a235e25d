//! Language model adapter
//!
//! The agent loop talks to any chat model through [`ChatModel`]. The reply is
//! either text or a batch of tool calls; argument validation failures reported
//! by the provider come back as [`ModelError::ValidationFailed`] so the caller
//! can branch on them.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiChatModel;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed JSON arguments
    pub arguments: serde_json::Value,
}

/// A message in the model transcript
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    /// Set on assistant messages that requested tools
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool-result messages
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn that requested tool calls
    #[must_use]
    pub const fn assistant_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Result of one tool call
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// Outcome of one completion
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

/// Model adapter failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// The model produced tool arguments that failed schema validation
    #[error("tool call validation failed: {0}")]
    ValidationFailed(String),

    /// Transport, provider or decoding failure
    #[error("model request failed: {0}")]
    Request(String),
}

/// Chat completion backend
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the transcript; `tools = None` forces a text-only reply
    ///
    /// # Errors
    ///
    /// Returns `ModelError::ValidationFailed` when tool arguments were
    /// rejected, `ModelError::Request` for anything else
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> Result<ModelReply, ModelError>;
}
