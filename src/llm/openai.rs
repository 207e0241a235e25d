//! OpenAI-compatible chat completions client (Groq by default)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel, ModelError, ModelReply, Role, ToolCall, ToolSpec};
use crate::config::LlmConfig;
use crate::{Error, Result};

/// Provider error fragments that mean "bad tool arguments"
const VALIDATION_MARKERS: &[&str] = &[
    "tool call validation failed",
    "missing properties",
    "tool_use_failed",
];

/// Chat completions over HTTP
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing or the HTTP client cannot be built
    pub fn new(config: &LlmConfig, api_key: Option<SecretString>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.expose_secret().is_empty())
            .ok_or_else(|| Error::Config("GROQ_API_KEY required for the language model".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool<'a>>>,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// JSON-encoded arguments object
    arguments: String,
}

#[derive(Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a ToolSpec,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
}

fn function_type() -> String {
    "function".to_string()
}

impl From<&ChatMessage> for WireMessage {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            tool_calls: message
                .tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.id.clone(),
                    kind: function_type(),
                    function: WireFunction {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect(),
            tool_call_id: message.tool_call_id.clone(),
        }
    }
}

/// Classify a non-success provider response
fn classify_failure(status: StatusCode, body: &str) -> ModelError {
    let lower = body.to_lowercase();
    if status == StatusCode::BAD_REQUEST && VALIDATION_MARKERS.iter().any(|m| lower.contains(m)) {
        ModelError::ValidationFailed(body.to_string())
    } else {
        ModelError::Request(format!("provider error {status}: {body}"))
    }
}

/// Convert a response message into a reply
fn into_reply(message: WireMessage) -> std::result::Result<ModelReply, ModelError> {
    if message.tool_calls.is_empty() {
        return Ok(ModelReply::Text(
            message.content.unwrap_or_default().trim().to_string(),
        ));
    }

    let mut calls = Vec::with_capacity(message.tool_calls.len());
    for call in message.tool_calls {
        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(raw).map_err(|e| {
                ModelError::ValidationFailed(format!(
                    "unparseable arguments for {}: {e}",
                    call.function.name
                ))
            })?
        };
        calls.push(ToolCall {
            id: call.id,
            name: call.function.name,
            arguments,
        });
    }
    Ok(ModelReply::ToolCalls(calls))
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolSpec]>,
    ) -> std::result::Result<ModelReply, ModelError> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.filter(|t| !t.is_empty()).map(|t| {
                t.iter()
                    .map(|function| WireTool {
                        kind: "function",
                        function,
                    })
                    .collect()
            }),
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.map_or(0, <[ToolSpec]>::len),
            "chat completion request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "chat completion failed");
            return Err(classify_failure(status, &body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Request(format!("failed to parse response: {e}")))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Request("response has no choices".to_string()))?
            .message;

        into_reply(message)
    }
}
