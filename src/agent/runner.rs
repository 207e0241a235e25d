//! Tool-calling turn runner

use async_trait::async_trait;

use super::filter;
use crate::llm::{ChatMessage, ChatModel, ModelError, ModelReply, ToolCall, ToolSpec};

/// Executes tool calls requested by the model
#[async_trait]
pub trait ToolHandler: Send {
    /// Tools advertised to the model
    fn specs(&self) -> &[ToolSpec];

    /// Run one call and return its result payload
    async fn call(&mut self, call: &ToolCall) -> String;
}

/// Configuration for a single agentic turn
#[derive(Debug, Clone)]
pub struct AgentRunConfig {
    /// Model round-trips allowed, including text-only retries
    pub max_iterations: u32,
    /// Sentences kept from the final reply
    pub max_reply_sentences: usize,
}

impl Default for AgentRunConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_reply_sentences: 5,
        }
    }
}

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Filtered final reply
    pub reply: String,
    /// Full transcript including tool-call and tool-result turns
    pub transcript: Vec<ChatMessage>,
    /// Model calls made
    pub iterations: u32,
}

/// Fatal turn failures
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("no reply after {iterations} model calls")]
    IterationBudgetExhausted { iterations: u32 },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Run one user turn to a single text reply.
///
/// `messages` must already end with the user's utterance. Tool calls are
/// executed in order and their results appended before the next model call.
/// A validation failure is retried once with tools disabled; the retry counts
/// toward `max_iterations`.
///
/// # Errors
///
/// Returns `TurnError::IterationBudgetExhausted` when the budget runs out
/// without a text reply, `TurnError::Model` when the model call fails.
pub async fn run_agent_turn(
    model: &dyn ChatModel,
    tools: &mut dyn ToolHandler,
    mut messages: Vec<ChatMessage>,
    user_text: &str,
    config: &AgentRunConfig,
) -> Result<TurnOutcome, TurnError> {
    let specs = tools.specs().to_vec();
    let mut tools_enabled = true;
    let mut iteration = 0;

    while iteration < config.max_iterations {
        iteration += 1;
        let offered = tools_enabled.then_some(specs.as_slice());
        tracing::debug!(iteration, tools = tools_enabled, "model call");

        let reply = model.complete(&messages, offered).await;
        let retrying = !tools_enabled;
        tools_enabled = true;

        match reply {
            Ok(ModelReply::Text(text)) => {
                let reply = filter::clean_reply(user_text, &text, config.max_reply_sentences);
                if reply != text {
                    tracing::debug!(raw = %text, filtered = %reply, "reply filtered");
                }
                messages.push(ChatMessage::assistant(reply.clone()));
                tracing::info!(iteration, chars = reply.chars().count(), "turn complete");
                return Ok(TurnOutcome {
                    reply,
                    transcript: messages,
                    iterations: iteration,
                });
            }
            Ok(ModelReply::ToolCalls(calls)) => {
                tracing::info!(iteration, calls = calls.len(), "model requested tools");
                messages.push(ChatMessage::assistant_tool_calls(calls.clone()));
                for call in &calls {
                    let result = tools.call(call).await;
                    messages.push(ChatMessage::tool_result(call.id.clone(), result));
                }
            }
            Err(ModelError::ValidationFailed(reason)) if !retrying => {
                tracing::warn!(iteration, reason = %reason, "tool arguments rejected, retrying without tools");
                tools_enabled = false;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::error!(iterations = iteration, "iteration budget exhausted");
    Err(TurnError::IterationBudgetExhausted {
        iterations: iteration,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::llm::Role;

    /// Model that replays a fixed script and records whether tools were offered
    struct ScriptedModel {
        script: Mutex<VecDeque<Result<ModelReply, ModelError>>>,
        offered: Mutex<Vec<bool>>,
    }

    impl ScriptedModel {
        fn new(script: Vec<Result<ModelReply, ModelError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                offered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn complete(
            &self,
            _messages: &[ChatMessage],
            tools: Option<&[ToolSpec]>,
        ) -> Result<ModelReply, ModelError> {
            self.offered.lock().unwrap().push(tools.is_some());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ModelReply::ToolCalls(vec![call("loop")])))
        }
    }

    #[derive(Default)]
    struct RecordingTools {
        specs: Vec<ToolSpec>,
        calls: Vec<String>,
    }

    #[async_trait]
    impl ToolHandler for RecordingTools {
        fn specs(&self) -> &[ToolSpec] {
            &self.specs
        }

        async fn call(&mut self, call: &ToolCall) -> String {
            self.calls.push(call.name.clone());
            json!({"success": true}).to_string()
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: json!({}),
        }
    }

    fn start() -> Vec<ChatMessage> {
        vec![ChatMessage::system("sys"), ChatMessage::user("two idli")]
    }

    #[tokio::test]
    async fn tool_tool_text_ends_on_third_iteration() {
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::ToolCalls(vec![call("add_item_to_order")])),
            Ok(ModelReply::ToolCalls(vec![call("get_current_order")])),
            Ok(ModelReply::Text("Added two idli. Anything else?".to_string())),
        ]);
        let mut tools = RecordingTools::default();

        let outcome = run_agent_turn(&model, &mut tools, start(), "two idli", &AgentRunConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.reply, "Added two idli. Anything else?");
        let tool_turns = outcome
            .transcript
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(tool_turns, 2);
        assert_eq!(tools.calls, vec!["add_item_to_order", "get_current_order"]);
        assert_eq!(outcome.transcript.last().unwrap().role, Role::Assistant);
    }

    #[tokio::test]
    async fn validation_failure_retries_once_without_tools() {
        let model = ScriptedModel::new(vec![
            Err(ModelError::ValidationFailed("missing properties: dish_name".to_string())),
            Ok(ModelReply::Text("Which dish would you like?".to_string())),
        ]);
        let mut tools = RecordingTools::default();

        let outcome = run_agent_turn(&model, &mut tools, start(), "add", &AgentRunConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.iterations, 2);
        assert_eq!(*model.offered.lock().unwrap(), vec![true, false]);
        assert!(tools.calls.is_empty());
    }

    #[tokio::test]
    async fn endless_tool_calls_exhaust_the_budget() {
        let model = ScriptedModel::new(Vec::new());
        let mut tools = RecordingTools::default();

        let err = run_agent_turn(&model, &mut tools, start(), "hi", &AgentRunConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::IterationBudgetExhausted { iterations: 5 }));
        assert_eq!(tools.calls.len(), 5);
    }

    #[tokio::test]
    async fn request_failures_are_fatal() {
        let model = ScriptedModel::new(vec![Err(ModelError::Request("503".to_string()))]);
        let mut tools = RecordingTools::default();

        let err = run_agent_turn(&model, &mut tools, start(), "hi", &AgentRunConfig::default())
            .await
            .unwrap_err();

        assert!(matches!(err, TurnError::Model(ModelError::Request(_))));
    }

    #[tokio::test]
    async fn final_reply_is_filtered() {
        let model = ScriptedModel::new(vec![Ok(ModelReply::Text(
            "System: Chicken Biryani is ₹180. Anything else?".to_string(),
        ))]);
        let mut tools = RecordingTools::default();

        let outcome = run_agent_turn(&model, &mut tools, start(), "one biryani", &AgentRunConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.reply, "Anything else?");
    }
}
