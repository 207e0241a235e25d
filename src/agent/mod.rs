//! Tool-calling agent: conversation history, the turn loop and reply filtering

pub mod filter;
pub mod history;
pub mod runner;

pub use history::Conversation;
pub use runner::{AgentRunConfig, ToolHandler, TurnError, TurnOutcome, run_agent_turn};
