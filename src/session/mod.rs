//! Per-connection ordering session
//!
//! A session owns its segmenter, cart, and conversation, and runs each
//! utterance through transcription, the agent turn and the reply stream
//! strictly in sequence. Everything shared across sessions sits behind
//! [`SessionServices`].

pub mod protocol;
pub mod reply;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Timelike;
use tokio::sync::mpsc;

use crate::agent::{AgentRunConfig, Conversation, run_agent_turn};
use crate::config::{AudioConfig, Config};
use crate::llm::ChatModel;
use crate::ordering::{
    MenuStore, OrderEvent, OrderEvents, OrderState, OrderStore, OrderTools, OrderTransaction,
};
use crate::printer::Printer;
use crate::prompt::{MealPeriod, PromptTemplate};
use crate::voice::{Segmenter, SpeechClassifier, Synthesizer, Transcriber, pcm16_from_le_bytes};
use crate::{Error, Result};

pub use protocol::{ClientMessage, Outbound, ServerMessage};
pub use reply::{StreamSummary, UnitSplit, split_units, stream_reply};

/// Spoken when a turn fails or produces nothing to say
const APOLOGY_TAMIL: &str = "மன்னிக்கவும், இப்போது பதிலளிக்க முடியவில்லை. மீண்டும் சொல்லுங்கள்.";
const APOLOGY_ENGLISH: &str = "Sorry, I could not answer that just now. Please say it again.";

/// Apology in the session's language
#[must_use]
pub fn apology(language: &str) -> &'static str {
    if language.starts_with("ta") {
        APOLOGY_TAMIL
    } else {
        APOLOGY_ENGLISH
    }
}

/// Adapters and stores shared by all sessions
#[derive(Clone)]
pub struct SessionServices {
    pub classifier: Arc<dyn SpeechClassifier>,
    pub transcriber: Arc<dyn Transcriber>,
    pub model: Arc<dyn ChatModel>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub menu: Arc<dyn MenuStore>,
    pub orders: Arc<dyn OrderStore>,
    pub printer: Arc<dyn Printer>,
    pub prompt: Arc<PromptTemplate>,
}

/// Per-session tunables
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub audio: AudioConfig,
    pub agent: AgentRunConfig,
    pub menu_top_k: usize,
    pub default_table: String,
    pub unit_split: UnitSplit,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            agent: AgentRunConfig::default(),
            menu_top_k: 50,
            default_table: "1".to_string(),
            unit_split: UnitSplit::Whole,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            audio: config.audio.clone(),
            agent: AgentRunConfig {
                max_iterations: config.llm.max_iterations,
                max_reply_sentences: config.ordering.max_reply_sentences,
            },
            menu_top_k: config.ordering.menu_top_k,
            default_table: config.ordering.default_table.clone(),
            unit_split: if config.speech.sentence_units {
                UnitSplit::Sentences
            } else {
                UnitSplit::Whole
            },
        }
    }
}

/// Forwards order events onto the session's outbound channel
struct ChannelEvents<'a> {
    outbound: &'a mpsc::Sender<Outbound>,
}

#[async_trait]
impl OrderEvents for ChannelEvents<'_> {
    async fn emit(&self, event: OrderEvent) {
        let message = match event {
            OrderEvent::CartUpdated(snapshot) => ServerMessage::order_update(snapshot),
            OrderEvent::Confirmed(receipt) => ServerMessage::order_confirmed(receipt),
            OrderEvent::Failed { error, lines } => ServerMessage::order_failed(&error, lines),
        };
        if self.outbound.send(message.into()).await.is_err() {
            tracing::debug!("client gone, order event dropped");
        }
    }
}

/// One connected table
pub struct Session {
    id: String,
    services: SessionServices,
    config: SessionConfig,
    segmenter: Segmenter,
    state: OrderState,
    conversation: Conversation,
    language: String,
    table: String,
    outbound: mpsc::Sender<Outbound>,
}

impl Session {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        services: SessionServices,
        config: SessionConfig,
        outbound: mpsc::Sender<Outbound>,
    ) -> Self {
        Self {
            id: id.into(),
            segmenter: Segmenter::new(&config.audio),
            language: config.audio.default_language.clone(),
            table: config.default_table.clone(),
            services,
            config,
            state: OrderState::new(),
            conversation: Conversation::new(),
            outbound,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub const fn state(&self) -> &OrderState {
        &self.state
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    async fn send(&self, item: impl Into<Outbound>) -> Result<()> {
        self.outbound
            .send(item.into())
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Handle one inbound binary frame
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the client is gone
    pub async fn handle_audio(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.state.asr_active() {
            tracing::trace!(
                session_id = %self.id,
                phase = ?self.state.phase(),
                "speech input paused, frame dropped"
            );
            return Ok(());
        }

        let samples = pcm16_from_le_bytes(bytes).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "undecodable frame treated as silence");
            Vec::new()
        });

        let is_speech = if self.segmenter.accepts(&samples) {
            match self.services.classifier.classify(&samples).await {
                Ok(probability) => probability > self.config.audio.vad_threshold,
                Err(e) => {
                    tracing::warn!(error = %e, "classifier failed, frame treated as silence");
                    false
                }
            }
        } else {
            tracing::debug!(
                samples = samples.len(),
                expected = self.segmenter.frame_samples(),
                "unexpected frame length treated as silence"
            );
            false
        };

        if let Some(utterance) = self.segmenter.push(&samples, is_speech) {
            self.process_utterance(&utterance).await?;
        }
        Ok(())
    }

    /// Handle one inbound JSON message
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for malformed messages and
    /// `Error::ChannelClosed` if the client is gone
    pub async fn handle_text(&mut self, text: &str) -> Result<()> {
        let message: ClientMessage = serde_json::from_str(text)
            .map_err(|e| Error::Config(format!("invalid message: {e}")))?;

        match message {
            ClientMessage::Config { language, table } => {
                if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
                    self.language = language;
                }
                if let Some(table) = table.filter(|t| !t.trim().is_empty()) {
                    self.table = table;
                }
                tracing::info!(
                    session_id = %self.id,
                    language = %self.language,
                    table = %self.table,
                    "session configured"
                );
            }
            ClientMessage::Reset => {
                let was_active = self.state.asr_active();
                self.conversation.clear();
                self.segmenter.reset();
                self.state.start_ordering();
                tracing::info!(session_id = %self.id, "session reset");
                self.send(ServerMessage::order_update(self.state.cart.snapshot()))
                    .await?;
                self.announce_asr(was_active).await?;
            }
            ClientMessage::StartOrdering => {
                let was_active = self.state.asr_active();
                self.segmenter.reset();
                self.state.start_ordering();
                tracing::info!(
                    session_id = %self.id,
                    completed = self.state.completed().len(),
                    "new order started"
                );
                self.send(ServerMessage::order_update(self.state.cart.snapshot()))
                    .await?;
                self.announce_asr(was_active).await?;
            }
            ClientMessage::Ping => self.send(ServerMessage::Pong).await?,
        }
        Ok(())
    }

    /// Transcribe an utterance, run the agent turn and stream the reply
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the client is gone
    pub async fn process_utterance(&mut self, samples: &[i16]) -> Result<()> {
        tracing::info!(
            session_id = %self.id,
            samples = samples.len(),
            "utterance detected"
        );

        let transcript = match self
            .services
            .transcriber
            .transcribe(samples, &self.language)
            .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "transcription failed");
                String::new()
            }
        };
        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::warn!(session_id = %self.id, "empty transcription, utterance dropped");
            return Ok(());
        }

        self.send(ServerMessage::Transcription {
            text: transcript.to_string(),
        })
        .await?;
        self.respond_to(transcript).await
    }

    /// Run the agent on a transcript and stream the reply
    ///
    /// # Errors
    ///
    /// Returns `Error::ChannelClosed` if the client is gone
    pub async fn respond_to(&mut self, user_text: &str) -> Result<()> {
        let was_active = self.state.asr_active();
        let reply = self.run_turn(user_text).await;

        stream_reply(
            self.services.synthesizer.as_ref(),
            &reply,
            &self.language,
            self.config.unit_split,
            &self.outbound,
        )
        .await?;

        self.announce_asr(was_active).await
    }

    async fn run_turn(&mut self, user_text: &str) -> String {
        self.conversation.push_user(user_text);

        let items = match self
            .services
            .menu
            .search(user_text, self.config.menu_top_k)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "menu search failed, prompting without menu");
                Vec::new()
            }
        };
        let period = MealPeriod::from_hour(chrono::Local::now().hour());
        let system_prompt = self.services.prompt.render(&items, period);
        let messages = self.conversation.messages(&system_prompt);
        tracing::debug!(
            session_id = %self.id,
            menu_items = items.len(),
            turns = messages.len(),
            "starting agent turn"
        );

        let events = ChannelEvents {
            outbound: &self.outbound,
        };
        let transaction = OrderTransaction::new(
            self.services.printer.as_ref(),
            self.services.orders.as_ref(),
        );
        let mut tools = OrderTools::new(
            self.services.menu.as_ref(),
            transaction,
            &mut self.state,
            &events,
            &self.table,
        );

        let outcome = run_agent_turn(
            self.services.model.as_ref(),
            &mut tools,
            messages,
            user_text,
            &self.config.agent,
        )
        .await;

        match outcome {
            Ok(outcome) if !outcome.reply.trim().is_empty() => {
                tracing::info!(
                    session_id = %self.id,
                    iterations = outcome.iterations,
                    "reply ready"
                );
                self.conversation.push_assistant(outcome.reply.clone());
                outcome.reply
            }
            Ok(outcome) => {
                tracing::warn!(
                    session_id = %self.id,
                    iterations = outcome.iterations,
                    "nothing left to say after filtering, apologizing"
                );
                apology(&self.language).to_string()
            }
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "turn failed, apologizing");
                apology(&self.language).to_string()
            }
        }
    }

    async fn announce_asr(&self, was_active: bool) -> Result<()> {
        match (was_active, self.state.asr_active()) {
            (true, false) => {
                tracing::debug!(
                    session_id = %self.id,
                    phase = ?self.state.phase(),
                    "speech input paused"
                );
                self.send(ServerMessage::AsrPause {
                    reason: "order_processing".to_string(),
                })
                .await
            }
            (false, true) => {
                tracing::debug!(
                    session_id = %self.id,
                    phase = ?self.state.phase(),
                    "speech input resumed"
                );
                self.send(ServerMessage::AsrResume).await
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apology_follows_language() {
        assert_eq!(apology("ta-IN"), APOLOGY_TAMIL);
        assert_eq!(apology("en-IN"), APOLOGY_ENGLISH);
    }

    #[test]
    fn session_config_reads_sections() {
        let mut config = Config::default();
        config.llm.max_iterations = 3;
        config.ordering.default_table = "12".to_string();
        config.speech.sentence_units = true;

        let session = SessionConfig::from_config(&config);
        assert_eq!(session.agent.max_iterations, 3);
        assert_eq!(session.default_table, "12");
        assert_eq!(session.unit_split, UnitSplit::Sentences);
    }
}
