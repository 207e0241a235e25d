//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tableside::db::{self, MenuRepo, OrderRepo};
use tableside::llm::{ChatMessage, ChatModel, ModelError, ModelReply, ToolCall, ToolSpec};
use tableside::ordering::{CartLine, CatalogItem};
use tableside::printer::Printer;
use tableside::prompt::PromptTemplate;
use tableside::voice::tts::chunked;
use tableside::voice::{AudioChunkStream, EnergyClassifier, Synthesizer, Transcriber};
use tableside::{DbPool, SessionServices};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

pub fn item(dish_id: &str, name: &str, price: f64, quantity: u32, popularity_score: i64) -> CatalogItem {
    CatalogItem {
        dish_id: dish_id.to_string(),
        name: name.to_string(),
        description: format!("House {}", name.to_lowercase()),
        category: None,
        price,
        quantity,
        popularity_score,
        meal_period: None,
        available: quantity > 0,
    }
}

/// In-memory database with a small South Indian menu
#[must_use]
pub fn seeded_db() -> DbPool {
    let pool = setup_test_db();
    let menu = MenuRepo::new(pool.clone());
    for dish in [
        item("d1", "Chicken Biryani", 180.0, 10, 9),
        item("d2", "Idli", 40.0, 2, 7),
        item("d3", "Masala Dosa", 80.0, 5, 8),
        item("d4", "Filter Coffee", 25.0, 0, 6),
    ] {
        menu.upsert(&dish).expect("failed to seed menu");
    }
    pool
}

/// Returns queued transcripts in order, then empty strings
#[derive(Default)]
pub struct ScriptedTranscriber {
    transcripts: Mutex<VecDeque<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(transcripts: &[&str]) -> Self {
        Self {
            transcripts: Mutex::new(transcripts.iter().map(ToString::to_string).collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _samples: &[i16], _language: &str) -> tableside::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.transcripts.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Plays back a fixed script of model replies
pub struct ScriptedModel {
    script: Mutex<VecDeque<ModelReply>>,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<ModelReply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[ToolSpec]>,
    ) -> Result<ModelReply, ModelError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ModelError::Request("script exhausted".to_string()))
    }
}

pub fn tool_call(name: &str, arguments: Value) -> ModelReply {
    ModelReply::ToolCalls(vec![ToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments,
    }])
}

pub fn text(reply: &str) -> ModelReply {
    ModelReply::Text(reply.to_string())
}

/// Speaks text as its UTF-8 bytes in small chunks
pub struct EchoSynthesizer;

#[async_trait]
impl Synthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str, _language: &str) -> tableside::Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    async fn synthesize_stream(&self, text: &str, language: &str) -> tableside::Result<AudioChunkStream> {
        let audio = self.synthesize(text, language).await?;
        Ok(chunked(audio, 16))
    }
}

/// Printer that records every ticket
#[derive(Default)]
pub struct CountingPrinter {
    pub tickets: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl Printer for CountingPrinter {
    async fn print_ticket(&self, lines: &[CartLine], table_number: &str, _ticket_no: i64) -> tableside::Result<()> {
        self.tickets
            .lock()
            .unwrap()
            .push((table_number.to_string(), lines.len()));
        Ok(())
    }
}

/// Session services over `pool` with scripted speech and model
pub fn services(
    pool: &DbPool,
    transcripts: &[&str],
    script: Vec<ModelReply>,
    printer: Arc<dyn Printer>,
) -> SessionServices {
    SessionServices {
        classifier: Arc::new(EnergyClassifier::new()),
        transcriber: Arc::new(ScriptedTranscriber::new(transcripts)),
        model: Arc::new(ScriptedModel::new(script)),
        synthesizer: Arc::new(EchoSynthesizer),
        menu: Arc::new(MenuRepo::new(pool.clone())),
        orders: Arc::new(OrderRepo::new(pool.clone())),
        printer,
        prompt: Arc::new(PromptTemplate::builtin()),
    }
}

/// Services whose adapters are never expected to run
pub fn idle_services(pool: &DbPool) -> SessionServices {
    services(pool, &[], Vec::new(), Arc::new(CountingPrinter::default()))
}

pub fn add_item(dish_name: &str, quantity: u32) -> ModelReply {
    tool_call("add_item_to_order", json!({"dish_name": dish_name, "quantity": quantity}))
}
