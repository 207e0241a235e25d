//! Tableside - voice ordering assistant for restaurant tables
//!
//! A table device streams microphone audio over a WebSocket. The gateway
//! segments it into utterances, transcribes them, lets a tool-calling
//! language model edit the table's cart, and streams the spoken reply back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Table client (/ws/audio)             │
//! │        PCM16 frames in  │  JSON + reply audio out    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Session                          │
//! │  Segmenter │ STT │ Agent turn │ Order tools │ TTS    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │      SQLite menu + orders   │   Kitchen printer      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod ordering;
pub mod printer;
pub mod prompt;
pub mod session;
pub mod voice;

pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use session::{Session, SessionConfig, SessionServices};
