//! Error types for the tableside gateway

use thiserror::Error;

/// Result type alias for tableside operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tableside gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio framing or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech classifier error
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Language model error
    #[error("llm error: {0}")]
    Llm(String),

    /// Kitchen printer error
    #[error("printer error: {0}")]
    Printer(String),

    /// Client channel closed
    #[error("channel closed")]
    ChannelClosed,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),
}
