//! Client protocol for the audio channel
//!
//! Binary frames carry raw PCM16 audio in and synthesized audio out; text
//! frames carry the JSON messages below.

use serde::{Deserialize, Serialize};

use crate::ordering::{CartLine, CartSnapshot, ConfirmError, Receipt};

/// Structured message from the client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Update session settings
    Config {
        #[serde(default)]
        language: Option<String>,
        #[serde(default)]
        table: Option<String>,
    },
    /// Forget the conversation and the cart
    Reset,
    /// Begin a new order after a confirmation
    StartOrdering,
    /// Ping to keep connection alive
    Ping,
}

/// Structured message to the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { session_id: String },
    /// What the customer said
    Transcription { text: String },
    /// Cart changed
    OrderUpdate { items: Vec<CartLine>, total: f64 },
    /// Order committed
    OrderConfirmed {
        order_id: i64,
        order_number: usize,
        table_number: String,
        items: Vec<CartLine>,
        total: f64,
        session_total: f64,
        printed: bool,
    },
    /// Confirmation did not produce an order
    OrderFailed {
        code: String,
        message: String,
        /// A ticket was printed with no matching order
        critical: bool,
        /// Cart lines preserved for retry
        items: Vec<CartLine>,
    },
    /// Inbound audio is being ignored
    AsrPause { reason: String },
    /// Inbound audio is being segmented again
    AsrResume,
    /// Reply audio follows
    StreamStart { units: usize },
    /// Audio for one unit follows
    UnitStart { index: usize, text: String },
    /// All audio for a unit has been sent
    UnitComplete { index: usize },
    /// Reply finished
    StreamComplete { units: usize },
    /// Error occurred
    Error { code: String, message: String },
    /// Pong response
    Pong,
}

impl ServerMessage {
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn order_update(snapshot: CartSnapshot) -> Self {
        Self::OrderUpdate {
            items: snapshot.lines,
            total: snapshot.total,
        }
    }

    #[must_use]
    pub fn order_confirmed(receipt: Receipt) -> Self {
        Self::OrderConfirmed {
            order_id: receipt.order_id,
            order_number: receipt.order_number,
            table_number: receipt.table_number,
            items: receipt.lines,
            total: receipt.total,
            session_total: receipt.session_total,
            printed: receipt.printed,
        }
    }

    #[must_use]
    pub fn order_failed(error: &ConfirmError, items: Vec<CartLine>) -> Self {
        Self::OrderFailed {
            code: error.code().to_string(),
            message: error.to_string(),
            critical: error.is_critical(),
            items,
        }
    }
}

/// Anything the session sends down the socket
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    Audio(Vec<u8>),
}

impl From<ServerMessage> for Outbound {
    fn from(message: ServerMessage) -> Self {
        Self::Message(message)
    }
}
