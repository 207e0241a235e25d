//! Order confirmation
//!
//! Turns a non-empty cart into a persisted order. The print is attempted
//! first and is best-effort; the store commit is all-or-nothing.

use serde::Serialize;

use super::catalog::{CommitError, OrderDraft, OrderStore};
use super::{CartLine, OrderState};
use crate::printer::Printer;

/// Outcome of a committed order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Receipt {
    pub order_id: i64,
    /// 1-based position among this session's orders
    pub order_number: usize,
    pub table_number: String,
    pub lines: Vec<CartLine>,
    pub total: f64,
    pub session_total: f64,
    pub printed: bool,
}

/// Why a confirmation did not produce an order
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfirmError {
    #[error("No items in order to confirm")]
    EmptyOrder,

    #[error("Insufficient stock for {name} (available: {available}, ordered: {requested})")]
    InsufficientStock {
        name: String,
        available: u32,
        requested: u32,
    },

    #[error("order could not be saved: {0}")]
    OrderPersistenceFailed(String),

    /// A kitchen ticket exists with no matching order row
    #[error("CRITICAL: ticket printed but order was not saved: {reason}")]
    PrintedButNotPersisted { reason: String, lines: Vec<CartLine> },
}

impl ConfirmError {
    /// Stable machine-readable code for clients
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyOrder => "empty_order",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::OrderPersistenceFailed(_) => "order_persistence_failed",
            Self::PrintedButNotPersisted { .. } => "printed_but_not_persisted",
        }
    }

    /// Needs manual reconciliation
    #[must_use]
    pub const fn is_critical(&self) -> bool {
        matches!(self, Self::PrintedButNotPersisted { .. })
    }
}

/// Confirms orders against a printer and an order store
pub struct OrderTransaction<'a> {
    printer: &'a dyn Printer,
    orders: &'a dyn OrderStore,
}

impl<'a> OrderTransaction<'a> {
    #[must_use]
    pub const fn new(printer: &'a dyn Printer, orders: &'a dyn OrderStore) -> Self {
        Self { printer, orders }
    }

    /// Confirm the session's cart for `table_number`
    ///
    /// On success the cart is cleared and speech input stays paused until
    /// the client starts a new order. On failure the cart is left intact;
    /// speech input is re-armed unless a ticket was printed.
    ///
    /// # Errors
    ///
    /// Returns `ConfirmError` if no order was persisted
    pub async fn confirm(
        &self,
        state: &mut OrderState,
        table_number: &str,
    ) -> Result<Receipt, ConfirmError> {
        if state.cart.is_empty() {
            return Err(ConfirmError::EmptyOrder);
        }

        state.begin_confirmation();
        let snapshot = state.cart.snapshot();
        tracing::info!(
            table = table_number,
            lines = snapshot.lines.len(),
            total = snapshot.total,
            "confirming order"
        );

        let ticket_no = chrono::Utc::now().timestamp() % 100_000;
        let printed = match self
            .printer
            .print_ticket(&snapshot.lines, table_number, ticket_no)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, ticket_no, "kitchen ticket not printed, continuing");
                false
            }
        };

        let draft = OrderDraft {
            table_number: table_number.to_string(),
            lines: snapshot.lines.clone(),
            total: snapshot.total,
        };

        match self.orders.commit(&draft).await {
            Ok(order) => {
                let order_id = order.id;
                state.finish_confirmation(order);
                let receipt = Receipt {
                    order_id,
                    order_number: state.completed().len(),
                    table_number: table_number.to_string(),
                    lines: snapshot.lines,
                    total: snapshot.total,
                    session_total: state.session_total(),
                    printed,
                };
                tracing::info!(
                    order_id,
                    order_number = receipt.order_number,
                    session_total = receipt.session_total,
                    printed,
                    "order committed"
                );
                Ok(receipt)
            }
            Err(e) if printed => {
                state.abort_confirmation(false);
                tracing::error!(
                    error = %e,
                    ticket_no,
                    table = table_number,
                    "ticket printed but order not persisted; manual reconciliation required"
                );
                Err(ConfirmError::PrintedButNotPersisted {
                    reason: e.to_string(),
                    lines: snapshot.lines,
                })
            }
            Err(e) => {
                state.abort_confirmation(true);
                tracing::warn!(error = %e, "order not persisted, cart preserved");
                Err(match e {
                    CommitError::InsufficientStock {
                        name,
                        available,
                        requested,
                        ..
                    } => ConfirmError::InsufficientStock {
                        name,
                        available,
                        requested,
                    },
                    CommitError::Storage(reason) => ConfirmError::OrderPersistenceFailed(reason),
                })
            }
        }
    }
}
