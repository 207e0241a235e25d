//! Order tools exposed to the language model
//!
//! Arguments are validated here before anything touches the cart. Every
//! outcome, including a rejected call, becomes a JSON tool-result payload.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::catalog::MenuStore;
use super::transaction::{ConfirmError, OrderTransaction, Receipt};
use super::{CartLine, CartSnapshot, OrderState};
use crate::agent::ToolHandler;
use crate::llm::{ToolCall, ToolSpec};

pub const ADD_ITEM: &str = "add_item_to_order";
pub const REMOVE_ITEM: &str = "remove_item_from_order";
pub const GET_ORDER: &str = "get_current_order";
pub const CONFIRM_ORDER: &str = "confirm_and_save_order";

/// Cart and order notifications for the client
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    CartUpdated(CartSnapshot),
    Confirmed(Receipt),
    Failed {
        error: ConfirmError,
        /// Cart lines preserved for retry
        lines: Vec<CartLine>,
    },
}

/// Receives order events as soon as a tool produces them
#[async_trait]
pub trait OrderEvents: Send + Sync {
    async fn emit(&self, event: OrderEvent);
}

/// Tool definitions in function-calling format
#[must_use]
pub fn order_tool_specs(default_table: &str) -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: ADD_ITEM.to_string(),
            description: "Add a menu item to the customer's current order. Call this as soon as \
                the customer names a dish, e.g. '2 idli', 'one coffee', 'dosa'. Do not wait for \
                confirmation."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "dish_name": {
                        "type": "string",
                        "description": "Name of the dish in English (e.g. 'Idli', 'Dosa', 'Coffee')"
                    },
                    "quantity": {
                        "type": "integer",
                        "description": "Quantity ordered (default 1)",
                        "default": 1
                    }
                },
                "required": ["dish_name"]
            }),
        },
        ToolSpec {
            name: REMOVE_ITEM.to_string(),
            description: "Remove an item from the current order if the customer changes their mind"
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "dish_name": {
                        "type": "string",
                        "description": "Name of the dish to remove"
                    }
                },
                "required": ["dish_name"]
            }),
        },
        ToolSpec {
            name: GET_ORDER.to_string(),
            description: "Get the list of items currently in the order".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolSpec {
            name: CONFIRM_ORDER.to_string(),
            description: "Confirm and finalize the order, print the kitchen ticket and update \
                inventory. Only call this when the customer explicitly confirms ('confirm', \
                'place order', 'கன்ஃபர்ம்'), never for a plain 'okay' or 'yes'."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "table_number": {
                        "type": "string",
                        "description": "Table number (optional)",
                        "default": default_table
                    }
                },
                "required": []
            }),
        },
    ]
}

/// Why a tool call was rejected before execution
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("missing required argument: {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Read a required, non-blank string argument
fn required_str<'v>(args: &'v Value, field: &'static str) -> Result<&'v str, ArgumentError> {
    match args.get(field) {
        None | Some(Value::Null) => Err(ArgumentError::Missing(field)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ArgumentError::Missing(field)),
        Some(Value::String(s)) => Ok(s.trim()),
        Some(other) => Err(ArgumentError::Invalid {
            field,
            reason: format!("expected a string, got {other}"),
        }),
    }
}

/// Read `quantity`, coercing numeric strings; defaults to 1 when absent
///
/// # Errors
///
/// Returns `ArgumentError::Invalid` for non-integers and values below 1
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
pub fn parse_quantity(args: &Value) -> Result<u32, ArgumentError> {
    let invalid = |reason: String| ArgumentError::Invalid {
        field: "quantity",
        reason,
    };

    let quantity = match args.get("quantity") {
        None | Some(Value::Null) => return Ok(1),
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| invalid(format!("{n} is not a whole number")))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(format!("'{s}' is not a number")))?,
        Some(other) => return Err(invalid(format!("expected an integer, got {other}"))),
    };

    u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| invalid(format!("{quantity} is below 1")))
}

/// Read `table_number`, accepting strings or numbers
fn table_number(args: &Value, default_table: &str) -> String {
    match args.get("table_number") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default_table.to_string(),
    }
}

fn failure(error: impl std::fmt::Display) -> Value {
    json!({ "success": false, "error": error.to_string() })
}

/// Executes order tools against one session's state
pub struct OrderTools<'a> {
    menu: &'a dyn MenuStore,
    transaction: OrderTransaction<'a>,
    state: &'a mut OrderState,
    events: &'a dyn OrderEvents,
    default_table: &'a str,
    specs: Vec<ToolSpec>,
}

impl<'a> OrderTools<'a> {
    #[must_use]
    pub fn new(
        menu: &'a dyn MenuStore,
        transaction: OrderTransaction<'a>,
        state: &'a mut OrderState,
        events: &'a dyn OrderEvents,
        default_table: &'a str,
    ) -> Self {
        Self {
            menu,
            transaction,
            state,
            events,
            default_table,
            specs: order_tool_specs(default_table),
        }
    }

    /// Run one tool call and produce its result payload
    pub async fn execute(&mut self, name: &str, args: &Value) -> Value {
        match name {
            ADD_ITEM => self.add_item(args).await,
            REMOVE_ITEM => self.remove_item(args).await,
            GET_ORDER => self.current_order(),
            CONFIRM_ORDER => self.confirm(args).await,
            other => failure(format!("Unknown tool: {other}")),
        }
    }

    async fn add_item(&mut self, args: &Value) -> Value {
        let (dish_name, quantity) = match required_str(args, "dish_name")
            .and_then(|name| Ok((name, parse_quantity(args)?)))
        {
            Ok(parsed) => parsed,
            Err(e) => return failure(e),
        };

        match self.state.cart.add(self.menu, dish_name, quantity).await {
            Ok(line) => {
                let snapshot = self.state.cart.snapshot();
                self.events.emit(OrderEvent::CartUpdated(snapshot.clone())).await;
                json!({
                    "success": true,
                    "message": format!("Added {quantity}x {} (₹{} each)", line.name, line.unit_price),
                    "line_total": line.unit_price * f64::from(quantity),
                    "current_order": snapshot.lines,
                    "total": snapshot.total,
                })
            }
            Err(e) => failure(e),
        }
    }

    async fn remove_item(&mut self, args: &Value) -> Value {
        let dish_name = match required_str(args, "dish_name") {
            Ok(name) => name,
            Err(e) => return failure(e),
        };

        match self.state.cart.remove(dish_name) {
            Ok(removed) => {
                let snapshot = self.state.cart.snapshot();
                self.events.emit(OrderEvent::CartUpdated(snapshot.clone())).await;
                json!({
                    "success": true,
                    "message": format!("Removed {} from order", removed.name),
                    "current_order": snapshot.lines,
                    "total": snapshot.total,
                })
            }
            Err(e) => failure(e),
        }
    }

    fn current_order(&self) -> Value {
        let snapshot = self.state.cart.snapshot();
        let message = if snapshot.lines.is_empty() {
            "Order is empty".to_string()
        } else {
            format!(
                "{} items in order, total ₹{}",
                snapshot.lines.len(),
                snapshot.total
            )
        };
        json!({
            "success": true,
            "message": message,
            "items": snapshot.lines,
            "total": snapshot.total,
        })
    }

    async fn confirm(&mut self, args: &Value) -> Value {
        let table = table_number(args, self.default_table);
        let lines = self.state.cart.lines().to_vec();

        match self.transaction.confirm(self.state, &table).await {
            Ok(receipt) => {
                let payload = json!({
                    "success": true,
                    "message": "Order confirmed! Bill sent to kitchen.",
                    "order_id": receipt.order_id,
                    "order_number": receipt.order_number,
                    "total": receipt.total,
                    "session_total": receipt.session_total,
                    "printed": receipt.printed,
                });
                self.events.emit(OrderEvent::Confirmed(receipt)).await;
                payload
            }
            Err(error) => {
                let payload = json!({
                    "success": false,
                    "error": error.to_string(),
                    "code": error.code(),
                    "order_preserved": !matches!(error, ConfirmError::EmptyOrder),
                    "requires_manual_intervention": error.is_critical(),
                });
                self.events.emit(OrderEvent::Failed { error, lines }).await;
                payload
            }
        }
    }
}

#[async_trait]
impl ToolHandler for OrderTools<'_> {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn call(&mut self, call: &ToolCall) -> String {
        tracing::info!(tool = %call.name, args = %call.arguments, "executing tool");
        let result = self.execute(&call.name, &call.arguments).await;
        tracing::debug!(tool = %call.name, result = %result, "tool finished");
        result.to_string()
    }
}
