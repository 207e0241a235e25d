//! Catalog and order store interfaces
//!
//! The menu and the order ledger are owned by an external store; sessions
//! only read the menu and go through [`OrderStore::commit`] to write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cart::CartLine;
use crate::Result;

/// A menu item as seen by the ordering core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub dish_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: f64,
    /// Units in stock
    pub quantity: u32,
    #[serde(default)]
    pub popularity_score: i64,
    #[serde(default)]
    pub meal_period: Option<String>,
    pub available: bool,
}

/// Result of a conditional stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockUpdate {
    Decremented,
    InsufficientStock,
}

/// Read access to the menu plus the conditional stock decrement
#[async_trait]
pub trait MenuStore: Send + Sync {
    /// Rank available items against free text
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<CatalogItem>>;

    /// Resolve a spoken dish name (case-insensitive substring, most popular first)
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be queried
    async fn get_by_name(&self, name: &str) -> Result<Option<CatalogItem>>;

    /// Decrement stock only while at least `expected_min_stock` units remain
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be updated
    async fn decrement_stock(
        &self,
        dish_id: &str,
        quantity: u32,
        expected_min_stock: u32,
    ) -> Result<StockUpdate>;
}

/// Lifecycle status of a persisted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Confirmed,
}

impl OrderStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
        }
    }
}

/// An order about to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub table_number: String,
    pub lines: Vec<CartLine>,
    pub total: f64,
}

/// A persisted, immutable order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub table_number: String,
    pub lines: Vec<CartLine>,
    pub total: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Why an atomic commit was rolled back
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommitError {
    /// Live stock fell below a line's quantity since it was added
    #[error("insufficient stock for {name} (available: {available}, ordered: {requested})")]
    InsufficientStock {
        dish_id: String,
        name: String,
        available: u32,
        requested: u32,
    },

    /// The store failed or a line's item no longer exists
    #[error("order store failure: {0}")]
    Storage(String),
}

/// Durable order ledger
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Re-check stock, insert the order and decrement every line, atomically
    ///
    /// # Errors
    ///
    /// Returns `CommitError` if nothing was written
    async fn commit(&self, draft: &OrderDraft) -> std::result::Result<Order, CommitError>;
}
