//! Order repository backed by `SQLite`
//!
//! [`OrderRepo::commit`] is the only multi-statement write in the system. It
//! runs under `BEGIN IMMEDIATE` so the stock re-check and the decrements see
//! the same rows, and rolls back on any failure. Each decrement is guarded
//! on its own, so a line is never taken below zero.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use super::menu::decrement_on;
use super::{DbPool, parse_datetime};
use crate::ordering::{
    CartLine, CommitError, Order, OrderDraft, OrderStatus, OrderStore, StockUpdate,
};
use crate::{Error, Result};

/// Order repository
#[derive(Clone)]
pub struct OrderRepo {
    pool: DbPool,
}

impl OrderRepo {
    /// Create a new order repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Atomically re-check stock, insert the order and decrement every line
    ///
    /// # Errors
    ///
    /// Returns `CommitError` if the transaction was rolled back
    pub fn commit_blocking(&self, draft: &OrderDraft) -> std::result::Result<Order, CommitError> {
        let mut conn = self
            .pool
            .get()
            .map_err(|e| CommitError::Storage(e.to_string()))?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;

        for line in &draft.lines {
            let available: Option<u32> = tx
                .query_row(
                    "SELECT quantity FROM menu_items WHERE dish_id = ?1",
                    [&line.dish_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage)?;

            match available {
                None => {
                    return Err(CommitError::Storage(format!(
                        "{} is no longer on the menu",
                        line.name
                    )));
                }
                Some(available) if available < line.quantity => {
                    return Err(CommitError::InsufficientStock {
                        dish_id: line.dish_id.clone(),
                        name: line.name.clone(),
                        available,
                        requested: line.quantity,
                    });
                }
                Some(_) => {}
            }
        }

        let created_at = Utc::now();
        tx.execute(
            "INSERT INTO orders (table_number, total, status, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                draft.table_number,
                draft.total,
                OrderStatus::Confirmed.as_str(),
                created_at.to_rfc3339()
            ],
        )
        .map_err(storage)?;
        let order_id = tx.last_insert_rowid();

        for (position, line) in (0_i64..).zip(&draft.lines) {
            tx.execute(
                "INSERT INTO order_items (order_id, position, dish_id, name, unit_price, quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    order_id,
                    position,
                    line.dish_id,
                    line.name,
                    line.unit_price,
                    line.quantity
                ],
            )
            .map_err(storage)?;

            let update =
                decrement_on(&tx, &line.dish_id, line.quantity, line.quantity).map_err(storage)?;
            if update == StockUpdate::InsufficientStock {
                let available: u32 = tx
                    .query_row(
                        "SELECT quantity FROM menu_items WHERE dish_id = ?1",
                        [&line.dish_id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(storage)?
                    .unwrap_or(0);
                return Err(CommitError::InsufficientStock {
                    dish_id: line.dish_id.clone(),
                    name: line.name.clone(),
                    available,
                    requested: line.quantity,
                });
            }
        }

        tx.commit().map_err(storage)?;

        Ok(Order {
            id: order_id,
            table_number: draft.table_number.clone(),
            lines: draft.lines.clone(),
            total: draft.total,
            status: OrderStatus::Confirmed,
            created_at,
        })
    }

    /// Run a repository call off the async runtime
    pub(crate) async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> Result<T> + Send + 'static,
    {
        let repo = self.clone();
        super::run_blocking(move || f(&repo)).await
    }

    /// Most recent orders first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_recent(&self, limit: usize) -> Result<Vec<Order>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT id, table_number, total, created_at
             FROM orders ORDER BY id DESC LIMIT ?1",
        )?;
        let headers = stmt
            .query_map([limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        headers
            .into_iter()
            .map(|(id, table_number, total, created_at)| {
                Ok(Order {
                    id,
                    table_number,
                    lines: load_lines(&conn, id)?,
                    total,
                    status: OrderStatus::Confirmed,
                    created_at: parse_datetime(&created_at),
                })
            })
            .collect()
    }

    /// Get an order by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: i64) -> Result<Option<Order>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let header = conn
            .query_row(
                "SELECT table_number, total, created_at FROM orders WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((table_number, total, created_at)) = header else {
            return Ok(None);
        };

        Ok(Some(Order {
            id,
            table_number,
            lines: load_lines(&conn, id)?,
            total,
            status: OrderStatus::Confirmed,
            created_at: parse_datetime(&created_at),
        }))
    }

    /// Number of persisted orders
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self) -> Result<i64> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[async_trait]
impl OrderStore for OrderRepo {
    async fn commit(&self, draft: &OrderDraft) -> std::result::Result<Order, CommitError> {
        let repo = self.clone();
        let draft = draft.clone();
        tokio::task::spawn_blocking(move || repo.commit_blocking(&draft))
            .await
            .map_err(|e| CommitError::Storage(e.to_string()))?
    }
}

fn load_lines(conn: &Connection, order_id: i64) -> Result<Vec<CartLine>> {
    let mut stmt = conn.prepare(
        "SELECT dish_id, name, unit_price, quantity
         FROM order_items WHERE order_id = ?1 ORDER BY position",
    )?;
    let lines = stmt
        .query_map([order_id], |row| {
            Ok(CartLine {
                dish_id: row.get(0)?,
                name: row.get(1)?,
                unit_price: row.get(2)?,
                quantity: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(lines)
}

fn storage(e: rusqlite::Error) -> CommitError {
    CommitError::Storage(e.to_string())
}
