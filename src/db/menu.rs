//! Menu repository backed by `SQLite`

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::DbPool;
use crate::ordering::{CatalogItem, MenuStore, StockUpdate};
use crate::{Error, Result};

const ITEM_COLUMNS: &str = "dish_id, name, description, category, price, quantity, \
                            popularity_score, meal_period, available";

/// Menu repository
#[derive(Clone)]
pub struct MenuRepo {
    pool: DbPool,
}

impl MenuRepo {
    /// Create a new menu repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// List every menu item, most popular first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list_all(&self) -> Result<Vec<CatalogItem>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items ORDER BY popularity_score DESC, name"
        ))?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Get an item by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, dish_id: &str) -> Result<Option<CatalogItem>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let item = conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM menu_items WHERE dish_id = ?1"),
                [dish_id],
                row_to_item,
            )
            .optional()?;

        Ok(item)
    }

    /// Most popular item whose name contains `name`, ignoring case
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_name(&self, name: &str) -> Result<Option<CatalogItem>> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let item = conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM menu_items
                     WHERE instr(lower(name), ?1) > 0
                     ORDER BY popularity_score DESC, length(name)
                     LIMIT 1"
                ),
                [&needle],
                row_to_item,
            )
            .optional()?;

        Ok(item)
    }

    /// Rank available items by keyword hits in name, description and category
    ///
    /// Ties, including no hits at all, fall back to popularity so the result
    /// always holds up to `top_k` items.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn keyword_search(&self, query: &str, top_k: usize) -> Result<Vec<CatalogItem>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items
             WHERE available = 1 AND quantity > 0
             ORDER BY popularity_score DESC, name"
        ))?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let keywords: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() >= 2)
            .map(str::to_lowercase)
            .collect();

        let mut scored: Vec<(usize, CatalogItem)> = items
            .into_iter()
            .map(|item| {
                let haystack = format!(
                    "{} {} {}",
                    item.name,
                    item.description,
                    item.category.as_deref().unwrap_or_default()
                )
                .to_lowercase();
                let hits = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
                (hits, item)
            })
            .collect();

        // Stable sort keeps the popularity order within equal hit counts
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored.into_iter().take(top_k).map(|(_, item)| item).collect())
    }

    /// Set stock for an item; availability follows stock
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the item does not exist
    pub fn set_quantity(&self, dish_id: &str, quantity: u32) -> Result<CatalogItem> {
        {
            let conn = self
                .pool
                .get()
                .map_err(|e| Error::Database(e.to_string()))?;

            let changed = conn.execute(
                "UPDATE menu_items
                 SET quantity = ?2, available = ?2 > 0, updated_at = datetime('now')
                 WHERE dish_id = ?1",
                params![dish_id, quantity],
            )?;
            if changed == 0 {
                return Err(Error::NotFound(format!("menu item {dish_id}")));
            }
        }

        tracing::info!(dish_id, quantity, "stock updated");
        self.get(dish_id)?
            .ok_or_else(|| Error::NotFound(format!("menu item {dish_id}")))
    }

    /// Insert or replace a menu item
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn upsert(&self, item: &CatalogItem) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO menu_items
                 (dish_id, name, description, category, price, quantity,
                  popularity_score, meal_period, available, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))
             ON CONFLICT(dish_id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 category = excluded.category,
                 price = excluded.price,
                 quantity = excluded.quantity,
                 popularity_score = excluded.popularity_score,
                 meal_period = excluded.meal_period,
                 available = excluded.available,
                 updated_at = excluded.updated_at",
            params![
                item.dish_id,
                item.name,
                item.description,
                item.category,
                item.price,
                item.quantity,
                item.popularity_score,
                item.meal_period,
                item.available,
            ],
        )?;

        Ok(())
    }

    /// Decrement stock if at least `max(quantity, expected_min_stock)` remain
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn try_decrement(
        &self,
        dish_id: &str,
        quantity: u32,
        expected_min_stock: u32,
    ) -> Result<StockUpdate> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(decrement_on(&conn, dish_id, quantity, expected_min_stock)?)
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
}

#[async_trait]
impl MenuStore for MenuRepo {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<CatalogItem>> {
        let query = query.to_string();
        self.blocking(move |repo| repo.keyword_search(&query, top_k))
            .await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<CatalogItem>> {
        let name = name.to_string();
        self.blocking(move |repo| repo.find_by_name(&name)).await
    }

    async fn decrement_stock(
        &self,
        dish_id: &str,
        quantity: u32,
        expected_min_stock: u32,
    ) -> Result<StockUpdate> {
        let dish_id = dish_id.to_string();
        self.blocking(move |repo| repo.try_decrement(&dish_id, quantity, expected_min_stock))
            .await
    }
}

/// Conditional decrement on an open connection or transaction
///
/// Leaves the row untouched unless at least `max(quantity, expected_min_stock)`
/// units remain.
pub(crate) fn decrement_on(
    conn: &Connection,
    dish_id: &str,
    quantity: u32,
    expected_min_stock: u32,
) -> rusqlite::Result<StockUpdate> {
    let changed = conn.execute(
        "UPDATE menu_items
         SET quantity = quantity - ?2,
             available = available AND quantity - ?2 > 0,
             updated_at = datetime('now')
         WHERE dish_id = ?1 AND quantity >= ?2 AND quantity >= ?3",
        params![dish_id, quantity, expected_min_stock],
    )?;

    Ok(if changed == 1 {
        StockUpdate::Decremented
    } else {
        StockUpdate::InsufficientStock
    })
}

pub(crate) fn row_to_item(row: &Row<'_>) -> rusqlite::Result<CatalogItem> {
    Ok(CatalogItem {
        dish_id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        price: row.get(4)?,
        quantity: row.get(5)?,
        popularity_score: row.get(6)?,
        meal_period: row.get(7)?,
        available: row.get(8)?,
    })
}
