//! The order in progress for one session

use serde::{Deserialize, Serialize};

use super::catalog::{CatalogItem, MenuStore};

/// One item in the cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub dish_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl CartLine {
    #[must_use]
    pub fn subtotal(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// Immutable copy of the cart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
    pub total: f64,
}

/// Recoverable cart failures, reported back to the model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CartError {
    #[error("Dish '{0}' not found in menu")]
    ItemNotFound(String),

    #[error("{0} is currently unavailable")]
    ItemUnavailable(String),

    #[error("Only {available} {name} available")]
    InsufficientStock {
        name: String,
        available: u32,
        requested: u32,
    },

    #[error("{0} not in current order")]
    NotInCart(String),

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// The catalog could not be queried
    #[error("menu lookup failed: {0}")]
    Lookup(String),
}

/// Ordered cart lines, at most one per dish
#[derive(Debug, Clone, Default)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Resolve `item_name` against the catalog and add `quantity` of it
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the dish cannot be resolved or stocked
    pub async fn add(
        &mut self,
        catalog: &dyn MenuStore,
        item_name: &str,
        quantity: u32,
    ) -> Result<CartLine, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let item = catalog
            .get_by_name(item_name.trim())
            .await
            .map_err(|e| CartError::Lookup(e.to_string()))?
            .ok_or_else(|| CartError::ItemNotFound(item_name.to_string()))?;

        self.insert(&item, quantity)
    }

    /// Add a resolved catalog item
    ///
    /// Stock is checked against the cumulative quantity in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError` if the item is unavailable or understocked
    pub fn insert(&mut self, item: &CatalogItem, quantity: u32) -> Result<CartLine, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !item.available {
            return Err(CartError::ItemUnavailable(item.name.clone()));
        }

        let index = self.lines.iter().position(|l| l.dish_id == item.dish_id);
        let in_cart = index.map_or(0, |i| self.lines[i].quantity);
        let wanted = in_cart.saturating_add(quantity);
        if wanted > item.quantity {
            return Err(CartError::InsufficientStock {
                name: item.name.clone(),
                available: item.quantity,
                requested: wanted,
            });
        }

        let line = if let Some(i) = index {
            self.lines[i].quantity = wanted;
            self.lines[i].clone()
        } else {
            let line = CartLine {
                dish_id: item.dish_id.clone(),
                name: item.name.clone(),
                unit_price: item.price,
                quantity,
            };
            self.lines.push(line.clone());
            line
        };

        tracing::debug!(dish_id = %line.dish_id, quantity = line.quantity, "cart line updated");
        Ok(line)
    }

    /// Remove the line whose name matches exactly, ignoring case
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if no line matches
    pub fn remove(&mut self, item_name: &str) -> Result<CartLine, CartError> {
        let wanted = item_name.trim().to_lowercase();
        let index = self
            .lines
            .iter()
            .position(|l| l.name.to_lowercase() == wanted)
            .ok_or_else(|| CartError::NotInCart(item_name.to_string()))?;

        Ok(self.lines.remove(index))
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
            total: self.total(),
        }
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}
