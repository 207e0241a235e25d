//! Cart, catalog interfaces, order tools and the confirmation transaction

pub mod cart;
pub mod catalog;
pub mod tools;
pub mod transaction;

pub use cart::{Cart, CartError, CartLine, CartSnapshot};
pub use catalog::{
    CatalogItem, CommitError, MenuStore, Order, OrderDraft, OrderStatus, OrderStore, StockUpdate,
};
pub use tools::{OrderEvent, OrderEvents, OrderTools, order_tool_specs};
pub use transaction::{ConfirmError, OrderTransaction, Receipt};

/// Where the session is in the ordering flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderPhase {
    /// Taking items
    Active,
    /// Confirmation in flight
    Processing,
    /// Last order committed; waiting for the client to start a new one
    Completed,
}

/// Per-session ordering state
#[derive(Debug)]
pub struct OrderState {
    pub cart: Cart,
    asr_active: bool,
    phase: OrderPhase,
    completed: Vec<Order>,
}

impl Default for OrderState {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cart: Cart::new(),
            asr_active: true,
            phase: OrderPhase::Active,
            completed: Vec::new(),
        }
    }

    /// Whether inbound audio should be segmented
    #[must_use]
    pub const fn asr_active(&self) -> bool {
        self.asr_active
    }

    #[must_use]
    pub const fn phase(&self) -> OrderPhase {
        self.phase
    }

    /// Orders committed during this session, oldest first
    #[must_use]
    pub fn completed(&self) -> &[Order] {
        &self.completed
    }

    /// Sum of all orders committed this session
    #[must_use]
    pub fn session_total(&self) -> f64 {
        self.completed.iter().map(|o| o.total).sum()
    }

    /// Clear the cart and re-arm speech input for a new order
    pub fn start_ordering(&mut self) {
        self.cart.clear();
        self.asr_active = true;
        self.phase = OrderPhase::Active;
    }

    pub(crate) const fn begin_confirmation(&mut self) {
        self.asr_active = false;
        self.phase = OrderPhase::Processing;
    }

    pub(crate) fn finish_confirmation(&mut self, order: Order) {
        self.cart.clear();
        self.completed.push(order);
        self.asr_active = false;
        self.phase = OrderPhase::Completed;
    }

    pub(crate) const fn abort_confirmation(&mut self, resume_asr: bool) {
        self.asr_active = resume_asr;
        self.phase = OrderPhase::Active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_ordering_rearms_speech_and_clears_cart() {
        let mut state = OrderState::new();
        state
            .cart
            .insert(
                &CatalogItem {
                    dish_id: "d1".to_string(),
                    name: "Idli".to_string(),
                    description: String::new(),
                    category: None,
                    price: 40.0,
                    quantity: 5,
                    popularity_score: 0,
                    meal_period: None,
                    available: true,
                },
                1,
            )
            .unwrap();
        state.begin_confirmation();
        assert!(!state.asr_active());

        state.start_ordering();
        assert!(state.asr_active());
        assert!(state.cart.is_empty());
        assert_eq!(state.phase(), OrderPhase::Active);
    }
}
