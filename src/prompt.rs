//! System prompt assembly
//!
//! The template carries two placeholders: `{menu}` for the retrieved menu
//! listing and `{meal_period}` for the current service period.

use std::path::Path;

use crate::ordering::CatalogItem;
use crate::Result;

const MENU_PLACEHOLDER: &str = "{menu}";
const MEAL_PERIOD_PLACEHOLDER: &str = "{meal_period}";

/// Built-in waiter persona, Tamil-first
const BUILTIN_TEMPLATE: &str = r#"You are a warm, friendly waiter taking orders at a Tamil restaurant table.
Speak natural, casual Tamil in Tamil script. Keep replies short: two to four sentences.

Tool rules:
- When the customer orders a dish, call add_item_to_order(dish_name, quantity). Never call it without a dish_name.
- When the customer cancels a dish, call remove_item_from_order(dish_name).
- Call get_current_order() when you need to read the order back.
- When the customer says they are done ("போதும்", "that's all"), read the order back and ask them to confirm. Do not call any tool yet.
- Only after the customer explicitly confirms ("கன்ஃபர்ம்", "confirm"), call confirm_and_save_order().
- Always answer in words after a tool call. After adding an item, ask "வேற ஏதாவது?".

Menu rules:
- Only offer dishes listed in the MENU section below. If a dish is not listed, say it is not available now and suggest something similar from the list.
- Never mention a price unless the customer asks for it ("எவ்வளவு", "விலை", "price").

Current service: {meal_period}

## MENU
{menu}
"#;

/// Service period derived from the hour of day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealPeriod {
    Breakfast,
    Lunch,
    Dinner,
    AllDay,
}

impl MealPeriod {
    /// Breakfast 6-10, lunch 11-15, dinner 16-22, all-day otherwise
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            6..=10 => Self::Breakfast,
            11..=15 => Self::Lunch,
            16..=22 => Self::Dinner,
            _ => Self::AllDay,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "Breakfast",
            Self::Lunch => "Lunch",
            Self::Dinner => "Dinner",
            Self::AllDay => "All-Day",
        }
    }
}

/// Menu listing for the prompt, one item per line
#[must_use]
pub fn format_menu_context(items: &[CatalogItem]) -> String {
    if items.is_empty() {
        return "No items currently available.".to_string();
    }

    items
        .iter()
        .map(|item| {
            format!(
                "- {}: {} (விலை: {} ரூபாய்)",
                item.name, item.description, item.price
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptTemplate {
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            template: BUILTIN_TEMPLATE.to_string(),
        }
    }

    /// Use a custom template; the menu is appended if it has no `{menu}` slot
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        let mut template = template.into();
        if !template.contains(MENU_PLACEHOLDER) {
            tracing::warn!("prompt template has no {{menu}} placeholder, appending menu section");
            template.push_str("\n\n## MENU\n{menu}\n");
        }
        Self { template }
    }

    /// Load from `path`, or the built-in template when `None`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let template = std::fs::read_to_string(path)?;
        tracing::info!(path = %path.display(), "loaded prompt template");
        Ok(Self::new(template))
    }

    /// Render with the given menu items
    #[must_use]
    pub fn render(&self, items: &[CatalogItem], period: MealPeriod) -> String {
        self.template
            .replace(MEAL_PERIOD_PLACEHOLDER, period.as_str())
            .replace(MENU_PLACEHOLDER, &format_menu_context(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biryani() -> CatalogItem {
        CatalogItem {
            dish_id: "d1".to_string(),
            name: "Chicken Biryani".to_string(),
            description: "Dum biryani".to_string(),
            category: Some("Biryani".to_string()),
            price: 180.0,
            quantity: 5,
            popularity_score: 3,
            meal_period: None,
            available: true,
        }
    }

    #[test]
    fn meal_period_boundaries() {
        assert_eq!(MealPeriod::from_hour(5), MealPeriod::AllDay);
        assert_eq!(MealPeriod::from_hour(6), MealPeriod::Breakfast);
        assert_eq!(MealPeriod::from_hour(10), MealPeriod::Breakfast);
        assert_eq!(MealPeriod::from_hour(11), MealPeriod::Lunch);
        assert_eq!(MealPeriod::from_hour(16), MealPeriod::Dinner);
        assert_eq!(MealPeriod::from_hour(22), MealPeriod::Dinner);
        assert_eq!(MealPeriod::from_hour(23), MealPeriod::AllDay);
    }

    #[test]
    fn menu_context_lists_items() {
        assert_eq!(
            format_menu_context(&[biryani()]),
            "- Chicken Biryani: Dum biryani (விலை: 180 ரூபாய்)"
        );
        assert_eq!(format_menu_context(&[]), "No items currently available.");
    }

    #[test]
    fn builtin_template_fills_placeholders() {
        let prompt = PromptTemplate::builtin().render(&[biryani()], MealPeriod::Lunch);
        assert!(prompt.contains("- Chicken Biryani: Dum biryani"));
        assert!(prompt.contains("Current service: Lunch"));
        assert!(!prompt.contains("{menu}"));
    }

    #[test]
    fn custom_template_without_slot_gets_menu_appended() {
        let prompt = PromptTemplate::new("Be brief.").render(&[], MealPeriod::Dinner);
        assert!(prompt.starts_with("Be brief."));
        assert!(prompt.ends_with("No items currently available.\n"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "Menu:\n{menu}").unwrap();

        let template = PromptTemplate::load(Some(&path)).unwrap();
        assert_eq!(template.render(&[biryani()], MealPeriod::AllDay).lines().count(), 2);
        assert!(PromptTemplate::load(None).is_ok());
    }
}
