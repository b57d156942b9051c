//! Grocery list. Client-local: nothing here is sent to the API.

use serde::{Deserialize, Serialize};
use shared::{
    domain::FoodCategory,
    protocol::{PantryItem, Recipe},
};
use tracing::debug;
use uuid::Uuid;

use crate::filter::matches_text;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroceryItem {
    pub id: Uuid,
    pub name: String,
    pub quantity: Option<String>,
    pub category: FoodCategory,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroceryFilter {
    pub search: String,
    pub category: Option<FoodCategory>,
    pub show_completed: bool,
}

impl Default for GroceryFilter {
    fn default() -> Self {
        Self {
            search: String::new(),
            category: None,
            show_completed: true,
        }
    }
}

impl GroceryFilter {
    pub fn matches(&self, item: &GroceryItem) -> bool {
        matches_text(&item.name, &self.search)
            && self.category.map_or(true, |category| item.category == category)
            && (self.show_completed || !item.completed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroceryList {
    items: Vec<GroceryItem>,
}

impl GroceryList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[GroceryItem] {
        &self.items
    }

    pub fn get(&self, id: Uuid) -> Option<&GroceryItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Blank names are ignored.
    pub fn add(
        &mut self,
        name: &str,
        quantity: Option<String>,
        category: FoodCategory,
    ) -> Option<Uuid> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let item = GroceryItem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            quantity: quantity.filter(|quantity| !quantity.trim().is_empty()),
            category,
            completed: false,
        };
        debug!("grocery: added id={} name={}", item.id, item.name);
        let id = item.id;
        self.items.push(item);
        Some(id)
    }

    /// Returns the new completion state.
    pub fn toggle_completed(&mut self, id: Uuid) -> Option<bool> {
        let item = self.items.iter_mut().find(|item| item.id == id)?;
        item.completed = !item.completed;
        Some(item.completed)
    }

    pub fn remove(&mut self, id: Uuid) -> Option<GroceryItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear_completed(&mut self) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !item.completed);
        before - self.items.len()
    }

    pub fn remaining(&self) -> usize {
        self.items.iter().filter(|item| !item.completed).count()
    }

    pub fn filtered(&self, filter: &GroceryFilter) -> Vec<&GroceryItem> {
        self.items.iter().filter(|item| filter.matches(item)).collect()
    }

    /// Adds every ingredient of `recipe` that neither the pantry nor the list
    /// already covers. Returns how many were added.
    pub fn add_missing_ingredients(&mut self, recipe: &Recipe, pantry: &[PantryItem]) -> usize {
        let mut added = 0;
        for ingredient in &recipe.ingredients {
            let in_pantry = pantry
                .iter()
                .any(|item| !item.quantity.is_zero() && mentions(ingredient, &item.name));
            let listed = self
                .items
                .iter()
                .any(|item| !item.completed && mentions(ingredient, &item.name));
            if in_pantry || listed {
                continue;
            }
            if self.add(ingredient, None, FoodCategory::Other).is_some() {
                added += 1;
            }
        }
        debug!("grocery: recipe={} added={added}", recipe.id);
        added
    }
}

/// Ingredient lines carry amounts ("2 cups flour"), so match on the name.
fn mentions(ingredient: &str, name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && ingredient.to_lowercase().contains(&name.to_lowercase())
}

#[cfg(test)]
#[path = "tests/grocery_tests.rs"]
mod tests;
