//! List filters and sort orders. Always recomputed from the full cached list.

use std::cmp::Ordering;

use chrono::NaiveDate;
use shared::{
    domain::{Difficulty, FoodCategory, StorageLocation},
    protocol::{PantryItem, Recipe},
};

/// Case-insensitive substring match; a blank needle matches everything.
pub fn matches_text(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub search: String,
    pub cuisine: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub tag: Option<String>,
    pub favorites_only: bool,
    pub owned_only: bool,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        let text_hit = matches_text(&recipe.name, &self.search)
            || matches_text(&recipe.description, &self.search)
            || matches_text(&recipe.cuisine, &self.search)
            || recipe
                .tags
                .iter()
                .any(|tag| matches_text(tag, &self.search));

        text_hit
            && self
                .cuisine
                .as_deref()
                .map_or(true, |cuisine| recipe.cuisine.eq_ignore_ascii_case(cuisine))
            && self
                .difficulty
                .map_or(true, |difficulty| recipe.difficulty == difficulty)
            && self.tag.as_deref().map_or(true, |tag| recipe.has_tag(tag))
            && (!self.favorites_only || recipe.is_favorite)
            && (!self.owned_only || recipe.is_owned)
    }

    pub fn apply(&self, recipes: &[Recipe]) -> Vec<Recipe> {
        recipes
            .iter()
            .filter(|recipe| self.matches(recipe))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PantryFilter {
    pub search: String,
    pub category: Option<FoodCategory>,
    pub location: Option<StorageLocation>,
    /// Only items expiring within `days` of `today`, expired ones included.
    pub expiring_within: Option<(NaiveDate, i64)>,
}

impl PantryFilter {
    pub fn matches(&self, item: &PantryItem) -> bool {
        let text_hit = matches_text(&item.name, &self.search)
            || item
                .notes
                .as_deref()
                .is_some_and(|notes| matches_text(notes, &self.search));

        text_hit
            && self.category.map_or(true, |category| item.category == category)
            && self.location.map_or(true, |location| item.location == location)
            && self.expiring_within.map_or(true, |(today, days)| {
                item.days_until_expiration(today)
                    .is_some_and(|remaining| remaining <= days)
            })
    }

    pub fn apply(&self, items: &[PantryItem]) -> Vec<PantryItem> {
        items
            .iter()
            .filter(|item| self.matches(item))
            .cloned()
            .collect()
    }
}

/// Pantry sort control. Cycles in a fixed order and is not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PantrySort {
    #[default]
    Name,
    Expiration,
    Quantity,
    Category,
}

impl PantrySort {
    pub const ALL: [PantrySort; 4] = [
        PantrySort::Name,
        PantrySort::Expiration,
        PantrySort::Quantity,
        PantrySort::Category,
    ];

    pub fn next(self) -> PantrySort {
        let index = Self::ALL.iter().position(|sort| *sort == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    pub fn label(self) -> &'static str {
        match self {
            PantrySort::Name => "Name",
            PantrySort::Expiration => "Expiration",
            PantrySort::Quantity => "Quantity",
            PantrySort::Category => "Category",
        }
    }

    pub fn compare(self, a: &PantryItem, b: &PantryItem) -> Ordering {
        let by_name = || a.name.to_lowercase().cmp(&b.name.to_lowercase());
        match self {
            PantrySort::Name => by_name(),
            // Items without an expiration date go last.
            PantrySort::Expiration => match (a.expiration_date, b.expiration_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then_with(by_name),
            PantrySort::Quantity => b.quantity.cmp(&a.quantity).then_with(by_name),
            PantrySort::Category => a.category.cmp(&b.category).then_with(by_name),
        }
    }

    pub fn sort(self, items: &mut [PantryItem]) {
        items.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
