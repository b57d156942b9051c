//! Weekly meal planner. Client-local, like the grocery list.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::domain::RecipeId;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    pub id: Uuid,
    pub slot: MealSlot,
    pub title: String,
    pub recipe_id: Option<RecipeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    /// Ordered by slot, then by insertion.
    pub meals: Vec<Meal>,
}

impl DayPlan {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            meals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MealPlanner {
    days: BTreeMap<NaiveDate, DayPlan>,
}

impl MealPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seven consecutive days from `start`, empty days included.
    pub fn week(&self, start: NaiveDate) -> Vec<DayPlan> {
        (0..7)
            .filter_map(|offset| start.checked_add_days(Days::new(offset)))
            .map(|date| {
                self.days
                    .get(&date)
                    .cloned()
                    .unwrap_or_else(|| DayPlan::empty(date))
            })
            .collect()
    }

    pub fn meals_on(&self, date: NaiveDate) -> &[Meal] {
        self.days
            .get(&date)
            .map(|day| day.meals.as_slice())
            .unwrap_or_default()
    }

    pub fn add_meal(
        &mut self,
        date: NaiveDate,
        slot: MealSlot,
        title: &str,
        recipe_id: Option<RecipeId>,
    ) -> Uuid {
        let meal = Meal {
            id: Uuid::new_v4(),
            slot,
            title: title.trim().to_string(),
            recipe_id,
        };
        let id = meal.id;
        let day = self
            .days
            .entry(date)
            .or_insert_with(|| DayPlan::empty(date));
        let index = day
            .meals
            .iter()
            .position(|existing| existing.slot > slot)
            .unwrap_or(day.meals.len());
        day.meals.insert(index, meal);
        debug!("planner: added id={id} date={date} slot={slot:?}");
        id
    }

    pub fn remove_meal(&mut self, id: Uuid) -> Option<Meal> {
        let (date, index) = self.days.iter().find_map(|(date, day)| {
            day.meals
                .iter()
                .position(|meal| meal.id == id)
                .map(|index| (*date, index))
        })?;
        let day = self.days.get_mut(&date)?;
        let meal = day.meals.remove(index);
        if day.meals.is_empty() {
            self.days.remove(&date);
        }
        Some(meal)
    }

    /// Returns how many meals were dropped.
    pub fn clear_day(&mut self, date: NaiveDate) -> usize {
        self.days
            .remove(&date)
            .map_or(0, |day| day.meals.len())
    }

    /// Distinct recipes planned in `[from, to]`, in date order.
    pub fn recipe_ids_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<RecipeId> {
        let mut ids: Vec<RecipeId> = Vec::new();
        if from > to {
            return ids;
        }
        for day in self.days.range(from..=to).map(|(_, day)| day) {
            for recipe_id in day.meals.iter().filter_map(|meal| meal.recipe_id.as_ref()) {
                if !ids.contains(recipe_id) {
                    ids.push(recipe_id.clone());
                }
            }
        }
        ids
    }
}

#[cfg(test)]
#[path = "tests/planner_tests.rs"]
mod tests;
