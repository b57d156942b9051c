//! Recipe screens: home, list, detail and generation share this state.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use shared::{
    domain::RecipeId,
    protocol::{GenerateRecipeRequest, NewRecipe, Recipe, RecipePatch, RecipeQuery},
};
use tracing::info;

use crate::{
    config::ScreenOptions,
    error::ClientError,
    events::{report_failure, ClientEvent, EventSender},
    filter::RecipeFilter,
    optimistic::{
        mutation_op, FieldCell, MutationKey, MutationOp, MutationOutcome, OptimisticCoordinator,
        PendingMutation, Transition,
    },
    service::RecipeService,
    store::{CachedList, EntityField},
};

pub struct RecipeScreen {
    api: Arc<dyn RecipeService>,
    list: Arc<CachedList<Recipe>>,
    favorites: OptimisticCoordinator<bool>,
    query: Mutex<RecipeQuery>,
    loading: AtomicBool,
    reload_after_toggle: bool,
    events: EventSender,
}

impl RecipeScreen {
    pub fn new(
        api: Arc<dyn RecipeService>,
        list: Arc<CachedList<Recipe>>,
        options: ScreenOptions,
        events: EventSender,
    ) -> Self {
        let favorites = favorite_coordinator(options, events.clone());
        Self::with_favorites(api, list, options, favorites, events)
    }

    /// Builds a screen whose favorite toggles share in-flight slots with
    /// every other screen holding a clone of `favorites`.
    pub fn with_favorites(
        api: Arc<dyn RecipeService>,
        list: Arc<CachedList<Recipe>>,
        options: ScreenOptions,
        favorites: OptimisticCoordinator<bool>,
        events: EventSender,
    ) -> Self {
        Self {
            api,
            list,
            favorites,
            query: Mutex::new(RecipeQuery::default()),
            loading: AtomicBool::new(false),
            reload_after_toggle: options.reload_after_toggle,
            events,
        }
    }

    pub fn list(&self) -> &Arc<CachedList<Recipe>> {
        &self.list
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn query(&self) -> RecipeQuery {
        self.query
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn load(&self, query: RecipeQuery) -> Result<usize, ClientError> {
        *self
            .query
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = query.clone();
        self.fetch(&query).await
    }

    /// Re-runs the last query. Used for pull-to-refresh and on focus.
    pub async fn refresh(&self) -> Result<usize, ClientError> {
        let query = self.query();
        self.fetch(&query).await
    }

    async fn fetch(&self, query: &RecipeQuery) -> Result<usize, ClientError> {
        self.loading.store(true, Ordering::SeqCst);
        let result = self.api.list_recipes(query).await;
        self.loading.store(false, Ordering::SeqCst);

        let recipes = self.reported("load recipes", result)?;
        let count = recipes.len();
        self.list.replace(recipes);
        info!("recipes: loaded count={count}");
        let _ = self.events.send(ClientEvent::ListLoaded {
            screen: "recipes",
            count,
        });
        Ok(count)
    }

    pub async fn load_one(&self, id: &RecipeId) -> Result<Recipe, ClientError> {
        let result = self.api.get_recipe(id).await;
        let recipe = self.reported("load recipe", result)?;
        self.list.upsert(recipe.clone());
        Ok(recipe)
    }

    pub fn recipes(&self) -> Vec<Recipe> {
        self.list.snapshot()
    }

    pub fn visible(&self, filter: &RecipeFilter) -> Vec<Recipe> {
        filter.apply(&self.list.snapshot())
    }

    /// Shows `favorite` immediately; the request goes out when the returned
    /// mutation is settled.
    pub fn set_favorite(
        &self,
        id: &RecipeId,
        favorite: bool,
    ) -> Result<PendingMutation<bool>, ClientError> {
        self.favorites.begin(
            MutationKey::new(id, "is_favorite"),
            self.favorite_cell(id),
            favorite,
            self.favorite_op(id),
        )
    }

    /// Flips the displayed flag, including one still awaiting confirmation.
    pub fn toggle_favorite(&self, id: &RecipeId) -> Result<PendingMutation<bool>, ClientError> {
        let shown = self
            .favorite_cell(id)
            .read()
            .ok_or_else(|| ClientError::MissingEntity(id.to_string()))?;
        self.set_favorite(id, !shown)
    }

    pub async fn toggle_favorite_and_settle(
        &self,
        id: &RecipeId,
    ) -> Result<MutationOutcome<bool>, ClientError> {
        let outcome = self.toggle_favorite(id)?.settle().await;
        if self.reload_after_toggle && outcome.is_confirmed() {
            // The toggle itself succeeded; a failed reload is already reported.
            let _ = self.refresh().await;
        }
        Ok(outcome)
    }

    fn favorite_cell(&self, id: &RecipeId) -> Arc<dyn FieldCell<bool>> {
        Arc::new(EntityField::new(
            Arc::clone(&self.list),
            id.clone(),
            |recipe: &Recipe| recipe.is_favorite,
            |recipe: &mut Recipe, favorite| recipe.is_favorite = favorite,
        ))
    }

    fn favorite_op(&self, id: &RecipeId) -> MutationOp<bool> {
        let api = Arc::clone(&self.api);
        let id = id.clone();
        mutation_op(move |transition: Transition<bool>| {
            let api = Arc::clone(&api);
            let id = id.clone();
            async move {
                if transition.to {
                    api.add_favorite(&id).await
                } else {
                    api.remove_favorite(&id).await
                }
            }
        })
    }

    pub async fn create(&self, recipe: NewRecipe) -> Result<Recipe, ClientError> {
        let result = self.api.create_recipe(&recipe.normalized()).await;
        let created = self.reported("create recipe", result)?;
        info!("recipes: created id={}", created.id);
        self.list.insert(0, created.clone());
        Ok(created)
    }

    pub async fn update(&self, id: &RecipeId, patch: RecipePatch) -> Result<Recipe, ClientError> {
        let result = self.api.update_recipe(id, &patch).await;
        let updated = self.reported("update recipe", result)?;
        self.list.upsert(updated.clone());
        Ok(updated)
    }

    pub async fn delete(&self, id: &RecipeId) -> Result<(), ClientError> {
        let result = self.api.delete_recipe(id).await;
        self.reported("delete recipe", result)?;
        self.list.remove(id);
        info!("recipes: deleted id={id}");
        Ok(())
    }

    /// The generated recipe is not saved or cached until [`Self::save_generated`].
    pub async fn generate(&self, request: GenerateRecipeRequest) -> Result<Recipe, ClientError> {
        let result = self.api.generate_recipe(&request).await;
        self.reported("generate recipe", result)
    }

    pub async fn save_generated(&self, recipe: Recipe) -> Result<Recipe, ClientError> {
        self.create(NewRecipe::from(recipe)).await
    }

    fn reported<T>(
        &self,
        action: &str,
        result: Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        result.map_err(|err| {
            report_failure(&self.events, action, &err);
            err
        })
    }
}

pub fn favorite_coordinator(
    options: ScreenOptions,
    events: EventSender,
) -> OptimisticCoordinator<bool> {
    OptimisticCoordinator::new(options.mutation_policy, "update favorite status", events)
}

#[cfg(test)]
#[path = "tests/recipes_tests.rs"]
mod tests;
