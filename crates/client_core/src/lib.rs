//! Client core for the kitchen app: recipe and pantry screens backed by the
//! remote API, with optimistic mutations and a shared entity cache.

use std::sync::Arc;

use shared::{
    domain::Quantity,
    protocol::{PantryItem, Recipe},
};
use tokio::sync::broadcast;
use tracing::info;

pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod grocery;
pub mod http;
pub mod optimistic;
pub mod pantry;
pub mod planner;
pub mod recipes;
pub mod service;
pub mod store;

pub use config::{load_settings, ClientSettings, ScreenOptions};
pub use error::{ClientError, FailureKind};
pub use events::{ClientEvent, Notice, SettledAs};
pub use http::HttpApi;
pub use optimistic::{MutationOutcome, MutationPolicy, OptimisticCoordinator, PendingMutation};
pub use pantry::{PantryScreen, RemovedRows};
pub use recipes::RecipeScreen;
pub use service::{
    CredentialProvider, MissingCredential, PantryService, RecipeService, StaticCredential,
};
pub use store::{CacheMode, CachedList, EntityStore};

use crate::{events::EventSender, store::Entity};

/// Builds screens that share one API client, one event channel and, in
/// [`CacheMode::Shared`], one entity store and one set of in-flight
/// mutation slots per entity type.
pub struct KitchenClient {
    settings: ClientSettings,
    recipes_api: Arc<dyn RecipeService>,
    pantry_api: Arc<dyn PantryService>,
    recipe_store: Arc<EntityStore<Recipe>>,
    pantry_store: Arc<EntityStore<PantryItem>>,
    favorites: OptimisticCoordinator<bool>,
    quantities: OptimisticCoordinator<Quantity>,
    removed_rows: RemovedRows,
    events: EventSender,
}

impl KitchenClient {
    pub fn from_settings(settings: ClientSettings) -> Result<Arc<Self>, ClientError> {
        let credentials: Arc<dyn CredentialProvider> = match &settings.auth_token {
            Some(token) => Arc::new(StaticCredential::new(token.clone())),
            None => Arc::new(MissingCredential),
        };
        let api = Arc::new(HttpApi::with_timeout(
            &settings.api_base_url,
            credentials,
            settings.request_timeout(),
        )?);
        info!(
            "client: api={} cache_mode={:?} mutation_policy={:?}",
            api.base_url(),
            settings.cache_mode,
            settings.mutation_policy
        );
        Ok(Self::new_with_dependencies(settings, api.clone(), api))
    }

    pub fn new_with_dependencies(
        settings: ClientSettings,
        recipes_api: Arc<dyn RecipeService>,
        pantry_api: Arc<dyn PantryService>,
    ) -> Arc<Self> {
        let events = events::event_channel();
        let options = settings.screen_options();
        Arc::new(Self {
            recipes_api,
            pantry_api,
            recipe_store: Arc::new(EntityStore::new()),
            pantry_store: Arc::new(EntityStore::new()),
            favorites: recipes::favorite_coordinator(options, events.clone()),
            quantities: pantry::quantity_coordinator(options, events.clone()),
            removed_rows: RemovedRows::default(),
            settings,
            events,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn recipe_store(&self) -> &Arc<EntityStore<Recipe>> {
        &self.recipe_store
    }

    pub fn pantry_store(&self) -> &Arc<EntityStore<PantryItem>> {
        &self.pantry_store
    }

    pub fn recipe_screen(&self) -> RecipeScreen {
        let api = Arc::clone(&self.recipes_api);
        let list = self.list_for(&self.recipe_store);
        let options = self.settings.screen_options();
        match self.settings.cache_mode {
            CacheMode::Shared => RecipeScreen::with_favorites(
                api,
                list,
                options,
                self.favorites.clone(),
                self.events.clone(),
            ),
            CacheMode::PerScreen => RecipeScreen::new(api, list, options, self.events.clone()),
        }
    }

    pub fn pantry_screen(&self) -> PantryScreen {
        let api = Arc::clone(&self.pantry_api);
        let list = self.list_for(&self.pantry_store);
        match self.settings.cache_mode {
            CacheMode::Shared => PantryScreen::with_state(
                api,
                list,
                self.quantities.clone(),
                self.removed_rows.clone(),
                self.events.clone(),
            ),
            CacheMode::PerScreen => PantryScreen::new(
                api,
                list,
                self.settings.screen_options(),
                self.events.clone(),
            ),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn list_for<T: Entity>(&self, store: &Arc<EntityStore<T>>) -> Arc<CachedList<T>> {
        Arc::new(match self.settings.cache_mode {
            CacheMode::Shared => CachedList::shared(Arc::clone(store)),
            CacheMode::PerScreen => CachedList::per_screen(),
        })
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
