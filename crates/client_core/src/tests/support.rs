//! In-memory fakes of the remote services and entity builders for tests.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use shared::{
    domain::{Difficulty, FoodCategory, PantryItemId, Quantity, RecipeId, StorageLocation, Unit},
    protocol::{
        GenerateRecipeRequest, NewPantryItem, NewRecipe, PantryItem, PantryItemPatch,
        PantryQuery, Recipe, RecipePatch, RecipeQuery,
    },
};
use tokio::sync::{broadcast, oneshot, Mutex};

use crate::{
    error::ClientError,
    events::{ClientEvent, Notice},
    service::{PantryService, RecipeService},
};

pub(crate) fn recipe(id: &str, name: &str) -> Recipe {
    Recipe {
        id: RecipeId::new(id),
        name: name.to_string(),
        description: String::new(),
        image: "🍲".to_string(),
        cuisine: "Italian".to_string(),
        difficulty: Difficulty::Easy,
        prep_time: "10 min".to_string(),
        cook_time: "20 min".to_string(),
        servings: 2,
        rating: 4.5,
        ingredients: Vec::new(),
        instructions: Vec::new(),
        tags: Vec::new(),
        is_owned: false,
        is_favorite: false,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn pantry_item(id: &str, name: &str, quantity: u32) -> PantryItem {
    PantryItem {
        id: PantryItemId::new(id),
        name: name.to_string(),
        category: FoodCategory::Other,
        quantity: Quantity::new(quantity),
        unit: Unit::Pieces,
        expiration_date: None,
        purchase_date: None,
        location: StorageLocation::Pantry,
        emoji: "🥫".to_string(),
        notes: None,
        barcode: None,
        created_at: None,
        updated_at: None,
    }
}

pub(crate) fn failure() -> ClientError {
    ClientError::status(500, Some("Internal server error".to_string()))
}

pub(crate) fn drain_notices(rx: &mut broadcast::Receiver<ClientEvent>) -> Vec<Notice> {
    let mut notices = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ClientEvent::Notice(notice) = event {
            notices.push(notice);
        }
    }
    notices
}

#[derive(Default)]
pub(crate) struct FakeRecipeApi {
    pub recipes: Mutex<Vec<Recipe>>,
    pub calls: Mutex<Vec<String>>,
    pub favorite_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    pub fail_favorites: AtomicBool,
    pub fail_lists: AtomicBool,
}

impl FakeRecipeApi {
    pub(crate) fn with(recipes: Vec<Recipe>) -> Self {
        Self {
            recipes: Mutex::new(recipes),
            ..Self::default()
        }
    }

    /// The next favorite call waits until the returned sender fires.
    pub(crate) async fn hold_next_favorite(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.favorite_gates.lock().await.push_back(rx);
        tx
    }

    pub(crate) fn set_fail_favorites(&self, fail: bool) {
        self.fail_favorites.store(fail, Ordering::SeqCst);
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn server_favorite(&self, id: &str) -> Option<bool> {
        self.recipes
            .lock()
            .await
            .iter()
            .find(|recipe| recipe.id.as_str() == id)
            .map(|recipe| recipe.is_favorite)
    }

    async fn set_favorite(&self, id: &RecipeId, favorite: bool) -> Result<(), ClientError> {
        let verb = if favorite { "add" } else { "remove" };
        self.calls
            .lock()
            .await
            .push(format!("{verb}_favorite {id}"));

        let gate = self.favorite_gates.lock().await.pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.fail_favorites.load(Ordering::SeqCst) {
            return Err(failure());
        }

        let mut recipes = self.recipes.lock().await;
        let recipe = recipes
            .iter_mut()
            .find(|recipe| &recipe.id == id)
            .ok_or_else(|| ClientError::status(404, Some("Recipe not found".to_string())))?;
        recipe.is_favorite = favorite;
        Ok(())
    }
}

#[async_trait]
impl RecipeService for FakeRecipeApi {
    async fn list_recipes(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, ClientError> {
        self.calls.lock().await.push("list_recipes".to_string());
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(failure());
        }
        let recipes = self.recipes.lock().await;
        Ok(recipes
            .iter()
            .filter(|recipe| query.favorites != Some(true) || recipe.is_favorite)
            .cloned()
            .collect())
    }

    async fn get_recipe(&self, id: &RecipeId) -> Result<Recipe, ClientError> {
        self.calls.lock().await.push(format!("get_recipe {id}"));
        self.recipes
            .lock()
            .await
            .iter()
            .find(|recipe| &recipe.id == id)
            .cloned()
            .ok_or_else(|| ClientError::status(404, Some("Recipe not found".to_string())))
    }

    async fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe, ClientError> {
        self.calls
            .lock()
            .await
            .push(format!("create_recipe {}", recipe.name));
        let mut recipes = self.recipes.lock().await;
        let mut created = self::recipe(&format!("r-{}", recipes.len() + 100), &recipe.name);
        created.tags = recipe.tags.clone();
        created.ingredients = recipe.ingredients.clone();
        created.is_owned = true;
        recipes.push(created.clone());
        Ok(created)
    }

    async fn update_recipe(
        &self,
        id: &RecipeId,
        patch: &RecipePatch,
    ) -> Result<Recipe, ClientError> {
        self.calls.lock().await.push(format!("update_recipe {id}"));
        let mut recipes = self.recipes.lock().await;
        let recipe = recipes
            .iter_mut()
            .find(|recipe| &recipe.id == id)
            .ok_or_else(|| ClientError::status(404, None))?;
        if let Some(name) = &patch.name {
            recipe.name = name.clone();
        }
        Ok(recipe.clone())
    }

    async fn delete_recipe(&self, id: &RecipeId) -> Result<(), ClientError> {
        self.calls.lock().await.push(format!("delete_recipe {id}"));
        self.recipes.lock().await.retain(|recipe| &recipe.id != id);
        Ok(())
    }

    async fn add_favorite(&self, id: &RecipeId) -> Result<(), ClientError> {
        self.set_favorite(id, true).await
    }

    async fn remove_favorite(&self, id: &RecipeId) -> Result<(), ClientError> {
        self.set_favorite(id, false).await
    }

    async fn generate_recipe(
        &self,
        request: &GenerateRecipeRequest,
    ) -> Result<Recipe, ClientError> {
        self.calls
            .lock()
            .await
            .push(format!("generate_recipe {}", request.ingredients.join(",")));
        let mut generated = recipe("generated", "Chef's Surprise");
        generated.ingredients = request.ingredients.clone();
        Ok(generated)
    }
}

#[derive(Default)]
pub(crate) struct FakePantryApi {
    pub items: Mutex<Vec<PantryItem>>,
    pub calls: Mutex<Vec<String>>,
    pub fail_mutations: AtomicBool,
}

impl FakePantryApi {
    pub(crate) fn with(items: Vec<PantryItem>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    pub(crate) fn set_fail_mutations(&self, fail: bool) {
        self.fail_mutations.store(fail, Ordering::SeqCst);
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    fn check_mutation(&self) -> Result<(), ClientError> {
        if self.fail_mutations.load(Ordering::SeqCst) {
            Err(failure())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PantryService for FakePantryApi {
    async fn list_items(&self, _query: &PantryQuery) -> Result<Vec<PantryItem>, ClientError> {
        self.calls.lock().await.push("list_items".to_string());
        Ok(self.items.lock().await.clone())
    }

    async fn get_item(&self, id: &PantryItemId) -> Result<PantryItem, ClientError> {
        self.calls.lock().await.push(format!("get_item {id}"));
        self.items
            .lock()
            .await
            .iter()
            .find(|item| &item.id == id)
            .cloned()
            .ok_or_else(|| ClientError::status(404, None))
    }

    async fn create_item(&self, item: &NewPantryItem) -> Result<PantryItem, ClientError> {
        self.calls
            .lock()
            .await
            .push(format!("create_item {}", item.name));
        self.check_mutation()?;
        let mut items = self.items.lock().await;
        let mut created = pantry_item(
            &format!("p-{}", items.len() + 100),
            &item.name,
            item.quantity.get(),
        );
        created.category = item.category;
        items.push(created.clone());
        Ok(created)
    }

    async fn update_item(
        &self,
        id: &PantryItemId,
        patch: &PantryItemPatch,
    ) -> Result<PantryItem, ClientError> {
        let quantity = patch
            .quantity
            .map(|quantity| quantity.to_string())
            .unwrap_or_default();
        self.calls
            .lock()
            .await
            .push(format!("update_item {id} quantity={quantity}"));
        self.check_mutation()?;
        let mut items = self.items.lock().await;
        let item = items
            .iter_mut()
            .find(|item| &item.id == id)
            .ok_or_else(|| ClientError::status(404, None))?;
        if let Some(quantity) = patch.quantity {
            item.quantity = quantity;
        }
        if let Some(name) = &patch.name {
            item.name = name.clone();
        }
        Ok(item.clone())
    }

    async fn delete_item(&self, id: &PantryItemId) -> Result<(), ClientError> {
        self.calls.lock().await.push(format!("delete_item {id}"));
        self.check_mutation()?;
        self.items.lock().await.retain(|item| &item.id != id);
        Ok(())
    }
}
