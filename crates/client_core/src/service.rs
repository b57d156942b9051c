//! Seams between screens and the remote API.

use async_trait::async_trait;
use shared::{
    domain::{PantryItemId, RecipeId},
    protocol::{
        GenerateRecipeRequest, NewPantryItem, NewRecipe, PantryItem, PantryItemPatch,
        PantryQuery, Recipe, RecipePatch, RecipeQuery,
    },
};

use crate::error::ClientError;

/// Supplies the bearer credential issued by the identity provider.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<String, ClientError>;
}

pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl CredentialProvider for StaticCredential {
    async fn bearer_token(&self) -> Result<String, ClientError> {
        Ok(self.0.clone())
    }
}

pub struct MissingCredential;

#[async_trait]
impl CredentialProvider for MissingCredential {
    async fn bearer_token(&self) -> Result<String, ClientError> {
        Err(ClientError::Auth("no signed-in session".to_string()))
    }
}

#[async_trait]
pub trait RecipeService: Send + Sync {
    async fn list_recipes(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, ClientError>;
    async fn get_recipe(&self, id: &RecipeId) -> Result<Recipe, ClientError>;
    async fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe, ClientError>;
    async fn update_recipe(
        &self,
        id: &RecipeId,
        patch: &RecipePatch,
    ) -> Result<Recipe, ClientError>;
    async fn delete_recipe(&self, id: &RecipeId) -> Result<(), ClientError>;
    async fn add_favorite(&self, id: &RecipeId) -> Result<(), ClientError>;
    async fn remove_favorite(&self, id: &RecipeId) -> Result<(), ClientError>;
    async fn generate_recipe(
        &self,
        request: &GenerateRecipeRequest,
    ) -> Result<Recipe, ClientError>;
}

#[async_trait]
pub trait PantryService: Send + Sync {
    async fn list_items(&self, query: &PantryQuery) -> Result<Vec<PantryItem>, ClientError>;
    async fn get_item(&self, id: &PantryItemId) -> Result<PantryItem, ClientError>;
    async fn create_item(&self, item: &NewPantryItem) -> Result<PantryItem, ClientError>;
    async fn update_item(
        &self,
        id: &PantryItemId,
        patch: &PantryItemPatch,
    ) -> Result<PantryItem, ClientError>;
    async fn delete_item(&self, id: &PantryItemId) -> Result<(), ClientError>;
}
