//! REST client for the recipe and pantry API.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{PantryItemId, RecipeId},
    error::ApiErrorBody,
    protocol::{
        GenerateRecipeRequest, NewPantryItem, NewRecipe, PantryItem, PantryItemPatch,
        PantryQuery, Recipe, RecipePatch, RecipeQuery,
    },
};
use tracing::debug;
use url::Url;

use crate::{
    error::ClientError,
    service::{CredentialProvider, PantryService, RecipeService},
};

pub struct HttpApi {
    http: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpApi {
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, credentials, None)
    }

    pub fn with_timeout(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url,
            credentials,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidConfig(format!("base url cannot carry a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ClientError> {
        let token = self.credentials.bearer_token().await?;
        let url = self.endpoint(segments)?;
        debug!("http: {method} {url}");
        Ok(self.http.request(method, url).bearer_auth(token))
    }
}

/// Accepts `http(s)` URLs only; the path becomes the prefix of every endpoint.
pub fn parse_base_url(raw: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| ClientError::InvalidConfig(format!("invalid api base url '{raw}': {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::InvalidConfig(format!(
            "api base url must use http or https, got '{other}'"
        ))),
    }
}

async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = serde_json::from_slice::<ApiErrorBody>(&body)
        .ok()
        .and_then(ApiErrorBody::into_message);
    Err(ClientError::status(status.as_u16(), message))
}

async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let body = send(request).await?.bytes().await?;
    serde_json::from_slice(&body).map_err(|err| ClientError::Decode(err.to_string()))
}

#[async_trait]
impl RecipeService for HttpApi {
    async fn list_recipes(&self, query: &RecipeQuery) -> Result<Vec<Recipe>, ClientError> {
        fetch_json(self.request(Method::GET, &["recipes"]).await?.query(query)).await
    }

    async fn get_recipe(&self, id: &RecipeId) -> Result<Recipe, ClientError> {
        fetch_json(self.request(Method::GET, &["recipes", id.as_str()]).await?).await
    }

    async fn create_recipe(&self, recipe: &NewRecipe) -> Result<Recipe, ClientError> {
        fetch_json(self.request(Method::POST, &["recipes"]).await?.json(recipe)).await
    }

    async fn update_recipe(
        &self,
        id: &RecipeId,
        patch: &RecipePatch,
    ) -> Result<Recipe, ClientError> {
        fetch_json(
            self.request(Method::PUT, &["recipes", id.as_str()])
                .await?
                .json(patch),
        )
        .await
    }

    async fn delete_recipe(&self, id: &RecipeId) -> Result<(), ClientError> {
        send(self.request(Method::DELETE, &["recipes", id.as_str()]).await?).await?;
        Ok(())
    }

    async fn add_favorite(&self, id: &RecipeId) -> Result<(), ClientError> {
        send(
            self.request(Method::POST, &["recipes", id.as_str(), "favorite"])
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn remove_favorite(&self, id: &RecipeId) -> Result<(), ClientError> {
        send(
            self.request(Method::DELETE, &["recipes", id.as_str(), "favorite"])
                .await?,
        )
        .await?;
        Ok(())
    }

    async fn generate_recipe(
        &self,
        request: &GenerateRecipeRequest,
    ) -> Result<Recipe, ClientError> {
        fetch_json(
            self.request(Method::POST, &["recipes", "generate"])
                .await?
                .json(request),
        )
        .await
    }
}

#[async_trait]
impl PantryService for HttpApi {
    async fn list_items(&self, query: &PantryQuery) -> Result<Vec<PantryItem>, ClientError> {
        fetch_json(self.request(Method::GET, &["pantry"]).await?.query(query)).await
    }

    async fn get_item(&self, id: &PantryItemId) -> Result<PantryItem, ClientError> {
        fetch_json(self.request(Method::GET, &["pantry", id.as_str()]).await?).await
    }

    async fn create_item(&self, item: &NewPantryItem) -> Result<PantryItem, ClientError> {
        fetch_json(self.request(Method::POST, &["pantry"]).await?.json(item)).await
    }

    async fn update_item(
        &self,
        id: &PantryItemId,
        patch: &PantryItemPatch,
    ) -> Result<PantryItem, ClientError> {
        fetch_json(
            self.request(Method::PUT, &["pantry", id.as_str()])
                .await?
                .json(patch),
        )
        .await
    }

    async fn delete_item(&self, id: &PantryItemId) -> Result<(), ClientError> {
        send(self.request(Method::DELETE, &["pantry", id.as_str()]).await?).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
