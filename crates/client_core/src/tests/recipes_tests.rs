use super::*;

use crate::{
    events::event_channel,
    optimistic::MutationPolicy,
    store::EntityStore,
    test_support::{drain_notices, recipe, FakeRecipeApi},
};

fn screen_with(
    api: &Arc<FakeRecipeApi>,
    options: ScreenOptions,
    events: &EventSender,
) -> RecipeScreen {
    let service: Arc<dyn RecipeService> = api.clone();
    RecipeScreen::new(
        service,
        Arc::new(CachedList::per_screen()),
        options,
        events.clone(),
    )
}

async fn loaded_screen(
    recipes: Vec<Recipe>,
    options: ScreenOptions,
) -> (RecipeScreen, Arc<FakeRecipeApi>, EventSender) {
    let api = Arc::new(FakeRecipeApi::with(recipes));
    let events = event_channel();
    let screen = screen_with(&api, options, &events);
    screen
        .load(RecipeQuery::default())
        .await
        .expect("initial load");
    (screen, api, events)
}

fn shown_favorite(screen: &RecipeScreen, id: &str) -> Option<bool> {
    screen
        .list()
        .get(&RecipeId::new(id))
        .map(|recipe| recipe.is_favorite)
}

#[tokio::test]
async fn favorite_is_shown_while_the_request_is_in_flight() {
    let (screen, api, _events) =
        loaded_screen(vec![recipe("r-1", "Carbonara")], ScreenOptions::default()).await;
    let release = api.hold_next_favorite().await;

    let pending = screen
        .toggle_favorite(&RecipeId::new("r-1"))
        .expect("toggle");
    assert_eq!(shown_favorite(&screen, "r-1"), Some(true));

    let (outcome, ()) = tokio::join!(pending.settle(), async {
        assert_eq!(api.calls().await.last().map(String::as_str), Some("add_favorite r-1"));
        assert_eq!(shown_favorite(&screen, "r-1"), Some(true));
        assert_eq!(api.server_favorite("r-1").await, Some(false));
        let _ = release.send(());
    });

    assert_eq!(outcome, MutationOutcome::Confirmed(true));
    assert_eq!(shown_favorite(&screen, "r-1"), Some(true));
    assert_eq!(api.server_favorite("r-1").await, Some(true));
}

#[tokio::test]
async fn rejected_favorite_rolls_back_and_notifies() {
    let (screen, api, events) =
        loaded_screen(vec![recipe("r-1", "Carbonara")], ScreenOptions::default()).await;
    let mut rx = events.subscribe();
    api.set_fail_favorites(true);

    let outcome = screen
        .toggle_favorite_and_settle(&RecipeId::new("r-1"))
        .await
        .expect("toggle");

    assert!(matches!(
        outcome,
        MutationOutcome::RolledBack { value: false, .. }
    ));
    assert_eq!(shown_favorite(&screen, "r-1"), Some(false));
    let notices = drain_notices(&mut rx);
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].title, "Error");
    assert_eq!(
        notices[0].message,
        "Failed to update favorite status: Internal server error"
    );
}

#[tokio::test]
async fn unfavorite_uses_the_removal_endpoint() {
    let mut favorite = recipe("r-1", "Carbonara");
    favorite.is_favorite = true;
    let (screen, api, _events) = loaded_screen(vec![favorite], ScreenOptions::default()).await;

    let outcome = screen
        .toggle_favorite_and_settle(&RecipeId::new("r-1"))
        .await
        .expect("toggle");

    assert_eq!(outcome, MutationOutcome::Confirmed(false));
    assert_eq!(
        api.calls().await,
        vec!["list_recipes", "remove_favorite r-1"]
    );
}

#[tokio::test]
async fn toggling_an_unknown_recipe_sends_nothing() {
    let (screen, api, _events) =
        loaded_screen(vec![recipe("r-1", "Carbonara")], ScreenOptions::default()).await;

    let err = screen
        .toggle_favorite(&RecipeId::new("missing"))
        .err()
        .expect("must fail");

    assert!(matches!(err, ClientError::MissingEntity(_)));
    assert_eq!(api.calls().await, vec!["list_recipes"]);
}

#[tokio::test]
async fn rapid_toggles_are_coalesced_under_serialized_policy() {
    let (screen, api, _events) =
        loaded_screen(vec![recipe("r-1", "Carbonara")], ScreenOptions::default()).await;
    let id = RecipeId::new("r-1");

    let first = screen.toggle_favorite(&id).expect("first toggle");
    let second = screen.toggle_favorite(&id).expect("second toggle");
    assert!(second.is_queued());
    assert_eq!(shown_favorite(&screen, "r-1"), Some(false));

    let (first, second) = tokio::join!(first.settle(), second.settle());

    assert_eq!(first, MutationOutcome::Confirmed(false));
    assert_eq!(second, MutationOutcome::Coalesced);
    assert_eq!(
        api.calls().await,
        vec!["list_recipes", "add_favorite r-1", "remove_favorite r-1"]
    );
    assert_eq!(api.server_favorite("r-1").await, Some(false));
}

#[tokio::test]
async fn confirmed_toggle_reloads_when_configured() {
    let options = ScreenOptions {
        reload_after_toggle: true,
        ..ScreenOptions::default()
    };
    let (screen, api, _events) = loaded_screen(vec![recipe("r-1", "Carbonara")], options).await;

    screen
        .toggle_favorite_and_settle(&RecipeId::new("r-1"))
        .await
        .expect("toggle");

    assert_eq!(
        api.calls().await,
        vec!["list_recipes", "add_favorite r-1", "list_recipes"]
    );
}

#[tokio::test]
async fn failed_load_keeps_the_cached_list() {
    let (screen, api, events) =
        loaded_screen(vec![recipe("r-1", "Carbonara")], ScreenOptions::default()).await;
    let mut rx = events.subscribe();
    api.fail_lists
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = screen.refresh().await.expect_err("must fail");

    assert_eq!(err.to_string(), "Internal server error");
    assert_eq!(screen.recipes().len(), 1);
    assert!(!screen.is_loading());
    assert_eq!(
        drain_notices(&mut rx)[0].message,
        "Failed to load recipes: Internal server error"
    );
}

#[tokio::test]
async fn refresh_reuses_the_last_query() {
    let mut favorite = recipe("r-2", "Pesto");
    favorite.is_favorite = true;
    let api = Arc::new(FakeRecipeApi::with(vec![recipe("r-1", "Carbonara"), favorite]));
    let events = event_channel();
    let screen = screen_with(&api, ScreenOptions::default(), &events);

    let query = RecipeQuery {
        favorites: Some(true),
        ..RecipeQuery::default()
    };
    assert_eq!(screen.load(query.clone()).await.expect("load"), 1);
    assert_eq!(screen.refresh().await.expect("refresh"), 1);
    assert_eq!(screen.query(), query);
}

#[tokio::test]
async fn generated_recipe_is_cached_only_once_saved() {
    let (screen, api, _events) =
        loaded_screen(vec![recipe("r-1", "Carbonara")], ScreenOptions::default()).await;

    let generated = screen
        .generate(GenerateRecipeRequest {
            ingredients: vec!["tomato".into(), "basil".into()],
            ..GenerateRecipeRequest::default()
        })
        .await
        .expect("generate");
    assert_eq!(screen.recipes().len(), 1);

    let saved = screen.save_generated(generated).await.expect("save");

    assert!(saved.is_owned);
    assert_eq!(saved.ingredients, vec!["tomato", "basil"]);
    assert_eq!(screen.recipes()[0].id, saved.id);
    assert_eq!(
        api.calls().await,
        vec![
            "list_recipes",
            "generate_recipe tomato,basil",
            "create_recipe Chef's Surprise"
        ]
    );
}

#[tokio::test]
async fn update_and_delete_keep_the_list_in_step() {
    let (screen, _api, _events) = loaded_screen(
        vec![recipe("r-1", "Carbonara"), recipe("r-2", "Pesto")],
        ScreenOptions::default(),
    )
    .await;

    screen
        .update(
            &RecipeId::new("r-2"),
            RecipePatch {
                name: Some("Pesto Genovese".into()),
                ..RecipePatch::default()
            },
        )
        .await
        .expect("update");
    screen
        .delete(&RecipeId::new("r-1"))
        .await
        .expect("delete");

    let names: Vec<_> = screen.recipes().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["Pesto Genovese"]);
}

#[tokio::test]
async fn shared_cache_shows_a_favorite_on_every_screen() {
    let api = Arc::new(FakeRecipeApi::with(vec![recipe("r-1", "Carbonara")]));
    let events = event_channel();
    let store = Arc::new(EntityStore::new());
    let service: Arc<dyn RecipeService> = api.clone();
    let favorites = favorite_coordinator(ScreenOptions::default(), events.clone());
    let home = RecipeScreen::with_favorites(
        Arc::clone(&service),
        Arc::new(CachedList::shared(Arc::clone(&store))),
        ScreenOptions::default(),
        favorites.clone(),
        events.clone(),
    );
    let detail = RecipeScreen::with_favorites(
        service,
        Arc::new(CachedList::shared(store)),
        ScreenOptions::default(),
        favorites,
        events,
    );
    home.load(RecipeQuery::default()).await.expect("home load");
    detail
        .load_one(&RecipeId::new("r-1"))
        .await
        .expect("detail load");

    detail
        .toggle_favorite_and_settle(&RecipeId::new("r-1"))
        .await
        .expect("toggle");

    assert_eq!(shown_favorite(&home, "r-1"), Some(true));
}

#[tokio::test]
async fn per_screen_cache_stays_stale_until_reload() {
    let api = Arc::new(FakeRecipeApi::with(vec![recipe("r-1", "Carbonara")]));
    let events = event_channel();
    let home = screen_with(&api, ScreenOptions::default(), &events);
    let detail = screen_with(&api, ScreenOptions::default(), &events);
    home.load(RecipeQuery::default()).await.expect("home load");
    detail
        .load_one(&RecipeId::new("r-1"))
        .await
        .expect("detail load");

    detail
        .toggle_favorite_and_settle(&RecipeId::new("r-1"))
        .await
        .expect("toggle");
    assert_eq!(shown_favorite(&home, "r-1"), Some(false));

    home.refresh().await.expect("reload");
    assert_eq!(shown_favorite(&home, "r-1"), Some(true));
}

#[tokio::test]
async fn unserialized_policy_sends_every_toggle() {
    let options = ScreenOptions {
        mutation_policy: MutationPolicy::Unserialized,
        ..ScreenOptions::default()
    };
    let (screen, api, _events) = loaded_screen(vec![recipe("r-1", "Carbonara")], options).await;
    let id = RecipeId::new("r-1");

    let first = screen.toggle_favorite(&id).expect("first toggle");
    let second = screen.toggle_favorite(&id).expect("second toggle");
    assert!(!second.is_queued());
    let (first, second) = tokio::join!(first.settle(), second.settle());

    assert_eq!(first, MutationOutcome::Confirmed(true));
    assert_eq!(second, MutationOutcome::Confirmed(false));
    assert_eq!(
        api.calls().await,
        vec!["list_recipes", "add_favorite r-1", "remove_favorite r-1"]
    );
}
