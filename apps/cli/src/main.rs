use anyhow::{bail, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use client_core::{
    filter::{PantryFilter, PantrySort, RecipeFilter},
    grocery::GroceryList,
    load_settings, ClientEvent, KitchenClient, MutationOutcome,
};
use shared::{
    domain::{Difficulty, PantryItemId, RecipeId},
    protocol::{GenerateRecipeRequest, PantryItem, PantryQuery, Recipe, RecipeQuery},
};
use tokio::sync::broadcast;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "kitchen", about = "Recipes, pantry and groceries from the terminal")]
struct Cli {
    /// Overrides `api_base_url` from kitchen.toml and the environment.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(subcommand)]
    Recipes(RecipeCommand),
    #[command(subcommand)]
    Pantry(PantryCommand),
    #[command(subcommand)]
    Grocery(GroceryCommand),
}

#[derive(Subcommand, Debug)]
enum RecipeCommand {
    List(RecipeListArgs),
    Show { id: String },
    Favorite { id: String },
    Unfavorite { id: String },
    Generate {
        #[arg(required = true)]
        ingredients: Vec<String>,
        #[arg(long)]
        cuisine: Option<String>,
        #[arg(long)]
        servings: Option<u32>,
        /// Save the generated recipe to your collection.
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
struct RecipeListArgs {
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long)]
    cuisine: Option<String>,
    #[arg(long)]
    tag: Option<String>,
    #[arg(long)]
    favorites: bool,
    #[arg(long)]
    owned: bool,
}

#[derive(Subcommand, Debug)]
enum PantryCommand {
    List {
        #[arg(long, default_value = "")]
        search: String,
        /// Only items expiring within the configured number of days.
        #[arg(long)]
        expiring: bool,
    },
    Adjust {
        id: String,
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
    /// Prints the pantry under each sort order in turn.
    SortCycle,
}

#[derive(Subcommand, Debug)]
enum GroceryCommand {
    /// Ingredients of a recipe that the pantry does not cover.
    Missing { recipe_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(url) = cli.api_url {
        settings.api_base_url = url;
    }
    if let Some(token) = cli.token {
        settings.auth_token = Some(token);
    }
    debug!("cli: settings={settings:?}");

    let client = KitchenClient::from_settings(settings)?;
    let mut events = client.subscribe_events();
    let result = match cli.command {
        Command::Recipes(command) => run_recipes(&client, command).await,
        Command::Pantry(command) => run_pantry(&client, command).await,
        Command::Grocery(command) => run_grocery(&client, command).await,
    };
    print_notices(&mut events);
    result
}

async fn run_recipes(client: &KitchenClient, command: RecipeCommand) -> Result<()> {
    let screen = client.recipe_screen();
    match command {
        RecipeCommand::List(args) => {
            let query = RecipeQuery {
                search: Some(args.search.clone()).filter(|s| !s.is_empty()),
                cuisine: args.cuisine.clone(),
                favorites: args.favorites.then_some(true),
                owned: args.owned.then_some(true),
                ..RecipeQuery::default()
            };
            screen.load(query).await?;
            let filter = RecipeFilter {
                search: args.search,
                cuisine: args.cuisine,
                tag: args.tag,
                favorites_only: args.favorites,
                owned_only: args.owned,
                ..RecipeFilter::default()
            };
            for recipe in screen.visible(&filter) {
                print_recipe_row(&recipe);
            }
        }
        RecipeCommand::Show { id } => {
            let recipe = screen.load_one(&RecipeId::new(id)).await?;
            print_recipe(&recipe);
        }
        RecipeCommand::Favorite { id } => set_favorite(&screen, id, true).await?,
        RecipeCommand::Unfavorite { id } => set_favorite(&screen, id, false).await?,
        RecipeCommand::Generate {
            ingredients,
            cuisine,
            servings,
            save,
        } => {
            let generated = screen
                .generate(GenerateRecipeRequest {
                    ingredients,
                    cuisine,
                    difficulty: Some(Difficulty::Easy),
                    servings,
                    dietary_notes: None,
                })
                .await?;
            print_recipe(&generated);
            if save {
                let saved = screen.save_generated(generated).await?;
                println!("saved id={}", saved.id);
            }
        }
    }
    Ok(())
}

async fn set_favorite(
    screen: &client_core::RecipeScreen,
    id: String,
    favorite: bool,
) -> Result<()> {
    let id = RecipeId::new(id);
    screen.load_one(&id).await?;
    match screen.set_favorite(&id, favorite)?.settle().await {
        MutationOutcome::Confirmed(value) => println!("{id} favorite={value}"),
        MutationOutcome::Coalesced => println!("{id} favorite={favorite} (merged)"),
        MutationOutcome::RolledBack { value, error } => {
            bail!("{id} favorite stays {value}: {error}")
        }
    }
    Ok(())
}

async fn run_pantry(client: &KitchenClient, command: PantryCommand) -> Result<()> {
    let screen = client.pantry_screen();
    screen.load(PantryQuery::default()).await?;
    match command {
        PantryCommand::List { search, expiring } => {
            let today = Local::now().date_naive();
            let filter = PantryFilter {
                search,
                expiring_within: expiring.then_some((today, client.settings().expiring_soon_days)),
                ..PantryFilter::default()
            };
            for item in screen.visible(&filter) {
                print_pantry_row(&item);
            }
        }
        PantryCommand::Adjust { id, delta } => {
            let id = PantryItemId::new(id);
            match screen.adjust_quantity_and_settle(&id, delta).await? {
                None => bail!("{id}: quantity cannot go below zero"),
                Some(MutationOutcome::Confirmed(quantity)) if quantity.is_zero() => {
                    println!("{id} removed")
                }
                Some(MutationOutcome::Confirmed(quantity)) => println!("{id} quantity={quantity}"),
                Some(MutationOutcome::Coalesced) => println!("{id} merged"),
                Some(MutationOutcome::RolledBack { value, error }) => {
                    bail!("{id} quantity stays {value}: {error}")
                }
            }
        }
        PantryCommand::SortCycle => {
            for _ in PantrySort::ALL {
                println!("== {} ==", screen.sort().label());
                for item in screen.visible(&PantryFilter::default()) {
                    print_pantry_row(&item);
                }
                screen.cycle_sort();
            }
        }
    }
    Ok(())
}

async fn run_grocery(client: &KitchenClient, command: GroceryCommand) -> Result<()> {
    match command {
        GroceryCommand::Missing { recipe_id } => {
            let recipe = client
                .recipe_screen()
                .load_one(&RecipeId::new(recipe_id))
                .await?;
            let pantry = client.pantry_screen();
            pantry.load(PantryQuery::default()).await?;

            let mut list = GroceryList::new();
            let added = list.add_missing_ingredients(&recipe, &pantry.items());
            println!("{added} item(s) to buy for {}", recipe.name);
            for item in list.items() {
                println!("  [ ] {}", item.name);
            }
        }
    }
    Ok(())
}

fn print_recipe_row(recipe: &Recipe) {
    let star = if recipe.is_favorite { "*" } else { " " };
    println!(
        "{star} {}\t{} ({}, {})",
        recipe.id, recipe.name, recipe.cuisine, recipe.difficulty
    );
}

fn print_recipe(recipe: &Recipe) {
    print_recipe_row(recipe);
    if !recipe.description.is_empty() {
        println!("  {}", recipe.description);
    }
    println!(
        "  prep {} / cook {} / serves {}",
        recipe.prep_time, recipe.cook_time, recipe.servings
    );
    for ingredient in &recipe.ingredients {
        println!("  - {ingredient}");
    }
    for (step, instruction) in recipe.instructions.iter().enumerate() {
        println!("  {}. {instruction}", step + 1);
    }
}

fn print_pantry_row(item: &PantryItem) {
    let expires = item
        .expiration_date
        .map(|date| format!(" expires {date}"))
        .unwrap_or_default();
    println!(
        "{}\t{} {} x{} {:?}{expires}",
        item.id, item.emoji, item.name, item.quantity, item.unit
    );
}

fn print_notices(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(notice) = event {
            eprintln!("{}: {}", notice.title, notice.message);
        }
    }
}
