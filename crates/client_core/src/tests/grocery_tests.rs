use super::*;

use crate::test_support::{pantry_item, recipe};

fn sample_list() -> (GroceryList, Uuid) {
    let mut list = GroceryList::new();
    list.add("Milk", Some("1 gal".into()), FoodCategory::Dairy)
        .expect("milk");
    let bananas = list
        .add("Bananas", None, FoodCategory::Produce)
        .expect("bananas");
    list.add("Bread", None, FoodCategory::Bakery)
        .expect("bread");
    list.toggle_completed(bananas).expect("toggle");
    (list, bananas)
}

fn names(items: Vec<&GroceryItem>) -> Vec<&str> {
    items.into_iter().map(|item| item.name.as_str()).collect()
}

#[test]
fn search_hides_completed_items_when_asked() {
    let (list, _) = sample_list();

    let filter = GroceryFilter {
        search: "an".into(),
        show_completed: false,
        ..GroceryFilter::default()
    };
    assert!(list.filtered(&filter).is_empty());

    let with_completed = GroceryFilter {
        search: "an".into(),
        ..GroceryFilter::default()
    };
    assert_eq!(names(list.filtered(&with_completed)), vec!["Bananas"]);
}

#[test]
fn category_filter_combines_with_search() {
    let (list, _) = sample_list();

    let dairy = GroceryFilter {
        category: Some(FoodCategory::Dairy),
        ..GroceryFilter::default()
    };
    assert_eq!(names(list.filtered(&dairy)), vec!["Milk"]);

    let dairy_bread = GroceryFilter {
        search: "bread".into(),
        category: Some(FoodCategory::Dairy),
        ..GroceryFilter::default()
    };
    assert!(list.filtered(&dairy_bread).is_empty());
}

#[test]
fn toggling_and_clearing_completed_items() {
    let (mut list, bananas) = sample_list();
    assert_eq!(list.remaining(), 2);

    assert_eq!(list.toggle_completed(bananas), Some(false));
    assert_eq!(list.remaining(), 3);
    assert_eq!(list.toggle_completed(bananas), Some(true));

    assert_eq!(list.clear_completed(), 1);
    assert!(list.get(bananas).is_none());
    assert_eq!(list.toggle_completed(bananas), None);
}

#[test]
fn blank_names_are_not_added() {
    let mut list = GroceryList::new();
    assert!(list.add("   ", None, FoodCategory::Other).is_none());
    let id = list
        .add(" Eggs ", Some(" ".into()), FoodCategory::Dairy)
        .expect("eggs");

    let eggs = list.get(id).expect("stored");
    assert_eq!(eggs.name, "Eggs");
    assert_eq!(eggs.quantity, None);
}

#[test]
fn remove_returns_the_item() {
    let (mut list, bananas) = sample_list();

    let removed = list.remove(bananas).expect("removed");

    assert_eq!(removed.name, "Bananas");
    assert_eq!(list.items().len(), 2);
    assert!(list.remove(bananas).is_none());
}

#[test]
fn missing_ingredients_skip_pantry_stock_and_listed_items() {
    let mut pancakes = recipe("r-1", "Pancakes");
    pancakes.ingredients = vec![
        "2 cups flour".into(),
        "1 cup milk".into(),
        "2 eggs".into(),
        "1 tbsp sugar".into(),
    ];
    let pantry = vec![
        pantry_item("p-1", "Flour", 1),
        pantry_item("p-2", "Sugar", 0),
    ];
    let mut list = GroceryList::new();
    list.add("Milk", None, FoodCategory::Dairy).expect("milk");

    let added = list.add_missing_ingredients(&pancakes, &pantry);

    assert_eq!(added, 2);
    let names: Vec<_> = list.items().iter().map(|item| item.name.as_str()).collect();
    assert_eq!(names, vec!["Milk", "2 eggs", "1 tbsp sugar"]);
    assert_eq!(list.add_missing_ingredients(&pancakes, &pantry), 0);
}
