use crate::common::*;
use ormquery_core::{EagerLoadingPlugin, QueryBuilder};
use serde_json::{json, Value};
use std::sync::Arc;

fn loading(plugin: EagerLoadingPlugin, base: &str) -> (QueryBuilder, Arc<RecordingAdapter>) {
    let adapter = Arc::new(RecordingAdapter::new(library_adapter()));
    let mut builder = QueryBuilder::with_adapter(adapter.clone());
    builder.set_option("base_query", json!(base));
    builder.use_plugin(plugin).unwrap();
    (builder, adapter)
}

fn theme_names(person: &Value) -> Vec<&str> {
    person["books"]
        .as_array()
        .map(|books| {
            books
                .iter()
                .filter_map(|book| book["theme"]["name"].as_str())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_nested_relations_are_hydrated() {
    let (builder, adapter) = loading(EagerLoadingPlugin::new().load(["books.theme"], json!({})), "Person");

    let result = builder.execute(json!({})).await.unwrap().into_value();
    let people = result.as_array().unwrap();

    assert_eq!(field(&people[0]["books"], "title"), vec!["Dune", "Neuromancer"]);
    assert_eq!(theme_names(&people[0]), vec!["science fiction", "science fiction"]);
    assert_eq!(theme_names(&people[1]), vec!["romance"]);
    assert_eq!(adapter.calls_to("eager_load"), vec!["eager_load:books.theme"]);
}

#[tokio::test]
async fn test_loads_run_in_declaration_order_when_enabled() {
    let plugin = EagerLoadingPlugin::new()
        .load(["books"], json!({}))
        .load_when_sync(|context| context.option("with_people").is_some(), ["people"], json!({}))
        .load_when(
            |context| Box::pin(async move { Ok(context.option("with_theme") == Some(json!(true))) }),
            ["books.theme"],
            json!({}),
        );
    let (builder, adapter) = loading(plugin, "Theme");

    let result = builder
        .execute(json!({"with_theme": true}))
        .await
        .unwrap()
        .into_value();
    assert_eq!(
        adapter.calls_to("eager_load"),
        vec!["eager_load:books", "eager_load:books.theme"]
    );

    let romance = &result.as_array().unwrap()[1];
    assert_eq!(field(&romance["books"], "title"), vec!["Emma"]);
    assert_eq!(romance["books"][0]["theme"]["name"], json!("romance"));
}

#[tokio::test]
async fn test_unregistered_table_cannot_be_eager_loaded() {
    let (builder, _) = loading(EagerLoadingPlugin::new().load(["people"], json!({})), "books_people");

    let err = builder.execute(json!({})).await.unwrap_err();
    assert_eq!(err.message(), "No model is registered for table \"books_people\"");
}
