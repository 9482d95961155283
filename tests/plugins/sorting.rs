use crate::common::*;
use ormquery_core::adapter::memory::where_eq;
use ormquery_core::plugins::sort_fn;
use ormquery_core::{QueryBuilder, SortDirection, SortingPlugin};
use serde_json::{json, Value};
use std::sync::Arc;

fn people_sorts() -> SortingPlugin {
    SortingPlugin::new()
        .sort_by_column("firstName", "first_name")
        .and_then(|plugin| plugin.sort_by_column("lastName", "last_name"))
        .and_then(|plugin| plugin.default_sort(["lastName-asc", "firstName"]))
        .unwrap()
}

fn sorted(plugin: SortingPlugin) -> (QueryBuilder, Arc<RecordingAdapter>) {
    let adapter = Arc::new(RecordingAdapter::new(library_adapter()));
    let mut builder = QueryBuilder::with_adapter(adapter.clone());
    builder.set_option("base_query", json!("people"));
    builder.use_plugin(plugin).unwrap();
    (builder, adapter)
}

#[tokio::test]
async fn test_default_sort_applies_without_request() {
    let (builder, adapter) = sorted(people_sorts());

    let result = builder.execute(json!({})).await.unwrap().into_value();
    assert_eq!(field(&result, "first_name"), vec!["Jane", "John", "Bob"]);
    assert_eq!(
        adapter.calls_to("order_query_by"),
        vec!["order_query_by:last_name:asc", "order_query_by:first_name:asc"]
    );
}

#[tokio::test]
async fn test_requested_sorts_take_precedence_over_defaults() {
    let (builder, adapter) = sorted(people_sorts());

    let result = builder
        .execute(json!({"sort": "lastName-desc"}))
        .await
        .unwrap()
        .into_value();
    assert_eq!(field(&result, "first_name"), vec!["Bob", "Jane", "John"]);
    assert_eq!(
        adapter.calls_to("order_query_by"),
        vec!["order_query_by:last_name:desc", "order_query_by:first_name:asc"]
    );
}

#[tokio::test]
async fn test_undeclared_requested_sorts_are_ignored() {
    let (builder, adapter) = sorted(people_sorts());

    builder
        .execute(json!({"sort": ["age-desc", "firstName-DESC", ""]}))
        .await
        .unwrap();
    assert_eq!(
        adapter.calls_to("order_query_by"),
        vec!["order_query_by:first_name:desc", "order_query_by:last_name:asc"]
    );
}

#[tokio::test]
async fn test_custom_sort_definition_and_getter() {
    let plugin = SortingPlugin::new()
        .sort(
            "doesFirst",
            sort_fn(|query: Value, direction, context| {
                Box::pin(async move {
                    let query = where_eq(query, "last_name", "Doe")?;
                    context.adapter().order_query_by(query, "first_name", direction, context).await
                })
            }),
        )
        .unwrap()
        .sort_from("state.ordering");

    let (mut builder, _) = sorted(plugin);
    builder
        .after(
            "start",
            [ormquery_core::pipeline::named_sync_fn("ordering", |context| {
                context.set("ordering", json!("doesFirst-desc"));
                Ok(())
            })],
        )
        .unwrap();

    let result = builder.execute(json!({})).await.unwrap().into_value();
    assert_eq!(field(&result, "first_name"), vec!["John", "Jane"]);
}

#[test]
fn test_direction_display() {
    assert_eq!(SortDirection::Asc.to_string(), "asc");
    assert_eq!(SortDirection::Desc.to_string(), "desc");
}
