use crate::common::*;
use ormquery_core::adapter::memory::where_eq;
use ormquery_core::pipeline::{from_sync_fn, named_sync_fn};
use ormquery_core::{
    Context, JoinOptions, JoiningPlugin, QueryBuilder, QueryError, RelationOptions, Result,
};
use serde_json::json;
use std::sync::Arc;

/// people -> books_people -> books -> themes, declared out of order
fn library_joins() -> JoiningPlugin {
    JoiningPlugin::for_table("people")
        .join(
            "themes",
            JoinOptions::on("books.theme_id", "themes.id").requires("books"),
        )
        .and_then(|plugin| {
            plugin.join(
                "books",
                JoinOptions::on("books_people.book_id", "books.id").requires("books_people"),
            )
        })
        .and_then(|plugin| {
            plugin.join(
                "books_people",
                JoinOptions::on("people.id", "books_people.person_id"),
            )
        })
        .unwrap()
}

fn recording_builder(adapter: RecordingAdapter) -> (QueryBuilder, Arc<RecordingAdapter>) {
    let adapter = Arc::new(adapter);
    let mut builder = QueryBuilder::with_adapter(adapter.clone());
    builder.set_option("base_query", json!("people"));
    (builder, adapter)
}

/// Require `joins` and filter on `column = value` right after `start`
fn require_and_filter(
    builder: &mut QueryBuilder,
    joins: &'static [&'static str],
    column: &'static str,
    value: &'static str,
) {
    builder
        .after(
            "start",
            [named_sync_fn("require", move |context: &Context| -> Result<()> {
                context.require_join(joins.iter())?;
                let query = where_eq(context.current_query()?, column, value)?;
                context.set("query", query);
                Ok(())
            })],
        )
        .unwrap();
}

#[tokio::test]
async fn test_required_joins_are_applied_in_dependency_order() {
    let (mut builder, adapter) = recording_builder(RecordingAdapter::new(library_adapter()));
    builder.use_plugin(library_joins()).unwrap();
    require_and_filter(&mut builder, &["themes"], "themes.name", "romance");

    let result = builder.execute(json!({})).await.unwrap().into_value();
    assert_eq!(field(&result, "first_name"), vec!["Jane"]);
    assert_eq!(
        adapter.calls_to("apply_join_definition"),
        vec![
            "apply_join_definition:books_people",
            "apply_join_definition:books",
            "apply_join_definition:themes",
        ]
    );
}

#[tokio::test]
async fn test_joins_required_twice_are_applied_once() {
    let (mut builder, adapter) = recording_builder(RecordingAdapter::new(library_adapter()));
    builder.use_plugin(library_joins()).unwrap();
    builder
        .after(
            "start",
            [
                from_sync_fn(|context| context.require_join(["books"])),
                from_sync_fn(|context| context.require_join(["books", "books_people"])),
            ],
        )
        .unwrap()
        .after("start", [from_sync_fn(|context| context.require_join(["books"]))])
        .unwrap();

    let context = builder
        .execute(json!({"result": "context"}))
        .await
        .unwrap()
        .into_context()
        .unwrap();
    assert_eq!(adapter.calls_to("apply_join_definition").len(), 2);
    assert_eq!(context.metrics().joins_applied, 2);
}

#[tokio::test]
async fn test_undefined_join_is_rejected_before_anything_applies() {
    let (mut builder, adapter) = recording_builder(RecordingAdapter::new(library_adapter()));
    builder.use_plugin(library_joins()).unwrap();
    builder
        .after(
            "start",
            [from_sync_fn(|context| context.require_join(["books", "foo", "bar"]))],
        )
        .unwrap();

    let err = builder.execute(json!({})).await.unwrap_err();
    assert!(matches!(err, QueryError::JoinResolution(_)));
    assert_eq!(err.message(), "The following joins have not been defined: foo, bar");
    assert!(adapter.calls_to("apply_join_definition").is_empty());
}

#[tokio::test]
async fn test_undefined_join_leaves_the_query_untouched() {
    let (mut builder, adapter) = recording_builder(RecordingAdapter::new(library_adapter()));
    builder.use_plugin(library_joins()).unwrap();
    builder
        .after(
            "start",
            [named_sync_fn("require_undefined", |context: &Context| -> Result<()> {
                context.set("query_before", context.current_query()?);
                let err = context.require_join(["books", "foo"]).unwrap_err();
                context.set("join_error", json!(err.message()));
                Ok(())
            })],
        )
        .unwrap();

    let context = builder
        .execute(json!({"result": "context"}))
        .await
        .unwrap()
        .into_context()
        .unwrap();

    assert_eq!(
        context.get("join_error"),
        Some(json!("The following joins have not been defined: foo"))
    );
    assert_eq!(
        Some(context.current_query().unwrap()),
        context.get("query_before")
    );
    assert!(adapter.calls_to("apply_join_definition").is_empty());
    assert_eq!(context.metrics().joins_applied, 0);
}

#[tokio::test]
async fn test_adapter_refusing_a_join_fails_the_execution() {
    let (mut builder, adapter) =
        recording_builder(RecordingAdapter::new(library_adapter()).refusing_joins());
    builder.use_plugin(library_joins()).unwrap();
    builder
        .after("start", [from_sync_fn(|context| context.require_join(["books"]))])
        .unwrap();

    let err = builder.execute(json!({})).await.unwrap_err();
    assert_eq!(
        err.message(),
        "Adapter returned no result when applying join \"books_people\""
    );
    assert!(adapter.calls_to("execute_query").is_empty());
}

#[tokio::test]
async fn test_joins_required_after_the_query_stage_are_rejected() {
    let mut builder = library_builder("people");
    builder.use_plugin(library_joins()).unwrap();
    builder
        .before("end", [from_sync_fn(|context| context.require_join(["books"]))])
        .unwrap();

    let err = builder.execute(json!({})).await.unwrap_err();
    assert!(matches!(err, QueryError::JoinResolution(_)));
    assert_eq!(err.message(), "Joins must be required before the \"query\" stage: books");
}

#[tokio::test]
async fn test_require_join_without_plugin_is_a_configuration_error() {
    let mut builder = library_builder("people");
    builder
        .after("start", [from_sync_fn(|context| context.require_join(["books"]))])
        .unwrap();

    let err = builder.execute(json!({})).await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn test_relation_joins_are_derived_from_the_model() {
    let (mut builder, adapter) = recording_builder(RecordingAdapter::new(library_adapter()));
    builder.set_option("base_query", json!("Person"));
    builder
        .use_plugin(
            JoiningPlugin::for_model("Person")
                .relation("books", RelationOptions::default())
                .unwrap(),
        )
        .unwrap();
    require_and_filter(&mut builder, &["books"], "books.title", "Dune");

    let result = builder.execute(json!({})).await.unwrap().into_value();
    assert_eq!(field(&result, "first_name"), vec!["John", "Bob"]);
    assert_eq!(
        adapter.calls_to("apply_join_definition"),
        vec!["apply_join_definition:books_people", "apply_join_definition:books"]
    );
}

#[tokio::test]
async fn test_unknown_relation_fails_registration() {
    let mut builder = library_builder("Theme");
    let err = builder
        .use_plugin(
            JoiningPlugin::for_model("Theme")
                .relation("authors", RelationOptions::default())
                .unwrap(),
        )
        .err()
        .unwrap();
    assert_eq!(err.message(), "Model \"Theme\" has no relation \"authors\"");
}

#[tokio::test]
async fn test_circular_catalogue_fails_registration() {
    let plugin = JoiningPlugin::for_table("people")
        .join("a", JoinOptions::on("people.id", "a.person_id").requires("b"))
        .and_then(|plugin| plugin.join("b", JoinOptions::on("a.id", "b.a_id").requires("a")))
        .unwrap();

    let err = library_builder("people").use_plugin(plugin).err().unwrap();
    assert!(err.is_configuration());
    assert_eq!(err.message(), "Joins have a circular dependency: a -> b -> a");
}
