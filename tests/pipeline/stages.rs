use crate::common::*;
use ormquery_core::pipeline::named_sync_fn;
use ormquery_core::{Context, QueryBuilder, QueryError};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

fn schedule<F>(builder: &mut QueryBuilder, stage: &str, change: F)
where
    F: Fn(&Context) -> ormquery_core::Result<()> + Send + Sync + 'static,
{
    builder.after(stage, [named_sync_fn("schedule", change)]).unwrap();
}

#[tokio::test]
async fn test_stages_added_at_runtime_are_emitted() {
    let seen: Arc<Mutex<Vec<String>>> = Arc::default();
    let mut builder = library_builder("people");
    schedule(&mut builder, "start", |context| {
        context.add_stages(["audit", "report"]);
        Ok(())
    });
    for stage in ["audit", "report"] {
        let seen = Arc::clone(&seen);
        builder
            .on(
                stage,
                [named_sync_fn(stage, move |_| {
                    seen.lock().push(stage.to_string());
                    Ok(())
                })],
            )
            .unwrap();
    }

    let context = builder
        .execute(json!({"result": "context"}))
        .await
        .unwrap()
        .into_context()
        .unwrap();
    assert_eq!(*seen.lock(), vec!["audit", "report"]);
    assert_eq!(context.stages(), vec!["start", "audit", "report", "end"]);
}

#[tokio::test]
async fn test_non_string_stages_are_rejected() {
    let ran_after_foo = Arc::new(Mutex::new(false));
    let mut builder = library_builder("people");
    schedule(&mut builder, "start", |context| {
        context.add_stages(["foo"]);
        Ok(())
    });
    schedule(&mut builder, "foo", |context| {
        context.set_stages_value(&json!(["start", "foo", 42, "end"]))
    });
    {
        let ran_after_foo = Arc::clone(&ran_after_foo);
        builder
            .before(
                "end",
                [named_sync_fn("flag", move |_| {
                    *ran_after_foo.lock() = true;
                    Ok(())
                })],
            )
            .unwrap();
    }

    let err = builder.execute(json!({})).await.unwrap_err();
    assert!(matches!(err, QueryError::StageValidation(_)));
    assert_eq!(
        err.message(),
        "Stages must be an array of strings, got [string,string,number,string]"
    );
    assert!(!*ran_after_foo.lock());
}

#[tokio::test]
async fn test_stage_inserted_before_the_current_one_is_rejected() {
    let mut builder = library_builder("people");
    schedule(&mut builder, "start", |context| {
        context.add_stages(["a", "b"]);
        Ok(())
    });
    schedule(&mut builder, "b", |context| {
        context.set_stages(["start", "late", "a", "b", "end"]);
        Ok(())
    });

    let err = builder.execute(json!({})).await.unwrap_err();
    assert_eq!(
        err.message(),
        "Stage \"late\" was scheduled before the current stage \"b\""
    );
}

#[tokio::test]
async fn test_duplicate_runtime_stage_is_rejected() {
    let mut builder = library_builder("people");
    schedule(&mut builder, "start", |context| {
        context.add_stages(["audit", "audit"]);
        Ok(())
    });

    let err = builder.execute(json!({})).await.unwrap_err();
    assert_eq!(err.message(), "Stages must have no duplicates");
}

#[tokio::test]
async fn test_removing_end_is_rejected() {
    let mut builder = library_builder("people");
    schedule(&mut builder, "start", |context| {
        context.set_stages(["start", "audit"]);
        Ok(())
    });

    let err = builder.execute(json!({})).await.unwrap_err();
    assert_eq!(err.message(), "The last stage must be \"end\", got \"audit\"");
}

#[tokio::test]
async fn test_scheduling_the_query_stage_is_rejected() {
    let adapter = Arc::new(RecordingAdapter::new(library_adapter()));
    let mut builder = QueryBuilder::with_adapter(adapter.clone());
    builder.set_option("base_query", json!("people"));
    schedule(&mut builder, "start", |context| {
        context.add_stages(["query"]);
        Ok(())
    });

    let err = builder.execute(json!({})).await.unwrap_err();
    assert_eq!(err.message(), "Stage \"query\" is reserved and cannot be scheduled");
    assert!(adapter.calls_to("execute_query").is_empty());
}
