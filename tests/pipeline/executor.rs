use crate::common::*;
use ormquery_core::pipeline::{from_fn, named_sync_fn};
use ormquery_core::{Middleware, QueryBuilder, QueryError};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn mark(log: &Log, label: &str) -> Arc<dyn Middleware> {
    let log = Arc::clone(log);
    let label = label.to_string();
    named_sync_fn(label.clone(), move |_| {
        log.lock().push(label.clone());
        Ok(())
    })
}

fn delayed_mark(log: &Log, label: &str, delay_ms: u64) -> Arc<dyn Middleware> {
    let log = Arc::clone(log);
    let label = label.to_string();
    from_fn(move |_| {
        let log = Arc::clone(&log);
        let label = label.clone();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            log.lock().push(label);
            Ok(())
        })
    })
}

#[tokio::test]
async fn test_lifecycle_order() {
    let log: Log = Arc::default();
    let mut builder = library_builder("people");
    builder
        .after("end", [mark(&log, "after:end")])
        .unwrap()
        .before("end", [mark(&log, "before:end")])
        .unwrap()
        .before("query", [mark(&log, "before:query")])
        .unwrap()
        .after("start", [mark(&log, "after:start")])
        .unwrap()
        .before("start", [mark(&log, "before:start")])
        .unwrap();

    let result = builder.execute(json!({})).await.unwrap().into_value();
    assert_eq!(field(&result, "first_name"), vec!["John", "Jane", "Bob"]);
    assert_eq!(
        *log.lock(),
        vec!["before:start", "after:start", "before:query", "before:end", "after:end"]
    );
}

#[tokio::test]
async fn test_end_body_runs_between_before_and_after_end() {
    let mut builder = library_builder("people");
    builder
        .before(
            "end",
            [named_sync_fn("before", |context| {
                context.set("seen.before", json!(context.get("result").is_some()));
                Ok(())
            })],
        )
        .unwrap()
        .after(
            "end",
            [named_sync_fn("after", |context| {
                context.set("seen.after", json!(context.get("result").is_some()));
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
    assert_eq!(context.get("seen"), Some(json!({"before": false, "after": true})));
}

#[tokio::test]
async fn test_groups_run_sequentially_and_middlewares_concurrently() {
    let log: Log = Arc::default();
    let mut builder = library_builder("people");
    builder
        .before(
            "end",
            [delayed_mark(&log, "slow", 30), delayed_mark(&log, "fast", 0)],
        )
        .unwrap()
        .before("end", [mark(&log, "next group")])
        .unwrap();

    builder.execute(json!({})).await.unwrap();
    assert_eq!(*log.lock(), vec!["fast", "slow", "next group"]);
}

#[tokio::test]
async fn test_failure_aborts_remaining_lifecycle() {
    let log: Log = Arc::default();
    let adapter = Arc::new(RecordingAdapter::new(library_adapter()));
    let mut builder = QueryBuilder::with_adapter(adapter.clone());
    builder
        .set_option("base_query", json!("people"))
        .after(
            "start",
            [named_sync_fn("failing", |context| Err(context.reject("boom")))],
        )
        .unwrap()
        .before("end", [mark(&log, "never")])
        .unwrap();

    let err = builder.execute(json!({})).await.unwrap_err();
    assert!(matches!(&err, QueryError::Middleware { stage, .. } if stage == "start"));
    assert_eq!(err.message(), "boom");
    assert!(log.lock().is_empty());
    assert_eq!(adapter.calls(), vec!["create_query"]);
}

#[tokio::test]
async fn test_create_query_must_return_a_query() {
    let adapter = RecordingAdapter::new(library_adapter()).without_query();
    let builder = QueryBuilder::with_adapter(Arc::new(adapter));

    let err = builder.execute(json!({})).await.unwrap_err();
    assert!(matches!(err, QueryError::AdapterContract(_)));
    assert_eq!(err.message(), "Adapter's \"createQuery\" function must return a query");
}

#[tokio::test]
async fn test_execution_options_override_config_options() {
    let mut builder = library_builder("people");
    builder.before(
        "end",
        [named_sync_fn("copy", |context| {
            context.set("copied", context.option("base_query").unwrap_or_default());
            Ok(())
        })],
    )
    .unwrap();

    let output = builder
        .execute(json!({"base_query": "books", "result": "context"}))
        .await
        .unwrap();
    assert!(output.is_context());
    let context = output.into_context().unwrap();
    assert_eq!(context.get("copied"), Some(json!("books")));
    assert_eq!(field(&context.get("result").unwrap(), "title"), vec!["Dune", "Emma", "Neuromancer"]);

    // The builder's own options are untouched
    assert_eq!(builder.config().options().get("base_query"), Some(&json!("people")));
}

#[tokio::test]
async fn test_executions_do_not_share_state() {
    let mut builder = library_builder("people");
    builder
        .after(
            "start",
            [named_sync_fn("count", |context| {
                let runs = context.get("runs").and_then(|v| v.as_u64()).unwrap_or(0);
                context.set("runs", json!(runs + 1));
                context.add_stages(["extra"]);
                Ok(())
            })],
        )
        .unwrap();

    for _ in 0..2 {
        let context = builder
            .execute(json!({"result": "context"}))
            .await
            .unwrap()
            .into_context()
            .unwrap();
        assert_eq!(context.get("runs"), Some(json!(1)));
        assert_eq!(context.stages(), vec!["start", "extra", "end"]);
    }
}

#[tokio::test]
async fn test_metrics_count_adapter_calls() {
    let mut builder = library_builder("people");
    builder
        .before(
            "end",
            [from_fn(|context| {
                Box::pin(async move {
                    let total = context.count(None).await?;
                    context.set("total", json!(total));
                    Ok::<(), QueryError>(())
                })
            })],
        )
        .unwrap();

    let context = builder
        .execute(json!({"result": "context"}))
        .await
        .unwrap()
        .into_context()
        .unwrap();
    assert_eq!(context.get("total"), Some(json!(3)));

    let metrics = context.metrics();
    assert_eq!(metrics.counts, 1);
    assert_eq!(metrics.queries, 1);
    assert_eq!(metrics.joins_applied, 0);
}
