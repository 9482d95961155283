use crate::common::*;
use async_trait::async_trait;
use ormquery_core::pipeline::named_sync_fn;
use ormquery_core::{
    ComponentRegistry, Context, QueryBuilder, QueryConfig, QueryError, Result, Strategy,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

type Log = Arc<Mutex<Vec<String>>>;

/// Declares fixed stages and logs every body it runs
struct ListedStrategy {
    stages: Vec<String>,
    log: Log,
}

impl ListedStrategy {
    fn new(stages: &[&str], log: &Log) -> Self {
        Self {
            stages: stages.iter().map(|s| s.to_string()).collect(),
            log: Arc::clone(log),
        }
    }
}

#[async_trait]
impl Strategy for ListedStrategy {
    fn name(&self) -> &str {
        "listed"
    }

    fn stages(&self, _context: &Context) -> Vec<String> {
        self.stages.clone()
    }

    async fn on(&self, stage: &str, context: &Context) -> Result<()> {
        self.log.lock().push(format!("strategy:{stage}"));
        if context.option("fail_at").as_ref().and_then(Value::as_str) == Some(stage) {
            return Err(context.reject(format!("{stage} failed")));
        }
        Ok(())
    }
}

fn recording_builder(strategy: ListedStrategy) -> (QueryBuilder, Arc<RecordingAdapter>) {
    let adapter = Arc::new(RecordingAdapter::new(library_adapter()));
    let mut config = QueryConfig::new(adapter.clone()).with_strategy(Arc::new(strategy));
    config.set_option("base_query", json!("people"));
    (QueryBuilder::new(config), adapter)
}

fn mark(log: &Log, label: &'static str) -> Arc<dyn ormquery_core::Middleware> {
    let log = Arc::clone(log);
    named_sync_fn(label, move |_| {
        log.lock().push(label.to_string());
        Ok(())
    })
}

#[tokio::test]
async fn test_strategy_stages_run_between_start_and_end() {
    let log: Log = Arc::default();
    let (mut builder, adapter) = recording_builder(ListedStrategy::new(&["foo", "bar"], &log));
    builder
        .before("foo", [mark(&log, "before:foo")])
        .unwrap()
        .after("foo", [mark(&log, "after:foo")])
        .unwrap()
        .before("end", [mark(&log, "before:end")])
        .unwrap();

    let context = builder
        .execute(json!({"result": "context"}))
        .await
        .unwrap()
        .into_context()
        .unwrap();

    assert_eq!(
        *log.lock(),
        vec!["before:foo", "strategy:foo", "after:foo", "strategy:bar", "before:end"]
    );
    assert_eq!(context.stages(), vec!["start", "foo", "bar", "end"]);
    assert_eq!(adapter.calls(), vec!["create_query", "execute_query"]);
}

#[tokio::test]
async fn test_strategy_body_failure_aborts() {
    let log: Log = Arc::default();
    let (mut builder, adapter) = recording_builder(ListedStrategy::new(&["foo", "bar"], &log));
    builder.after("foo", [mark(&log, "after:foo")]).unwrap();

    let err = builder.execute(json!({"fail_at": "foo"})).await.unwrap_err();
    assert!(matches!(&err, QueryError::Middleware { stage, .. } if stage == "foo"));
    assert_eq!(err.message(), "foo failed");
    assert_eq!(*log.lock(), vec!["strategy:foo"]);
    assert!(adapter.calls_to("execute_query").is_empty());
}

#[tokio::test]
async fn test_duplicate_strategy_stages_are_rejected() {
    let log: Log = Arc::default();
    let (builder, adapter) = recording_builder(ListedStrategy::new(&["foo", "bar", "foo"], &log));

    let err = builder.execute(json!({})).await.unwrap_err();
    assert!(matches!(err, QueryError::StageValidation(_)));
    assert_eq!(err.message(), "Stages must have no duplicates");
    assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn test_reserved_strategy_stages_are_rejected_before_any_adapter_call() {
    for reserved in ["start", "query", "end"] {
        let log: Log = Arc::default();
        let (builder, adapter) =
            recording_builder(ListedStrategy::new(&["foo", reserved], &log));

        let err = builder.execute(json!({})).await.unwrap_err();
        assert_eq!(err.message(), "Stages must not be end, query, start");
        assert!(adapter.calls().is_empty());
        assert!(log.lock().is_empty());
    }
}

#[tokio::test]
async fn test_strategy_resolved_by_name() {
    let log: Log = Arc::default();
    let registry = ComponentRegistry::with_defaults();
    {
        let log = Arc::clone(&log);
        registry.register_strategy(
            "listed",
            Arc::new(move |options: &Value| -> Result<Arc<dyn Strategy>> {
                let stages: Vec<String> = serde_json::from_value(options["stages"].clone())?;
                Ok(Arc::new(ListedStrategy {
                    stages,
                    log: Arc::clone(&log),
                }))
            }),
        );
    }

    let builder = QueryBuilder::from_options(
        json!({
            "adapter": "memory",
            "adapter_options": {"tables": {"people": [{"id": 1, "first_name": "Ada"}]}},
            "strategy": "listed",
            "strategy_options": {"stages": ["collect"]},
            "base_query": "people",
        }),
        &registry,
    )
    .unwrap();

    let result = builder.execute(json!({})).await.unwrap().into_value();
    assert_eq!(field(&result, "first_name"), vec!["Ada"]);
    assert_eq!(*log.lock(), vec!["strategy:collect"]);
}

#[tokio::test]
async fn test_unknown_strategy_is_a_configuration_error() {
    let err = QueryBuilder::from_options(
        json!({"adapter": "memory", "strategy": "missing"}),
        &ComponentRegistry::with_defaults(),
    )
    .unwrap_err();
    assert!(err.is_configuration());
    assert_eq!(err.message(), "Unknown strategy \"missing\"");
}
