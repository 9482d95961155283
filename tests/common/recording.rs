use async_trait::async_trait;
use ormquery_core::adapter::memory::MemoryAdapter;
use ormquery_core::adapter::{Adapter, JoinSpec, RelationOptions};
use ormquery_core::{Context, JoinDefinition, QueryConfig, Result, SortDirection};
use parking_lot::Mutex;
use serde_json::Value;

/// Memory adapter that records every contract call
///
/// It can also be told to break the contract, returning nothing from
/// `create_query` or from `apply_join_definition`.
#[derive(Default)]
pub struct RecordingAdapter {
    inner: MemoryAdapter,
    calls: Mutex<Vec<String>>,
    pub no_query: bool,
    pub refuse_joins: bool,
}

impl RecordingAdapter {
    pub fn new(inner: MemoryAdapter) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// `create_query` returns nothing
    pub fn without_query(mut self) -> Self {
        self.no_query = true;
        self
    }

    /// `apply_join_definition` returns nothing
    pub fn refusing_joins(mut self) -> Self {
        self.refuse_joins = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Recorded calls of one operation, e.g. `"apply_join_definition"`
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.split(':').next() == Some(operation))
            .cloned()
            .collect()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn create_query(&self, context: &Context) -> Result<Option<Value>> {
        self.record("create_query");
        if self.no_query {
            return Ok(None);
        }
        self.inner.create_query(context).await
    }

    async fn execute_query(&self, query: &Value, context: &Context) -> Result<Value> {
        self.record("execute_query");
        self.inner.execute_query(query, context).await
    }

    async fn execute_count_query(&self, query: &Value, context: &Context) -> Result<u64> {
        self.record("execute_count_query");
        self.inner.execute_count_query(query, context).await
    }

    async fn apply_join_definition(
        &self,
        query: Value,
        join: &JoinDefinition,
        context: &Context,
    ) -> Result<Option<Value>> {
        self.record(format!("apply_join_definition:{}", join.name));
        if self.refuse_joins {
            return Ok(None);
        }
        self.inner.apply_join_definition(query, join, context).await
    }

    async fn order_query_by(
        &self,
        query: Value,
        column: &str,
        direction: SortDirection,
        context: &Context,
    ) -> Result<Value> {
        self.record(format!("order_query_by:{column}:{direction}"));
        self.inner.order_query_by(query, column, direction, context).await
    }

    async fn paginate_query(
        &self,
        query: Value,
        offset: u64,
        limit: u64,
        context: &Context,
    ) -> Result<Value> {
        self.record(format!("paginate_query:{offset}:{limit}"));
        self.inner.paginate_query(query, offset, limit, context).await
    }

    fn query_identifier(&self, query: &Value, context: &Context) -> Result<String> {
        self.inner.query_identifier(query, context)
    }

    fn table_name(&self, model: &str, context: &Context) -> Result<String> {
        self.inner.table_name(model, context)
    }

    fn join_definitions(
        &self,
        model: &str,
        relation: &str,
        options: &RelationOptions,
        config: &QueryConfig,
    ) -> Result<Vec<JoinSpec>> {
        self.inner.join_definitions(model, relation, options, config)
    }

    async fn eager_load(
        &self,
        result: Value,
        relations: &[String],
        options: &Value,
        context: &Context,
    ) -> Result<Value> {
        self.record(format!("eager_load:{}", relations.join(",")));
        self.inner.eager_load(result, relations, options, context).await
    }
}
