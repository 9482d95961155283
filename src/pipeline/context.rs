//! # Execution Context
//!
//! Mutable per-execution state: the cloned config, merged options, the
//! dotted-path state store and the stage list. One context is created per
//! execution and discarded when it completes.
//!
//! Middlewares running concurrently in the same sub-phase share the context
//! by reference. Each accessor takes a short lock and never holds it across an
//! await point; concurrent writers to the same key race and the last write wins.

use crate::adapter::Adapter;
use crate::constants::{stages, state_keys};
use crate::error::{QueryError, Result};
use crate::logging::log_adapter_call;
use crate::pipeline::config::QueryConfig;
use crate::pipeline::state::{lookup, merge_objects, StateTree};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

static NEXT_PRIVATE_KEY: AtomicU64 = AtomicU64::new(1);

/// Key to a slot of owner-private context state
///
/// Only code holding the key can read or write its slot, so plugins keep
/// per-execution data on the context without exposing it to other middlewares.
pub struct PrivateKey<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PrivateKey<T> {
    pub fn new() -> Self {
        Self {
            id: NEXT_PRIVATE_KEY.fetch_add(1, Ordering::Relaxed),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for PrivateKey<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for PrivateKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey").field(&self.id).finish()
    }
}

/// Receives `require_join` calls for one execution
pub trait JoinRequirer: Send + Sync {
    fn require(&self, context: &Context, names: &[String]) -> Result<()>;
}

/// Adapter calls issued through the context
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    queries: AtomicU64,
    counts: AtomicU64,
    joins_applied: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries: u64,
    pub counts: u64,
    pub joins_applied: u64,
}

impl ExecutionMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries: self.queries.load(Ordering::Relaxed),
            counts: self.counts.load(Ordering::Relaxed),
            joins_applied: self.joins_applied.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_join(&self) {
        self.joins_applied.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy)]
enum AdapterCall {
    Query,
    Count,
}

impl AdapterCall {
    fn operation(&self) -> &'static str {
        match self {
            Self::Query => "executeQuery",
            Self::Count => "executeCountQuery",
        }
    }
}

pub struct Context {
    execution_id: Uuid,
    started_at: DateTime<Utc>,
    config: QueryConfig,
    options: Map<String, Value>,
    state: Mutex<StateTree>,
    stages: Mutex<Vec<String>>,
    current_stage: Mutex<String>,
    private: Mutex<HashMap<u64, Box<dyn Any + Send + Sync>>>,
    join_requirer: Mutex<Option<Arc<dyn JoinRequirer>>>,
    metrics: ExecutionMetrics,
}

impl Context {
    /// Options are copied from the config so executions never share them
    pub fn new(config: QueryConfig) -> Self {
        let options = config.options().clone();
        Self {
            execution_id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
            options,
            state: Mutex::new(StateTree::new()),
            stages: Mutex::new(vec![stages::START.to_string(), stages::END.to_string()]),
            current_stage: Mutex::new(stages::START.to_string()),
            private: Mutex::new(HashMap::new()),
            join_requirer: Mutex::new(None),
            metrics: ExecutionMetrics::default(),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        self.config.adapter()
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    /// Read an option by dotted path, e.g. `"req.query.limit"`
    pub fn option(&self, path: &str) -> Option<Value> {
        let (head, rest) = path.split_once('.').unwrap_or((path, ""));
        self.options
            .get(head)
            .and_then(|value| lookup(value, rest))
            .cloned()
    }

    pub(crate) fn merge_options(&mut self, options: &Value) {
        merge_objects(&mut self.options, options);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.state.lock().get(path).cloned()
    }

    pub fn set(&self, path: &str, value: Value) {
        self.state.lock().set(path, value);
    }

    pub fn remove(&self, path: &str) -> Option<Value> {
        self.state.lock().remove(path)
    }

    /// Snapshot of the whole state tree
    pub fn state(&self) -> Value {
        self.state.lock().as_value().clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub(crate) fn execution_metrics(&self) -> &ExecutionMetrics {
        &self.metrics
    }

    // Stage list

    pub fn stages(&self) -> Vec<String> {
        self.stages.lock().clone()
    }

    /// Stage being emitted, `start` until the lifecycle begins
    pub fn current_stage(&self) -> String {
        self.current_stage.lock().clone()
    }

    pub(crate) fn enter_stage(&self, stage: &str) {
        *self.current_stage.lock() = stage.to_string();
    }

    /// Error for a middleware that refuses to let the execution continue
    ///
    /// ```rust,ignore
    /// named_sync_fn("guard", |context| match context.option("tenant") {
    ///     Some(_) => Ok(()),
    ///     None => Err(context.reject("tenant option is required")),
    /// })
    /// ```
    pub fn reject(&self, message: impl Into<String>) -> QueryError {
        QueryError::middleware(self.current_stage(), message)
    }

    /// Insert stages right before `end`
    pub fn add_stages<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stages = self.stages.lock();
        let insert_at = match stages.last() {
            Some(last) if last == stages::END => stages.len() - 1,
            _ => stages.len(),
        };
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        stages.splice(insert_at..insert_at, names);
    }

    pub fn set_stages<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.stages.lock() = names.into_iter().map(Into::into).collect();
    }

    /// Replace the stage list from dynamically typed data
    pub fn set_stages_value(&self, value: &Value) -> Result<()> {
        let Value::Array(items) = value else {
            return Err(QueryError::stage_validation(format!(
                "Stages must be an array, got {}",
                json_type_name(value)
            )));
        };

        if items.iter().any(|item| !item.is_string()) {
            let types: Vec<&str> = items.iter().map(json_type_name).collect();
            return Err(QueryError::stage_validation(format!(
                "Stages must be an array of strings, got [{}]",
                types.join(",")
            )));
        }

        self.set_stages(items.iter().filter_map(Value::as_str));
        Ok(())
    }

    // Owner-private slots

    pub fn set_private<T: Send + Sync + 'static>(&self, key: &PrivateKey<T>, value: T) {
        self.private.lock().insert(key.id, Box::new(value));
    }

    pub fn get_private<T: Clone + Send + Sync + 'static>(&self, key: &PrivateKey<T>) -> Option<T> {
        self.private
            .lock()
            .get(&key.id)
            .and_then(|slot| slot.downcast_ref::<T>())
            .cloned()
    }

    /// Mutate a private slot in place; `None` when the slot was never set
    pub fn update_private<T, R>(&self, key: &PrivateKey<T>, update: impl FnOnce(&mut T) -> R) -> Option<R>
    where
        T: Send + Sync + 'static,
    {
        self.private
            .lock()
            .get_mut(&key.id)
            .and_then(|slot| slot.downcast_mut::<T>())
            .map(update)
    }

    // Joins

    pub fn install_join_requirer(&self, requirer: Arc<dyn JoinRequirer>) {
        let mut slot = self.join_requirer.lock();
        if slot.is_some() {
            tracing::debug!(execution_id = %self.execution_id, "Replacing installed join resolver");
        }
        *slot = Some(requirer);
    }

    /// Request named joins to be present before the main query executes
    pub fn require_join<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requirer = self.join_requirer.lock().clone().ok_or_else(|| {
            QueryError::configuration("No joining plugin is installed on this query")
        })?;
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        requirer.require(self, &names)
    }

    // Adapter helpers

    /// The `query` state value, which must exist once the adapter created it
    pub fn current_query(&self) -> Result<Value> {
        self.get(state_keys::QUERY).ok_or_else(|| {
            QueryError::adapter_contract("No query is available in the context state")
        })
    }

    /// Execute the current query (or `query`) through the adapter
    pub async fn query(&self, query: Option<Value>) -> Result<Value> {
        self.dispatch(AdapterCall::Query, query).await
    }

    /// Count the rows matched by the current query (or `query`)
    pub async fn count(&self, query: Option<Value>) -> Result<u64> {
        let value = self.dispatch(AdapterCall::Count, query).await?;
        value.as_u64().ok_or_else(|| {
            QueryError::adapter_contract(format!("Adapter returned a non-integer count: {value}"))
        })
    }

    /// Every adapter call issued on behalf of a middleware passes through here
    async fn dispatch(&self, call: AdapterCall, query: Option<Value>) -> Result<Value> {
        let query = match query {
            Some(query) => query,
            None => self.current_query()?,
        };

        let adapter = self.adapter();
        log_adapter_call(
            &self.execution_id.to_string(),
            adapter.name(),
            call.operation(),
            None,
        );

        match call {
            AdapterCall::Query => {
                self.metrics.queries.fetch_add(1, Ordering::Relaxed);
                adapter.execute_query(&query, self).await
            }
            AdapterCall::Count => {
                self.metrics.counts.fetch_add(1, Ordering::Relaxed);
                adapter.execute_count_query(&query, self).await.map(Value::from)
            }
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("execution_id", &self.execution_id)
            .field("options", &self.options)
            .field("state", &self.state.lock().as_value())
            .field("stages", &*self.stages.lock())
            .finish()
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
