//! # Staged Executor
//!
//! Runs one execution of a [`QueryConfig`]:
//!
//! 1. merge the execution options over the config options
//! 2. collect and validate the strategy's stages
//! 3. build the initial query through the adapter
//! 4. emit `start`, every scheduled stage, the reserved `query` stage and `end`
//!
//! Emitting a stage runs its `before` groups, its body, then its `after` groups.
//! Groups run one after the other in declaration order; the middlewares of one
//! group run concurrently and all of them finish before the next group starts.
//! The stage list is re-validated before every emission since middlewares may
//! schedule new stages while the execution is in flight.

use crate::constants::{option_keys, stages, state_keys};
use crate::error::{QueryError, Result};
use crate::logging::log_stage_event;
use crate::pipeline::config::QueryConfig;
use crate::pipeline::context::Context;
use crate::pipeline::middleware::Position;
use crate::pipeline::stages::{validate_declared, validate_schedule};
use crate::pipeline::strategy::Strategy;
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What an execution returns
#[derive(Debug)]
pub enum ExecutionOutput {
    /// The `result` state value
    Result(Value),
    /// The whole context, requested with the `result: "context"` option
    Context(Box<Context>),
}

impl ExecutionOutput {
    pub fn is_context(&self) -> bool {
        matches!(self, Self::Context(_))
    }

    /// The execution result, read from the context when one was returned
    pub fn into_value(self) -> Value {
        match self {
            Self::Result(value) => value,
            Self::Context(context) => context.get(state_keys::RESULT).unwrap_or(Value::Null),
        }
    }

    pub fn into_context(self) -> Option<Context> {
        match self {
            Self::Context(context) => Some(*context),
            Self::Result(_) => None,
        }
    }
}

/// Body run between the `before` and `after` groups of a stage
enum StageBody<'a> {
    Empty,
    Strategy(&'a Arc<dyn Strategy>),
    ExecuteQuery,
}

pub struct Executor {
    context: Context,
}

impl Executor {
    pub fn new(config: QueryConfig) -> Self {
        Self {
            context: Context::new(config),
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    #[instrument(skip_all, fields(execution_id = %self.context.execution_id()))]
    pub async fn execute(mut self, options: Value) -> Result<ExecutionOutput> {
        self.context.merge_options(&options);
        let context = self.context;

        info!(adapter = %context.adapter().name(), "Starting query execution");
        if let Err(err) = run_lifecycle(&context).await {
            warn!(error = %err, stages = ?context.stages(), "Query execution failed");
            return Err(err);
        }

        let duration_ms = (Utc::now() - context.started_at()).num_milliseconds();
        let metrics = context.metrics();
        info!(
            duration_ms = duration_ms,
            queries = metrics.queries,
            counts = metrics.counts,
            joins_applied = metrics.joins_applied,
            "Query execution completed"
        );

        let wants_context = context
            .option(option_keys::RESULT)
            .is_some_and(|value| value == option_keys::RESULT_CONTEXT);
        if wants_context {
            Ok(ExecutionOutput::Context(Box::new(context)))
        } else {
            Ok(ExecutionOutput::Result(
                context.get(state_keys::RESULT).unwrap_or(Value::Null),
            ))
        }
    }
}

async fn run_lifecycle(context: &Context) -> Result<()> {
    let strategy = context.config().strategy().cloned();
    let declared = match &strategy {
        Some(strategy) => {
            let declared = strategy.stages(context);
            validate_declared(&declared)?;
            declared
        }
        None => Vec::new(),
    };

    let query = context.adapter().create_query(context).await?.ok_or_else(|| {
        QueryError::adapter_contract("Adapter's \"createQuery\" function must return a query")
    })?;
    context.set(state_keys::QUERY, query);
    context.add_stages(declared.iter().cloned());

    let strategy_stages: HashSet<String> = declared.into_iter().collect();
    let mut emitted: Vec<String> = Vec::new();

    loop {
        let schedule = context.stages();
        validate_schedule(&schedule, &emitted)?;

        let Some(stage) = schedule.get(emitted.len()).cloned() else {
            break;
        };

        if stage == stages::END {
            emit(context, stages::QUERY, StageBody::Empty).await?;
            emit(context, stages::END, StageBody::ExecuteQuery).await?;
            emitted.push(stage);

            let schedule = context.stages();
            if schedule != emitted {
                return Err(QueryError::stage_validation(format!(
                    "Stages must not be scheduled after \"{}\" has run",
                    stages::END
                )));
            }
            break;
        }

        let body = match &strategy {
            Some(strategy) if strategy_stages.contains(&stage) => StageBody::Strategy(strategy),
            _ => StageBody::Empty,
        };
        emit(context, &stage, body).await?;
        emitted.push(stage);
    }
    Ok(())
}

#[instrument(skip(context, body), fields(execution_id = %context.execution_id()))]
async fn emit(context: &Context, stage: &str, body: StageBody<'_>) -> Result<()> {
    context.enter_stage(stage);
    run_groups(context, Position::Before, stage).await?;

    match body {
        StageBody::Empty => {}
        StageBody::Strategy(strategy) => {
            debug!(strategy = %strategy.name(), "Running strategy stage body");
            strategy.on(stage, context).await?;
        }
        StageBody::ExecuteQuery => {
            let result = context.query(None).await?;
            context.set(state_keys::RESULT, result);
        }
    }

    run_groups(context, Position::After, stage).await
}

async fn run_groups(context: &Context, position: Position, stage: &str) -> Result<()> {
    let groups: Vec<_> = context.config().groups_for(position, stage).collect();
    if groups.is_empty() {
        return Ok(());
    }

    log_stage_event(
        &context.execution_id().to_string(),
        stage,
        position.as_str(),
        groups.len(),
    );

    for group in groups {
        try_join_all(
            group
                .middlewares()
                .iter()
                .map(|middleware| middleware.execute(context)),
        )
        .await?;
    }
    Ok(())
}
