//! # Eager Loading Plugin
//!
//! Hydrates related records onto the result after `end`. Predicates of
//! conditional loads are evaluated concurrently; the loads themselves run in
//! declaration order so each one receives the result hydrated by the previous.

use crate::constants::{stages, state_keys};
use crate::error::Result;
use crate::pipeline::builder::QueryBuilder;
use crate::pipeline::context::Context;
use crate::pipeline::middleware::Middleware;
use crate::plugins::Plugin;
use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

type LoadPredicate = dyn for<'a> Fn(&'a Context) -> BoxFuture<'a, Result<bool>> + Send + Sync;

struct EagerLoad {
    predicate: Option<Box<LoadPredicate>>,
    relations: Vec<String>,
    options: Value,
}

impl EagerLoad {
    async fn enabled(&self, context: &Context) -> Result<bool> {
        match &self.predicate {
            Some(predicate) => predicate(context).await,
            None => Ok(true),
        }
    }
}

#[derive(Default)]
pub struct EagerLoadingPlugin {
    loads: Vec<EagerLoad>,
}

fn relation_names<I, S>(relations: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    relations.into_iter().map(Into::into).collect()
}

impl EagerLoadingPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always load `relations` (dotted paths such as `"books.theme"` nest)
    pub fn load<I, S>(mut self, relations: I, options: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loads.push(EagerLoad {
            predicate: None,
            relations: relation_names(relations),
            options,
        });
        self
    }

    /// Load `relations` when the asynchronous predicate holds for the execution
    pub fn load_when<F, I, S>(mut self, predicate: F, relations: I, options: Value) -> Self
    where
        F: for<'a> Fn(&'a Context) -> BoxFuture<'a, Result<bool>> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loads.push(EagerLoad {
            predicate: Some(Box::new(predicate)),
            relations: relation_names(relations),
            options,
        });
        self
    }

    /// Same as [`EagerLoadingPlugin::load_when`] with a synchronous predicate
    pub fn load_when_sync<F, I, S>(self, predicate: F, relations: I, options: Value) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load_when(
            move |context| {
                let enabled = predicate(context);
                Box::pin(async move { Ok(enabled) })
            },
            relations,
            options,
        )
    }

    async fn apply(&self, context: &Context) -> Result<()> {
        let enabled = try_join_all(self.loads.iter().map(|load| load.enabled(context))).await?;

        for (load, _) in self.loads.iter().zip(enabled).filter(|(_, enabled)| *enabled) {
            debug!(
                execution_id = %context.execution_id(),
                relations = ?load.relations,
                "Eager loading relations"
            );
            let result = context.get(state_keys::RESULT).unwrap_or(Value::Null);
            let result = context
                .adapter()
                .eager_load(result, &load.relations, &load.options, context)
                .await?;
            context.set(state_keys::RESULT, result);
        }
        Ok(())
    }
}

struct EagerLoadingMiddleware(Arc<EagerLoadingPlugin>);

#[async_trait]
impl Middleware for EagerLoadingMiddleware {
    async fn execute(&self, context: &Context) -> Result<()> {
        self.0.apply(context).await
    }

    fn name(&self) -> &str {
        "eager_loading"
    }
}

impl Plugin for EagerLoadingPlugin {
    fn name(&self) -> &str {
        "eager_loading"
    }

    fn register(self: Arc<Self>, builder: &mut QueryBuilder) -> Result<()> {
        builder.after(stages::END, [Arc::new(EagerLoadingMiddleware(self)) as Arc<dyn Middleware>])?;
        Ok(())
    }
}
