//! # Middleware Units and Groups
//!
//! A middleware is any value that can be invoked with a [`Context`]. Plain
//! functions are adapted into the [`Middleware`] trait at registration time
//! with [`from_fn`] or [`from_sync_fn`]; plugins implement the trait directly.

use crate::error::{QueryError, Result};
use crate::pipeline::context::Context;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// A unit of behavior bound to a `(position, stage)` pair
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn execute(&self, context: &Context) -> Result<()>;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Position of a middleware group relative to its stage body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    Before,
    After,
}

impl Position {
    /// Parse a position name; `"on"` is an alias for `"after"`
    pub fn parse(position: &str) -> Result<Self> {
        match position {
            "before" => Ok(Self::Before),
            "after" | "on" => Ok(Self::After),
            other => Err(QueryError::configuration(format!(
                "Middleware group position must be \"before\" or \"after\"; got \"{other}\""
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable association of a position, a stage and a non-empty list of middlewares
#[derive(Clone)]
pub struct MiddlewareGroup {
    position: Position,
    stage: String,
    middlewares: Arc<[Arc<dyn Middleware>]>,
}

impl MiddlewareGroup {
    pub fn new(
        position: Position,
        stage: impl Into<String>,
        middlewares: impl IntoIterator<Item = Arc<dyn Middleware>>,
    ) -> Result<Self> {
        let stage = stage.into();
        if stage.trim().is_empty() {
            return Err(QueryError::configuration(
                "Middleware group stage must not be blank",
            ));
        }

        let middlewares: Arc<[Arc<dyn Middleware>]> = middlewares.into_iter().collect();
        if middlewares.is_empty() {
            return Err(QueryError::configuration(
                "Middleware group middlewares must contain at least one middleware",
            ));
        }

        Ok(Self {
            position,
            stage,
            middlewares,
        })
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn middlewares(&self) -> &[Arc<dyn Middleware>] {
        &self.middlewares
    }

    pub fn matches(&self, position: Position, stage: &str) -> bool {
        self.position == position && self.stage == stage
    }
}

impl fmt::Debug for MiddlewareGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareGroup")
            .field("position", &self.position)
            .field("stage", &self.stage)
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

type AsyncMiddlewareFn = dyn for<'a> Fn(&'a Context) -> BoxFuture<'a, Result<()>> + Send + Sync;

struct FnMiddleware {
    name: String,
    func: Box<AsyncMiddlewareFn>,
}

#[async_trait]
impl Middleware for FnMiddleware {
    async fn execute(&self, context: &Context) -> Result<()> {
        (self.func)(context).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct SyncFnMiddleware<F> {
    name: String,
    func: F,
}

#[async_trait]
impl<F> Middleware for SyncFnMiddleware<F>
where
    F: Fn(&Context) -> Result<()> + Send + Sync,
{
    async fn execute(&self, context: &Context) -> Result<()> {
        (self.func)(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapt an asynchronous function into a middleware
///
/// ```rust,ignore
/// let mw = from_fn(|context| Box::pin(async move {
///     let total = context.count(None).await?;
///     context.set("stats.total", total.into());
///     Ok(())
/// }));
/// ```
pub fn from_fn<F>(func: F) -> Arc<dyn Middleware>
where
    F: for<'a> Fn(&'a Context) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(FnMiddleware {
        name: "fn".to_string(),
        func: Box::new(func),
    })
}

/// Adapt a synchronous function into a middleware
pub fn from_sync_fn<F>(func: F) -> Arc<dyn Middleware>
where
    F: Fn(&Context) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(SyncFnMiddleware {
        name: "sync_fn".to_string(),
        func,
    })
}

/// Same as [`from_sync_fn`] with a name for logs
pub fn named_sync_fn<F>(name: impl Into<String>, func: F) -> Arc<dyn Middleware>
where
    F: Fn(&Context) -> Result<()> + Send + Sync + 'static,
{
    Arc::new(SyncFnMiddleware {
        name: name.into(),
        func,
    })
}
