//! # Query Builder
//!
//! Fluent declaration surface. Registering middlewares and plugins only
//! changes the builder's own [`QueryConfig`]; every `execute` call runs on a
//! clone of it, so executions never observe each other.
//!
//! ```rust,ignore
//! let mut builder = QueryBuilder::with_adapter(Arc::new(adapter));
//! builder
//!     .use_plugin(PaginationPlugin::new())?
//!     .before("end", [from_sync_fn(|context| { /* ... */ Ok(()) })])?;
//!
//! let people = builder.execute(json!({"offset": 10, "limit": 5})).await?;
//! ```

use crate::adapter::{Adapter, ComponentRegistry};
use crate::error::Result;
use crate::pipeline::config::QueryConfig;
use crate::pipeline::executor::{ExecutionOutput, Executor};
use crate::pipeline::middleware::{Middleware, MiddlewareGroup, Position};
use crate::plugins::Plugin;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    config: QueryConfig,
}

impl QueryBuilder {
    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn with_adapter(adapter: Arc<dyn Adapter>) -> Self {
        Self::new(QueryConfig::new(adapter))
    }

    pub fn from_options(options: Value, registry: &ComponentRegistry) -> Result<Self> {
        QueryConfig::from_options(options, registry).map(Self::new)
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Default option for every execution of this builder
    pub fn set_option(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.config.set_option(key, value);
        self
    }

    pub fn before<I>(&mut self, stage: &str, middlewares: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.add_group(Position::Before, stage, middlewares)
    }

    pub fn after<I>(&mut self, stage: &str, middlewares: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.add_group(Position::After, stage, middlewares)
    }

    /// Alias for [`QueryBuilder::after`]
    pub fn on<I>(&mut self, stage: &str, middlewares: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.add_group(Position::After, stage, middlewares)
    }

    pub fn add_group<I>(&mut self, position: Position, stage: &str, middlewares: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        let group = MiddlewareGroup::new(position, stage, middlewares)?;
        debug!(position = %position, stage = %stage, middlewares = group.middlewares().len(), "Registered middleware group");
        self.config.add_middleware_group(group);
        Ok(self)
    }

    pub fn use_plugin<P: Plugin + 'static>(&mut self, plugin: P) -> Result<&mut Self> {
        self.use_shared_plugin(Arc::new(plugin))
    }

    /// Register a plugin the caller keeps a handle to
    pub fn use_shared_plugin(&mut self, plugin: Arc<dyn Plugin>) -> Result<&mut Self> {
        debug!(plugin = %plugin.name(), "Registering plugin");
        plugin.register(self)?;
        Ok(self)
    }

    /// Independent copy: further declarations on either side do not leak
    pub fn clone_builder(&self) -> Self {
        self.clone()
    }

    pub async fn execute(&self, options: Value) -> Result<ExecutionOutput> {
        Executor::new(self.config.clone()).execute(options).await
    }
}
