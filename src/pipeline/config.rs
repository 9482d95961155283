//! # Query Configuration
//!
//! The declared half of a query: adapter, optional strategy, default options
//! and the accumulated middleware groups. A config is cloned for every
//! execution; the clone shares the adapter and strategy but owns its options
//! and group list.

use crate::adapter::{Adapter, ComponentRegistry};
use crate::constants::option_keys;
use crate::error::{QueryError, Result};
use crate::pipeline::middleware::{MiddlewareGroup, Position};
use crate::pipeline::strategy::Strategy;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct QueryConfig {
    adapter: Arc<dyn Adapter>,
    strategy: Option<Arc<dyn Strategy>>,
    options: Map<String, Value>,
    middleware_groups: Vec<MiddlewareGroup>,
}

impl QueryConfig {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            adapter,
            strategy: None,
            options: Map::new(),
            middleware_groups: Vec::new(),
        }
    }

    /// Build from plain options, resolving `adapter` and `strategy` by name
    ///
    /// `adapter_options` and `strategy_options` are handed to the factories;
    /// every other key becomes a default execution option.
    pub fn from_options(options: Value, registry: &ComponentRegistry) -> Result<Self> {
        let Value::Object(mut options) = options else {
            return Err(QueryError::configuration("Query options must be an object"));
        };

        let adapter_options = options
            .remove(option_keys::ADAPTER_OPTIONS)
            .unwrap_or(Value::Null);
        let adapter = match options.remove(option_keys::ADAPTER) {
            Some(Value::String(name)) => registry.resolve_adapter(&name, &adapter_options)?,
            Some(other) => {
                return Err(QueryError::configuration(format!(
                    "Adapter must be given by name, got {other}"
                )))
            }
            None => return Err(QueryError::configuration("An adapter is required")),
        };

        let strategy_options = options
            .remove(option_keys::STRATEGY_OPTIONS)
            .unwrap_or(Value::Null);
        let strategy = match options.remove(option_keys::STRATEGY) {
            Some(Value::String(name)) => Some(registry.resolve_strategy(&name, &strategy_options)?),
            Some(Value::Null) | None => None,
            Some(other) => {
                return Err(QueryError::configuration(format!(
                    "Strategy must be given by name, got {other}"
                )))
            }
        };

        Ok(Self {
            adapter,
            strategy,
            options,
            middleware_groups: Vec::new(),
        })
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn Strategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn set_option(&mut self, key: impl Into<String>, value: Value) {
        self.options.insert(key.into(), value);
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn strategy(&self) -> Option<&Arc<dyn Strategy>> {
        self.strategy.as_ref()
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn middleware_groups(&self) -> &[MiddlewareGroup] {
        &self.middleware_groups
    }

    pub fn add_middleware_group(&mut self, group: MiddlewareGroup) {
        self.middleware_groups.push(group);
    }

    /// Groups registered for `(position, stage)`, in declaration order
    pub fn groups_for<'a>(
        &'a self,
        position: Position,
        stage: &'a str,
    ) -> impl Iterator<Item = &'a MiddlewareGroup> + 'a {
        self.middleware_groups
            .iter()
            .filter(move |group| group.matches(position, stage))
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("adapter", &self.adapter.name())
            .field("strategy", &self.strategy.as_ref().map(|s| s.name().to_string()))
            .field("options", &self.options)
            .field("middleware_groups", &self.middleware_groups)
            .finish()
    }
}
