//! # Component Registry
//!
//! Named factories for adapters and strategies, so a [`QueryConfig`] can be
//! declared from plain options (`{"adapter": "memory"}`) instead of concrete
//! instances.
//!
//! ```rust
//! use ormquery_core::adapter::ComponentRegistry;
//! use serde_json::json;
//!
//! let registry = ComponentRegistry::with_defaults();
//! let adapter = registry.resolve_adapter("memory", &json!({})).unwrap();
//! assert_eq!(adapter.name(), "memory");
//! ```
//!
//! [`QueryConfig`]: crate::pipeline::config::QueryConfig

use crate::adapter::memory::MemoryAdapter;
use crate::adapter::Adapter;
use crate::error::{QueryError, Result};
use crate::pipeline::strategy::Strategy;
use crate::plugins::pagination::PaginatedStrategy;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

pub type AdapterFactory = Arc<dyn Fn(&Value) -> Result<Arc<dyn Adapter>> + Send + Sync>;
pub type StrategyFactory = Arc<dyn Fn(&Value) -> Result<Arc<dyn Strategy>> + Send + Sync>;

/// Thread-safe registry of adapter and strategy factories
#[derive(Default)]
pub struct ComponentRegistry {
    adapters: DashMap<String, AdapterFactory>,
    strategies: DashMap<String, StrategyFactory>,
}

impl ComponentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the bundled `memory` adapter and `paginated` strategy
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register_adapter(
            "memory",
            Arc::new(|options: &Value| -> Result<Arc<dyn Adapter>> {
                Ok(Arc::new(MemoryAdapter::from_options(options)?))
            }),
        );
        registry.register_strategy(
            PaginatedStrategy::NAME,
            Arc::new(|options: &Value| -> Result<Arc<dyn Strategy>> {
                Ok(Arc::new(PaginatedStrategy::from_options(options)?))
            }),
        );
        registry
    }

    pub fn register_adapter(&self, name: impl Into<String>, factory: AdapterFactory) {
        let name = name.into();
        if self.adapters.insert(name.clone(), factory).is_some() {
            debug!(adapter = %name, "Replaced adapter factory");
        } else {
            info!(adapter = %name, "Registered adapter factory");
        }
    }

    pub fn register_strategy(&self, name: impl Into<String>, factory: StrategyFactory) {
        let name = name.into();
        if self.strategies.insert(name.clone(), factory).is_some() {
            debug!(strategy = %name, "Replaced strategy factory");
        } else {
            info!(strategy = %name, "Registered strategy factory");
        }
    }

    pub fn resolve_adapter(&self, name: &str, options: &Value) -> Result<Arc<dyn Adapter>> {
        let factory = self
            .adapters
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| QueryError::configuration(format!("Unknown adapter \"{name}\"")))?;
        factory(options)
    }

    pub fn resolve_strategy(&self, name: &str, options: &Value) -> Result<Arc<dyn Strategy>> {
        let factory = self
            .strategies
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| QueryError::configuration(format!("Unknown strategy \"{name}\"")))?;
        factory(options)
    }

    pub fn adapter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn strategy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
