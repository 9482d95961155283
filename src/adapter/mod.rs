//! # Adapter Contract
//!
//! The adapter is the external component that knows how to build, execute,
//! count, sort and paginate a concrete query and how to read relationship
//! metadata from a model. The pipeline only decides *when* these operations
//! run; the adapter decides *what* they mean.
//!
//! Queries and results are `serde_json::Value`s whose shape the adapter owns.
//! [`memory::MemoryAdapter`] is a complete in-memory implementation used by
//! tests and as a reference for real adapters.

pub mod memory;
pub mod registry;

use crate::error::Result;
use crate::pipeline::config::QueryConfig;
use crate::pipeline::context::Context;
use crate::query::{JoinDefinition, SortDirection};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use registry::{AdapterFactory, ComponentRegistry, StrategyFactory};

#[async_trait]
pub trait Adapter: Send + Sync {
    /// Adapter identifier for logs
    fn name(&self) -> &str;

    /// Build the initial query; `None` is a contract violation
    async fn create_query(&self, context: &Context) -> Result<Option<Value>>;

    async fn execute_query(&self, query: &Value, context: &Context) -> Result<Value>;

    async fn execute_count_query(&self, query: &Value, context: &Context) -> Result<u64>;

    /// Apply one join; `None` signals the join could not be applied
    async fn apply_join_definition(
        &self,
        query: Value,
        join: &JoinDefinition,
        context: &Context,
    ) -> Result<Option<Value>>;

    async fn order_query_by(
        &self,
        query: Value,
        column: &str,
        direction: SortDirection,
        context: &Context,
    ) -> Result<Value>;

    async fn paginate_query(
        &self,
        query: Value,
        offset: u64,
        limit: u64,
        context: &Context,
    ) -> Result<Value>;

    /// Opaque fingerprint of the query's current shape
    fn query_identifier(&self, query: &Value, context: &Context) -> Result<String>;

    fn table_name(&self, model: &str, context: &Context) -> Result<String>;

    /// Translate a model relationship into normalized join tuples
    fn join_definitions(
        &self,
        model: &str,
        relation: &str,
        options: &RelationOptions,
        config: &QueryConfig,
    ) -> Result<Vec<JoinSpec>>;

    async fn eager_load(
        &self,
        result: Value,
        relations: &[String],
        options: &Value,
        context: &Context,
    ) -> Result<Value>;
}

/// Source side of a join catalogue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSource {
    /// A plain table name
    Table(String),
    /// A model whose table name and relations the adapter resolves
    Model(String),
}

impl JoinSource {
    pub fn table(name: impl Into<String>) -> Self {
        Self::Table(name.into())
    }

    pub fn model(name: impl Into<String>) -> Self {
        Self::Model(name.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Table(name) | Self::Model(name) => name.trim().is_empty(),
        }
    }

    pub fn resolve_table_name(&self, context: &Context) -> Result<String> {
        match self {
            Self::Table(name) => Ok(name.clone()),
            Self::Model(model) => context.adapter().table_name(model, context),
        }
    }
}

/// Overrides for joins derived from a model relationship
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationOptions {
    pub join_name: Option<String>,
    pub join_type: Option<String>,
    pub foreign_key: Option<String>,
    pub foreign_key_target: Option<String>,
    pub other_key: Option<String>,
    pub other_key_target: Option<String>,
    pub join_table_name: Option<String>,
}

/// Normalized join tuple produced by [`Adapter::join_definitions`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub name: String,
    pub column: String,
    pub join_column: String,
    pub join_table: String,
    #[serde(default)]
    pub join_type: Option<String>,
    #[serde(default)]
    pub required_join: Option<String>,
}
