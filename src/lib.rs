#![allow(clippy::doc_markdown)] // Allow technical terms like camelCase option names in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # OrmQuery Core Rust
//!
//! Staged query-construction pipeline: independent concerns (sorting,
//! pagination, eager loading, table joins) contribute behavior to the
//! lifecycle of building and executing a single logical query without knowing
//! about each other.
//!
//! ## Architecture
//!
//! A [`QueryBuilder`] accumulates middleware groups bound to named stages.
//! Each `execute` call clones the builder's [`QueryConfig`] into a fresh
//! [`Executor`], which runs `start`, every stage scheduled by the strategy or
//! by plugins, the reserved `query` stage and finally `end`, whose body runs
//! the query through the [`Adapter`].
//!
//! The adapter is the only component that knows what a query is. This crate
//! ships [`MemoryAdapter`], an in-memory implementation used by the tests.
//!
//! ## Module Organization
//!
//! - [`pipeline`] - Builder, config, executor, context and middleware groups
//! - [`plugins`] - Joining, pagination, sorting and eager-loading plugins
//! - [`adapter`] - Adapter contract, component registry and the memory adapter
//! - [`query`] - Join definitions, pagination windows and sort criteria
//! - [`settings`] - Configuration loaded from files and the environment
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ormquery_core::adapter::memory::MemoryAdapter;
//! use ormquery_core::plugins::{PaginationPlugin, SortingPlugin};
//! use ormquery_core::QueryBuilder;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> ormquery_core::Result<()> {
//! let adapter = MemoryAdapter::default();
//! adapter.insert("people", json!({"first_name": "Jane", "last_name": "Doe"}))?;
//!
//! let mut builder = QueryBuilder::with_adapter(Arc::new(adapter));
//! builder
//!     .set_option("base_query", json!("people"))
//!     .use_plugin(PaginationPlugin::new())?
//!     .use_plugin(SortingPlugin::new().sorts(["last_name", "first_name"])?)?;
//!
//! let _people = builder
//!     .execute(json!({"sort": "last_name", "limit": 10}))
//!     .await?
//!     .into_value();
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod constants;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod plugins;
pub mod query;
pub mod settings;

pub use adapter::memory::MemoryAdapter;
pub use adapter::{Adapter, ComponentRegistry, JoinSource, JoinSpec, RelationOptions};
pub use error::{QueryError, Result};
pub use pipeline::{
    Context, ExecutionOutput, Executor, Middleware, MiddlewareGroup, Position, QueryBuilder,
    QueryConfig, Strategy,
};
pub use plugins::{
    EagerLoadingPlugin, JoinOptions, JoiningPlugin, OptionGetter, PaginatedStrategy,
    PaginationPlugin, Plugin, SortingPlugin,
};
pub use query::{JoinDefinition, JoinType, Pagination, SortDirection};
pub use settings::{PaginationSettings, PipelineSettings};
