//! # Query Pipeline
//!
//! The staged execution engine: builder, config, executor, context and the
//! middleware groups that plug behavior into named stages.

pub mod builder;
pub mod config;
pub mod context;
pub mod executor;
pub mod middleware;
pub mod stages;
pub mod state;
pub mod strategy;

pub use builder::QueryBuilder;
pub use config::QueryConfig;
pub use context::{Context, JoinRequirer, MetricsSnapshot, PrivateKey};
pub use executor::{ExecutionOutput, Executor};
pub use middleware::{from_fn, from_sync_fn, named_sync_fn, Middleware, MiddlewareGroup, Position};
pub use state::StateTree;
pub use strategy::Strategy;
