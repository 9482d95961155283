//! # Plugins
//!
//! Reusable concerns that hook themselves into a [`QueryBuilder`]'s stages:
//! joins, pagination, sorting and eager loading. A plugin is consumed when
//! registered; the middlewares it installs share it through an `Arc`.

pub mod eager_loading;
pub mod getter;
pub mod joining;
pub mod pagination;
pub mod sorting;

pub use eager_loading::EagerLoadingPlugin;
pub use getter::OptionGetter;
pub use joining::{JoinOptions, JoiningPlugin};
pub use pagination::{PaginatedStrategy, PaginationPlugin};
pub use sorting::{sort_fn, ColumnSort, SortDefinition, SortingPlugin};

use crate::error::Result;
use crate::pipeline::builder::QueryBuilder;
use std::sync::Arc;

pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Install the plugin's middleware groups on `builder`
    fn register(self: Arc<Self>, builder: &mut QueryBuilder) -> Result<()>;
}
