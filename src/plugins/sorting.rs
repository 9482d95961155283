//! # Sorting Plugin
//!
//! Declared sorts are applied at `before("end")`: first the requested ones in
//! request order, then the declared defaults whose names were not requested.
//! Requested criteria naming undeclared sorts are ignored.

use crate::constants::{option_keys, stages, state_keys};
use crate::error::{QueryError, Result};
use crate::pipeline::builder::QueryBuilder;
use crate::pipeline::context::Context;
use crate::pipeline::middleware::Middleware;
use crate::plugins::getter::OptionGetter;
use crate::plugins::Plugin;
use crate::query::{SortCriterion, SortDirection};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Turns a direction into a transformation of the query
#[async_trait]
pub trait SortDefinition: Send + Sync {
    async fn apply(&self, query: Value, direction: SortDirection, context: &Context) -> Result<Value>;
}

/// Orders by one column through the adapter
#[derive(Debug, Clone)]
pub struct ColumnSort {
    column: String,
}

impl ColumnSort {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

#[async_trait]
impl SortDefinition for ColumnSort {
    async fn apply(&self, query: Value, direction: SortDirection, context: &Context) -> Result<Value> {
        context
            .adapter()
            .order_query_by(query, &self.column, direction, context)
            .await
    }
}

type SortFn =
    dyn for<'a> Fn(Value, SortDirection, &'a Context) -> BoxFuture<'a, Result<Value>> + Send + Sync;

struct FnSort(Box<SortFn>);

#[async_trait]
impl SortDefinition for FnSort {
    async fn apply(&self, query: Value, direction: SortDirection, context: &Context) -> Result<Value> {
        (self.0)(query, direction, context).await
    }
}

/// Adapt an asynchronous function into a sort definition
pub fn sort_fn<F>(func: F) -> Arc<dyn SortDefinition>
where
    F: for<'a> Fn(Value, SortDirection, &'a Context) -> BoxFuture<'a, Result<Value>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnSort(Box::new(func)))
}

pub struct SortingPlugin {
    sorts: HashMap<String, Arc<dyn SortDefinition>>,
    default_sort: Vec<SortCriterion>,
    requested: OptionGetter,
}

impl Default for SortingPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl SortingPlugin {
    pub fn new() -> Self {
        Self {
            sorts: HashMap::new(),
            default_sort: Vec::new(),
            requested: OptionGetter::path(option_keys::SORT),
        }
    }

    /// Where the requested sort (a string or a list of strings) is read from
    pub fn sort_from(mut self, getter: impl Into<OptionGetter>) -> Self {
        self.requested = getter.into();
        self
    }

    pub fn sort(mut self, name: impl Into<String>, definition: Arc<dyn SortDefinition>) -> Result<Self> {
        let name = name.into();
        if self.sorts.contains_key(&name) {
            return Err(QueryError::configuration(format!(
                "Sort \"{name}\" is already defined"
            )));
        }
        self.sorts.insert(name, definition);
        Ok(self)
    }

    /// Declare sorts ordering by the column of the same name
    pub fn sorts<I, S>(self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names.into_iter().try_fold(self, |plugin, name| {
            let name = name.into();
            let definition = Arc::new(ColumnSort::new(name.as_str()));
            plugin.sort(name, definition)
        })
    }

    /// Declare a sort named differently from its column
    pub fn sort_by_column(self, name: impl Into<String>, column: impl Into<String>) -> Result<Self> {
        self.sort(name, Arc::new(ColumnSort::new(column)))
    }

    /// Defaults such as `["lastName-asc", "firstName"]`, applied after requested sorts
    pub fn default_sort<I, S>(self, sorts: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let criteria = sorts
            .into_iter()
            .map(|sort| SortCriterion::parse_declared(sort.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.set_default_sort(criteria)
    }

    /// Defaults from dynamic data: strings, `{name, direction}` objects or nested lists
    pub fn default_sort_values(self, sorts: &[Value]) -> Result<Self> {
        fn collect(values: &[Value], criteria: &mut Vec<SortCriterion>) -> Result<()> {
            for value in values {
                match value {
                    Value::Array(nested) => collect(nested, criteria)?,
                    other => criteria.push(SortCriterion::from_value(other)?),
                }
            }
            Ok(())
        }

        let mut criteria = Vec::new();
        collect(sorts, &mut criteria)?;
        self.set_default_sort(criteria)
    }

    fn set_default_sort(mut self, criteria: Vec<SortCriterion>) -> Result<Self> {
        if let Some(undefined) = criteria.iter().find(|c| !self.sorts.contains_key(&c.name)) {
            return Err(QueryError::configuration(format!(
                "Undefined sort \"{}\"",
                undefined.name
            )));
        }
        self.default_sort = criteria;
        Ok(self)
    }

    /// Requested criteria that name a declared sort
    fn requested_criteria(&self, context: &Context) -> Vec<SortCriterion> {
        let requested: Vec<String> = match self.requested.get(context) {
            Some(Value::String(sort)) => vec![sort],
            Some(Value::Array(sorts)) => sorts
                .into_iter()
                .filter_map(|sort| sort.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        requested
            .iter()
            .filter(|sort| !sort.is_empty())
            .map(|sort| SortCriterion::parse_request(sort))
            .filter(|criterion| {
                let defined = self.sorts.contains_key(&criterion.name);
                if !defined {
                    debug!(sort = %criterion.name, "Ignoring undeclared sort");
                }
                defined
            })
            .collect()
    }

    async fn apply(&self, context: &Context) -> Result<()> {
        let requested = self.requested_criteria(context);
        let requested_names: HashSet<&str> = requested.iter().map(|c| c.name.as_str()).collect();
        let defaults = self
            .default_sort
            .iter()
            .filter(|criterion| !requested_names.contains(criterion.name.as_str()));

        let mut query = context.current_query()?;
        for criterion in requested.iter().chain(defaults) {
            if let Some(definition) = self.sorts.get(&criterion.name) {
                query = definition.apply(query, criterion.direction, context).await?;
            }
        }
        context.set(state_keys::QUERY, query);
        Ok(())
    }
}

struct SortingMiddleware(Arc<SortingPlugin>);

#[async_trait]
impl Middleware for SortingMiddleware {
    async fn execute(&self, context: &Context) -> Result<()> {
        self.0.apply(context).await
    }

    fn name(&self) -> &str {
        "sorting"
    }
}

impl Plugin for SortingPlugin {
    fn name(&self) -> &str {
        "sorting"
    }

    fn register(self: Arc<Self>, builder: &mut QueryBuilder) -> Result<()> {
        builder.before(stages::END, [Arc::new(SortingMiddleware(self)) as Arc<dyn Middleware>])?;
        Ok(())
    }
}
