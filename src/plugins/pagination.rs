//! # Pagination Plugin
//!
//! Reads an offset/limit window after `start`, schedules the `countTotal` and
//! `paginate` stages, and records `pagination.{offset, limit, total,
//! filteredTotal}` in the context state.
//!
//! `paginate` only re-counts when the query identifier changed since
//! `countTotal`, e.g. because a `before("paginate")` middleware added filters.
//!
//! [`PaginatedStrategy`] runs the same steps as strategy stage bodies
//! (`init`, `countTotal`, `paginate`) for configs declared by name with
//! `{"strategy": "paginated"}`.

use crate::constants::{option_keys, pagination as stage_names, state_keys};
use crate::error::{QueryError, Result};
use crate::pipeline::builder::QueryBuilder;
use crate::pipeline::context::{Context, PrivateKey};
use crate::pipeline::middleware::Middleware;
use crate::pipeline::strategy::Strategy;
use crate::plugins::getter::OptionGetter;
use crate::plugins::Plugin;
use crate::query::{parse_int, Pagination};
use crate::settings::PaginationSettings;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct PaginationPlugin {
    offset: OptionGetter,
    limit: OptionGetter,
    default_limit: OptionGetter,
    max_limit: OptionGetter,
    settings: PaginationSettings,
    counted_query: PrivateKey<String>,
}

impl Default for PaginationPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PaginationPlugin {
    pub fn new() -> Self {
        Self::with_settings(PaginationSettings::default())
    }

    /// Limits used when the execution options do not override them
    pub fn with_settings(settings: PaginationSettings) -> Self {
        Self {
            offset: OptionGetter::path(option_keys::OFFSET),
            limit: OptionGetter::path(option_keys::LIMIT),
            default_limit: OptionGetter::path(option_keys::DEFAULT_LIMIT),
            max_limit: OptionGetter::path(option_keys::MAX_LIMIT),
            settings,
            counted_query: PrivateKey::new(),
        }
    }

    pub fn offset_from(mut self, getter: impl Into<OptionGetter>) -> Self {
        self.offset = getter.into();
        self
    }

    pub fn limit_from(mut self, getter: impl Into<OptionGetter>) -> Self {
        self.limit = getter.into();
        self
    }

    pub fn default_limit_from(mut self, getter: impl Into<OptionGetter>) -> Self {
        self.default_limit = getter.into();
        self
    }

    pub fn max_limit_from(mut self, getter: impl Into<OptionGetter>) -> Self {
        self.max_limit = getter.into();
        self
    }

    fn positive_limit(getter: &OptionGetter, context: &Context, fallback: u64) -> u64 {
        getter
            .get(context)
            .as_ref()
            .and_then(parse_int)
            .and_then(|limit| u64::try_from(limit).ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(fallback)
    }

    fn resolve_window(&self, context: &Context) -> Result<()> {
        let default_limit =
            Self::positive_limit(&self.default_limit, context, self.settings.default_limit);
        let max_limit = Self::positive_limit(&self.max_limit, context, self.settings.max_limit);

        let pagination = Pagination::from_input(
            self.offset.get(context).as_ref(),
            self.limit.get(context).as_ref(),
            default_limit,
            max_limit,
        );
        debug!(
            execution_id = %context.execution_id(),
            offset = pagination.offset,
            limit = pagination.limit,
            "Resolved pagination window"
        );

        context.set(state_keys::PAGINATION, serde_json::to_value(&pagination)?);
        Ok(())
    }

    fn start(&self, context: &Context) -> Result<()> {
        self.resolve_window(context)?;
        context.add_stages([stage_names::COUNT_TOTAL_STAGE, stage_names::PAGINATE_STAGE]);
        Ok(())
    }

    async fn count_total(&self, context: &Context) -> Result<()> {
        let query = context.current_query()?;
        let total = context.count(Some(query.clone())).await?;
        context.set(state_keys::PAGINATION_TOTAL, Value::from(total));

        let identifier = context.adapter().query_identifier(&query, context)?;
        context.set_private(&self.counted_query, identifier);
        Ok(())
    }

    async fn paginate(&self, context: &Context) -> Result<()> {
        let query = context.current_query()?;
        let identifier = context.adapter().query_identifier(&query, context)?;
        let counted = context.get_private(&self.counted_query);
        let total = context.get(state_keys::PAGINATION_TOTAL);

        let filtered_total = match total {
            Some(total) if counted.as_deref() == Some(identifier.as_str()) => total,
            _ => {
                debug!(execution_id = %context.execution_id(), "Query changed since countTotal; counting again");
                Value::from(context.count(Some(query.clone())).await?)
            }
        };
        context.set(state_keys::PAGINATION_FILTERED_TOTAL, filtered_total);

        let window: Pagination = context
            .get(state_keys::PAGINATION)
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| {
                QueryError::configuration("Pagination window is missing from the context state")
            })?;

        let query = context
            .adapter()
            .paginate_query(query, window.offset, window.limit, context)
            .await?;
        context.set(state_keys::QUERY, query);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Start,
    CountTotal,
    Paginate,
}

struct PaginationMiddleware {
    plugin: Arc<PaginationPlugin>,
    step: Step,
}

#[async_trait]
impl Middleware for PaginationMiddleware {
    async fn execute(&self, context: &Context) -> Result<()> {
        match self.step {
            Step::Start => self.plugin.start(context),
            Step::CountTotal => self.plugin.count_total(context).await,
            Step::Paginate => self.plugin.paginate(context).await,
        }
    }

    fn name(&self) -> &str {
        match self.step {
            Step::Start => "pagination:start",
            Step::CountTotal => "pagination:countTotal",
            Step::Paginate => "pagination:paginate",
        }
    }
}

impl Plugin for PaginationPlugin {
    fn name(&self) -> &str {
        "pagination"
    }

    fn register(self: Arc<Self>, builder: &mut QueryBuilder) -> Result<()> {
        let middleware = |step| -> Arc<dyn Middleware> {
            Arc::new(PaginationMiddleware {
                plugin: Arc::clone(&self),
                step,
            })
        };

        builder.after("start", [middleware(Step::Start)])?;
        builder.on(stage_names::COUNT_TOTAL_STAGE, [middleware(Step::CountTotal)])?;
        builder.on(stage_names::PAGINATE_STAGE, [middleware(Step::Paginate)])?;
        Ok(())
    }
}

/// Pagination declared as a strategy instead of a plugin
///
/// Strategy options may name the option paths to read the window from:
/// `{"offset": "req.query.offset", "limit": "req.query.limit"}`.
#[derive(Debug)]
pub struct PaginatedStrategy {
    pagination: PaginationPlugin,
}

impl Default for PaginatedStrategy {
    fn default() -> Self {
        Self::new(PaginationPlugin::new())
    }
}

impl PaginatedStrategy {
    pub const NAME: &'static str = "paginated";

    pub fn new(pagination: PaginationPlugin) -> Self {
        Self { pagination }
    }

    pub fn from_options(options: &Value) -> Result<Self> {
        let path = |key: &str| -> Result<Option<OptionGetter>> {
            match options.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(path)) => Ok(Some(OptionGetter::path(path.as_str()))),
                Some(other) => Err(QueryError::configuration(format!(
                    "Paginated strategy option \"{key}\" must be an option path, got {other}"
                ))),
            }
        };

        let mut pagination = PaginationPlugin::new();
        if let Some(getter) = path(option_keys::OFFSET)? {
            pagination = pagination.offset_from(getter);
        }
        if let Some(getter) = path(option_keys::LIMIT)? {
            pagination = pagination.limit_from(getter);
        }
        Ok(Self::new(pagination))
    }
}

#[async_trait]
impl Strategy for PaginatedStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn stages(&self, _context: &Context) -> Vec<String> {
        [
            stage_names::INIT_STAGE,
            stage_names::COUNT_TOTAL_STAGE,
            stage_names::PAGINATE_STAGE,
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    async fn on(&self, stage: &str, context: &Context) -> Result<()> {
        match stage {
            stage_names::INIT_STAGE => self.pagination.resolve_window(context),
            stage_names::COUNT_TOTAL_STAGE => self.pagination.count_total(context).await,
            stage_names::PAGINATE_STAGE => self.pagination.paginate(context).await,
            _ => Ok(()),
        }
    }
}
