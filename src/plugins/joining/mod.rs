//! # Joining Plugin
//!
//! Declares the possible joins of one source table or model and applies the
//! ones requested at runtime through [`Context::require_join`].
//!
//! Joins are declared manually with [`JoiningPlugin::join`] or derived from
//! model relationships by the adapter with [`JoiningPlugin::relation`]. When
//! the plugin is registered the full catalogue is checked for undeclared
//! prerequisites and dependency cycles. During an execution:
//!
//! - `before("start")` installs the resolver on the context
//! - `require_join` validates names immediately and records them
//! - `before("query")` applies the requested joins and their prerequisites in
//!   dependency order, skipping joins already applied
//!
//! ```rust,ignore
//! let joining = JoiningPlugin::for_model("Person")
//!     .relation("books", RelationOptions::default())?
//!     .join("themes", JoinOptions::on("books.theme_id", "themes.id").requires("books"))?;
//! builder.use_plugin(joining)?;
//! builder.before("end", [from_sync_fn(|context| context.require_join(["themes"]))])?;
//! ```

mod catalogue;
pub mod resolver;

pub use catalogue::{JoinCatalogue, JoinDeclaration, JoinOptions};

use crate::adapter::{JoinSource, RelationOptions};
use crate::constants::{stages, state_keys};
use crate::error::{QueryError, Result};
use crate::pipeline::builder::QueryBuilder;
use crate::pipeline::context::{Context, JoinRequirer, PrivateKey};
use crate::pipeline::middleware::Middleware;
use crate::plugins::Plugin;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub struct JoiningPlugin {
    catalogue: JoinCatalogue,
    relations: Vec<(String, RelationOptions)>,
}

impl JoiningPlugin {
    pub fn new(source: JoinSource) -> Self {
        Self {
            catalogue: JoinCatalogue::new(source),
            relations: Vec::new(),
        }
    }

    pub fn for_table(table: impl Into<String>) -> Self {
        Self::new(JoinSource::table(table))
    }

    pub fn for_model(model: impl Into<String>) -> Self {
        Self::new(JoinSource::model(model))
    }

    pub fn join(mut self, name: &str, options: JoinOptions) -> Result<Self> {
        self.catalogue.declare(name, options)?;
        Ok(self)
    }

    /// Joins derived from a model relationship when the plugin is registered
    pub fn relation(mut self, name: impl Into<String>, options: RelationOptions) -> Result<Self> {
        let name = name.into();
        if self.relations.iter().any(|(existing, _)| *existing == name) {
            return Err(QueryError::configuration(format!(
                "Relation \"{name}\" has already been defined"
            )));
        }
        self.relations.push((name, options));
        Ok(self)
    }

    /// Several relations sharing the same options
    pub fn relations<I, S>(self, names: I, options: RelationOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .try_fold(self, |plugin, name| plugin.relation(name, options.clone()))
    }
}

/// Requested and applied joins of one execution
#[derive(Debug, Clone, Default)]
struct JoinState {
    requested: Vec<String>,
    applied: HashSet<String>,
    sealed: bool,
}

/// Runtime side of the plugin, shared by every execution of the builder
struct JoinResolver {
    catalogue: JoinCatalogue,
    state: PrivateKey<JoinState>,
}

impl JoinResolver {
    fn install(self: &Arc<Self>, context: &Context) {
        context.set_private(&self.state, JoinState::default());
        context.install_join_requirer(Arc::clone(self) as Arc<dyn JoinRequirer>);
    }

    async fn apply_required_joins(&self, context: &Context) -> Result<()> {
        let state = context
            .update_private(&self.state, |state| {
                state.sealed = true;
                state.clone()
            })
            .unwrap_or_default();
        if state.requested.is_empty() {
            return Ok(());
        }

        let order = resolver::resolve(&self.catalogue, &state.requested)?;
        let table = self.catalogue.source().resolve_table_name(context)?;
        let adapter = context.adapter();

        let mut query = context.current_query()?;
        let mut applied = Vec::new();
        for name in order.iter().filter(|name| !state.applied.contains(*name)) {
            let Some(declaration) = self.catalogue.get(name) else {
                continue;
            };
            let definition = declaration.definition(&table);
            debug!(
                execution_id = %context.execution_id(),
                join = %name,
                sql = %definition.to_sql(),
                "Applying join"
            );

            query = adapter
                .apply_join_definition(query, &definition, context)
                .await?
                .ok_or_else(|| {
                    QueryError::join_resolution(format!(
                        "Adapter returned no result when applying join \"{name}\""
                    ))
                })?;
            context.execution_metrics().record_join();
            applied.push(name.clone());
        }

        context.set(state_keys::QUERY, query);
        context.update_private(&self.state, |state| state.applied.extend(applied));
        Ok(())
    }
}

impl JoinRequirer for JoinResolver {
    fn require(&self, context: &Context, names: &[String]) -> Result<()> {
        resolver::ensure_defined(&self.catalogue, names)?;

        let recorded = context.update_private(&self.state, |state| {
            if state.sealed {
                return Err(QueryError::join_resolution(format!(
                    "Joins must be required before the \"{}\" stage: {}",
                    stages::QUERY,
                    names.join(", ")
                )));
            }
            for name in names {
                if !state.requested.contains(name) {
                    state.requested.push(name.clone());
                }
            }
            Ok(())
        });
        recorded.unwrap_or_else(|| {
            Err(QueryError::configuration(
                "The joining plugin was not initialized for this execution",
            ))
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Install,
    Apply,
}

struct JoiningMiddleware {
    resolver: Arc<JoinResolver>,
    step: Step,
}

#[async_trait]
impl Middleware for JoiningMiddleware {
    async fn execute(&self, context: &Context) -> Result<()> {
        match self.step {
            Step::Install => {
                self.resolver.install(context);
                Ok(())
            }
            Step::Apply => self.resolver.apply_required_joins(context).await,
        }
    }

    fn name(&self) -> &str {
        match self.step {
            Step::Install => "joining:install",
            Step::Apply => "joining:apply",
        }
    }
}

impl Plugin for JoiningPlugin {
    fn name(&self) -> &str {
        "joining"
    }

    fn register(self: Arc<Self>, builder: &mut QueryBuilder) -> Result<()> {
        let mut catalogue = self.catalogue.clone();

        let source = match catalogue.source() {
            JoinSource::Table(name) | JoinSource::Model(name) => name.clone(),
        };
        for (relation, options) in &self.relations {
            let config = builder.config();
            let specs = config
                .adapter()
                .join_definitions(&source, relation, options, config)?;
            for spec in specs {
                let name = spec.name.clone();
                catalogue.declare(&name, JoinOptions::try_from(spec)?)?;
            }
        }
        resolver::validate_catalogue(&catalogue)?;

        info!(
            source = %source,
            joins = catalogue.len(),
            "Registered join catalogue"
        );

        let resolver = Arc::new(JoinResolver {
            catalogue,
            state: PrivateKey::new(),
        });
        let middleware = |step| -> Arc<dyn Middleware> {
            Arc::new(JoiningMiddleware {
                resolver: Arc::clone(&resolver),
                step,
            })
        };

        builder.before(stages::START, [middleware(Step::Install)])?;
        builder.before(stages::QUERY, [middleware(Step::Apply)])?;
        Ok(())
    }
}
