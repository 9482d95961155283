//! # Pipeline Settings
//!
//! Process-level defaults for the pipeline plugins and logging. Settings are
//! layered with the `config` crate: built-in defaults, then an optional file,
//! then `ORMQUERY__`-prefixed environment variables
//! (e.g. `ORMQUERY__PAGINATION__MAX_LIMIT=500`).
//!
//! ```rust,no_run
//! use ormquery_core::settings::PipelineSettings;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = PipelineSettings::load("config/ormquery.toml")?;
//! assert!(settings.pagination.default_limit <= settings.pagination.max_limit);
//! # Ok(())
//! # }
//! ```

use crate::constants::pagination::{DEFAULT_LIMIT, MAX_LIMIT};
use crate::error::{QueryError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const ENV_PREFIX: &str = "ORMQUERY";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub pagination: PaginationSettings,
    pub logging: LoggingSettings,
}

/// Limits applied by the pagination plugin when the execution options carry none
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PaginationSettings {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; environment-derived when absent
    pub level: Option<String>,
    pub json: bool,
}

impl PipelineSettings {
    /// Defaults overridden by `ORMQUERY__*` environment variables
    pub fn from_env() -> Result<Self> {
        let config = Config::builder().add_source(Self::environment()).build()?;
        Self::finish(config)
    }

    /// Defaults overridden by the given file (if it exists), then the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading pipeline settings");

        let config = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Self::environment())
            .build()?;
        Self::finish(config)
    }

    pub fn validate(&self) -> Result<()> {
        let pagination = &self.pagination;
        if pagination.default_limit == 0 || pagination.max_limit == 0 {
            return Err(QueryError::configuration(
                "Pagination limits must be greater than zero",
            ));
        }
        if pagination.default_limit > pagination.max_limit {
            return Err(QueryError::configuration(format!(
                "Pagination default_limit ({}) exceeds max_limit ({})",
                pagination.default_limit, pagination.max_limit
            )));
        }
        Ok(())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
    }

    fn finish(config: Config) -> Result<Self> {
        let settings: Self = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
