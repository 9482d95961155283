use crate::error::{QueryError, Result};
use crate::pipeline::context::{json_type_name, Context};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type GetterFn = dyn Fn(&Context) -> Option<Value> + Send + Sync;

/// Where a plugin reads one of its inputs from
///
/// A path starting with `state.` reads the context state; `options.` or any
/// other path reads the execution options.
#[derive(Clone)]
pub enum OptionGetter {
    Path(String),
    Func(Arc<GetterFn>),
}

impl OptionGetter {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn func<F>(func: F) -> Self
    where
        F: Fn(&Context) -> Option<Value> + Send + Sync + 'static,
    {
        Self::Func(Arc::new(func))
    }

    /// Getter from dynamically typed configuration; only paths are representable
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(path) => Ok(Self::path(path.as_str())),
            other => Err(QueryError::configuration(format!(
                "Unsupported option getter type {}",
                json_type_name(other)
            ))),
        }
    }

    pub fn get(&self, context: &Context) -> Option<Value> {
        match self {
            Self::Path(path) => {
                if let Some(path) = path.strip_prefix("state.") {
                    context.get(path)
                } else {
                    context.option(path.strip_prefix("options.").unwrap_or(path))
                }
            }
            Self::Func(func) => func(context),
        }
    }
}

impl From<&str> for OptionGetter {
    fn from(path: &str) -> Self {
        Self::path(path)
    }
}

impl fmt::Debug for OptionGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Func(_) => f.write_str("Func(..)"),
        }
    }
}
