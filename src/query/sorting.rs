use crate::error::{QueryError, Result};
use crate::pipeline::context::json_type_name;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(QueryError::configuration(format!(
                "Unsupported sort direction \"{s}\""
            ))),
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sort name paired with a direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortCriterion {
    pub name: String,
    pub direction: SortDirection,
}

impl SortCriterion {
    pub fn new(name: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }

    /// Parse a requested criterion: `name`, `name-asc` or `name-desc`
    /// (suffix case-insensitive, ascending by default)
    pub fn parse_request(criterion: &str) -> Self {
        let lower = criterion.to_ascii_lowercase();
        for (suffix, direction) in [("-asc", SortDirection::Asc), ("-desc", SortDirection::Desc)] {
            if lower.ends_with(suffix) {
                let name = &criterion[..criterion.len() - suffix.len()];
                return Self::new(name, direction);
            }
        }
        Self::new(criterion, SortDirection::Asc)
    }

    /// Parse a declared default: `name` or `name-direction`
    pub fn parse_declared(sort: &str) -> Result<Self> {
        let mut parts = sort.split('-');
        let name = parts.next().unwrap_or_default();
        let direction = match parts.next() {
            Some(direction) => parse_declared_direction(name, direction)?,
            None => SortDirection::Asc,
        };
        Ok(Self::new(name, direction))
    }

    /// Parse a declared default from dynamic data: a string or `{name, direction}`
    pub fn from_value(sort: &Value) -> Result<Self> {
        match sort {
            Value::String(sort) => Self::parse_declared(sort),
            Value::Object(map) => {
                let name = map.get("name").and_then(Value::as_str).unwrap_or_default();
                let direction = match map.get("direction") {
                    None | Some(Value::Null) => SortDirection::Asc,
                    Some(Value::String(direction)) => parse_declared_direction(name, direction)?,
                    Some(other) => parse_declared_direction(name, &other.to_string())?,
                };
                Ok(Self::new(name, direction))
            }
            other => Err(QueryError::configuration(format!(
                "Unsupported default sort type {}",
                json_type_name(other)
            ))),
        }
    }
}

fn parse_declared_direction(name: &str, direction: &str) -> Result<SortDirection> {
    direction.parse().map_err(|_| {
        QueryError::configuration(format!(
            "Unsupported sort order \"{direction}\" for sort \"{name}\""
        ))
    })
}
