use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents different types of SQL JOINs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
            JoinType::Cross => "cross",
        }
    }
}

impl FromStr for JoinType {
    type Err = QueryError;

    /// Accepts both `left` and query-builder spellings such as `leftOuterJoin`
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "inner" | "innerJoin" => Ok(JoinType::Inner),
            "left" | "leftJoin" | "leftOuterJoin" => Ok(JoinType::Left),
            "right" | "rightJoin" | "rightOuterJoin" => Ok(JoinType::Right),
            "full" | "fullOuterJoin" => Ok(JoinType::Full),
            "cross" | "crossJoin" => Ok(JoinType::Cross),
            other => Err(QueryError::configuration(format!(
                "Join type \"{other}\" is not supported"
            ))),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A possible join resolved for one execution
///
/// `column` lives on the source side (or on a previously joined table),
/// `join_column` on `join_table`, which is aliased as `name` when they differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDefinition {
    pub table: String,
    pub name: String,
    pub join_table: String,
    pub column: String,
    pub join_column: String,
    pub join_type: Option<JoinType>,
    pub required_joins: Vec<String>,
}

impl JoinDefinition {
    pub fn effective_join_type(&self) -> JoinType {
        self.join_type.unwrap_or(JoinType::Inner)
    }

    pub fn is_aliased(&self) -> bool {
        self.join_table != self.name
    }

    /// Convert to SQL string
    pub fn to_sql(&self) -> String {
        let target = if self.is_aliased() {
            format!("{} AS {}", self.join_table, self.name)
        } else {
            self.name.clone()
        };

        match self.effective_join_type() {
            JoinType::Cross => format!("{} {}", JoinType::Cross.to_sql(), target),
            join_type => format!(
                "{} {} ON {} = {}",
                join_type.to_sql(),
                target,
                self.column,
                self.join_column
            ),
        }
    }
}
