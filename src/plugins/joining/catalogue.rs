use crate::adapter::{JoinSource, JoinSpec};
use crate::error::{QueryError, Result};
use crate::query::{JoinDefinition, JoinType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options of a manually declared join
///
/// `column` lives on the source table (or a previously joined one) and
/// `join_column` on the joined table, which defaults to the join name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinOptions {
    pub join_table: Option<String>,
    pub column: Option<String>,
    pub join_column: Option<String>,
    pub join_type: Option<JoinType>,
    pub required_join: Option<String>,
    pub required_joins: Vec<String>,
}

impl JoinOptions {
    pub fn on(column: impl Into<String>, join_column: impl Into<String>) -> Self {
        Self {
            column: Some(column.into()),
            join_column: Some(join_column.into()),
            ..Self::default()
        }
    }

    pub fn join_table(mut self, table: impl Into<String>) -> Self {
        self.join_table = Some(table.into());
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = Some(join_type);
        self
    }

    pub fn requires(mut self, join: impl Into<String>) -> Self {
        self.required_joins.push(join.into());
        self
    }
}

impl TryFrom<JoinSpec> for JoinOptions {
    type Error = QueryError;

    fn try_from(spec: JoinSpec) -> Result<Self> {
        let join_type = spec.join_type.as_deref().map(str::parse).transpose()?;
        Ok(Self {
            join_table: Some(spec.join_table),
            column: Some(spec.column),
            join_column: Some(spec.join_column),
            join_type,
            required_join: spec.required_join,
            required_joins: Vec::new(),
        })
    }
}

/// A validated entry of the catalogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinDeclaration {
    pub name: String,
    pub join_table: String,
    pub column: String,
    pub join_column: String,
    pub join_type: Option<JoinType>,
    pub required_joins: Vec<String>,
}

impl JoinDeclaration {
    /// The definition handed to the adapter once the source table is known
    pub fn definition(&self, table: &str) -> JoinDefinition {
        JoinDefinition {
            table: table.to_string(),
            name: self.name.clone(),
            join_table: self.join_table.clone(),
            column: self.column.clone(),
            join_column: self.join_column.clone(),
            join_type: self.join_type,
            required_joins: self.required_joins.clone(),
        }
    }
}

/// The possible joins of one source table or model, in declaration order
#[derive(Debug, Clone)]
pub struct JoinCatalogue {
    source: JoinSource,
    joins: Vec<JoinDeclaration>,
    index: HashMap<String, usize>,
}

fn required(option: Option<String>, message: &str) -> Result<String> {
    option
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| QueryError::configuration(message))
}

impl JoinCatalogue {
    pub fn new(source: JoinSource) -> Self {
        Self {
            source,
            joins: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn source(&self) -> &JoinSource {
        &self.source
    }

    pub fn declare(&mut self, name: &str, options: JoinOptions) -> Result<()> {
        if self.source.is_blank() {
            return Err(QueryError::configuration("Join source table is required"));
        }
        if name.trim().is_empty() {
            return Err(QueryError::configuration("Join name is required"));
        }
        if self.index.contains_key(name) {
            return Err(QueryError::configuration(format!(
                "A join named \"{name}\" is already defined"
            )));
        }

        let column = required(
            options.column,
            "Join option \"column\" is required (the column name on which to join in the source table)",
        )?;
        let join_column = required(
            options.join_column,
            "Join option \"joinColumn\" is required (the column name on which to join in the target table)",
        )?;

        let mut required_joins: Vec<String> = Vec::new();
        for join in options.required_join.into_iter().chain(options.required_joins) {
            if !join.is_empty() && !required_joins.contains(&join) {
                required_joins.push(join);
            }
        }

        self.index.insert(name.to_string(), self.joins.len());
        self.joins.push(JoinDeclaration {
            name: name.to_string(),
            join_table: options.join_table.unwrap_or_else(|| name.to_string()),
            column,
            join_column,
            join_type: options.join_type,
            required_joins,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&JoinDeclaration> {
        self.index.get(name).map(|&position| &self.joins[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Prerequisites of `name`; empty for unknown names
    pub fn required_joins(&self, name: &str) -> &[String] {
        self.get(name)
            .map(|join| join.required_joins.as_slice())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JoinDeclaration> {
        self.joins.iter()
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}
