//! Tables and model metadata of the in-memory database.

use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDatabase {
    pub tables: BTreeMap<String, Vec<Record>>,
    pub models: BTreeMap<String, ModelSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub table: String,
    #[serde(default = "default_id_attribute")]
    pub id_attribute: String,
    /// Singular form used to derive foreign key names; defaults to the table
    /// name without its plural suffix
    #[serde(default)]
    pub singular: Option<String>,
    #[serde(default)]
    pub relations: BTreeMap<String, Relation>,
}

fn default_id_attribute() -> String {
    "id".to_string()
}

/// Relationship metadata; key columns are unqualified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Relation {
    /// Foreign key on this model's table
    BelongsTo {
        target: String,
        #[serde(default)]
        foreign_key: Option<String>,
    },
    /// Foreign key on the target table
    HasMany {
        target: String,
        #[serde(default)]
        foreign_key: Option<String>,
    },
    HasOne {
        target: String,
        #[serde(default)]
        foreign_key: Option<String>,
    },
    /// Pivot table holding both keys
    BelongsToMany {
        target: String,
        #[serde(default)]
        join_table: Option<String>,
        #[serde(default)]
        foreign_key: Option<String>,
        #[serde(default)]
        other_key: Option<String>,
    },
}

impl Relation {
    pub fn target(&self) -> &str {
        match self {
            Self::BelongsTo { target, .. }
            | Self::HasMany { target, .. }
            | Self::HasOne { target, .. }
            | Self::BelongsToMany { target, .. } => target,
        }
    }
}

impl ModelSchema {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_attribute: default_id_attribute(),
            singular: None,
            relations: BTreeMap::new(),
        }
    }

    pub fn singular(mut self, singular: impl Into<String>) -> Self {
        self.singular = Some(singular.into());
        self
    }

    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.relations.insert(name.into(), relation);
        self
    }

    pub fn singular_name(&self) -> String {
        self.singular
            .clone()
            .unwrap_or_else(|| singularize(&self.table))
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, name: impl Into<String>, schema: ModelSchema) -> Self {
        self.tables.entry(schema.table.clone()).or_default();
        self.models.insert(name.into(), schema);
        self
    }

    /// Insert a record, assigning the next integer `id` when it has none
    pub fn insert(&mut self, table: &str, record: Value) -> Result<Value> {
        let Value::Object(mut record) = record else {
            return Err(QueryError::configuration(format!(
                "Records inserted into \"{table}\" must be objects"
            )));
        };

        let rows = self.tables.entry(table.to_string()).or_default();
        if !record.contains_key("id") {
            let next_id = rows
                .iter()
                .filter_map(|row| row.get("id").and_then(Value::as_u64))
                .max()
                .unwrap_or(0)
                + 1;
            record.insert("id".to_string(), Value::from(next_id));
        }
        rows.push(record.clone());
        Ok(Value::Object(record))
    }

    pub fn rows(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn model(&self, name: &str) -> Result<&ModelSchema> {
        self.models
            .get(name)
            .ok_or_else(|| QueryError::configuration(format!("Unknown model \"{name}\"")))
    }

    pub fn model_for_table(&self, table: &str) -> Option<(&str, &ModelSchema)> {
        self.models
            .iter()
            .find(|(_, schema)| schema.table == table)
            .map(|(name, schema)| (name.as_str(), schema))
    }
}

/// Naive English singular for table names (`themes` → `theme`, `categories` → `category`)
pub fn singularize(table: &str) -> String {
    if let Some(stem) = table.strip_suffix("ies") {
        format!("{stem}y")
    } else if let Some(stem) = table.strip_suffix('s') {
        stem.to_string()
    } else {
        table.to_string()
    }
}
