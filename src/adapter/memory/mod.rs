//! # In-Memory Adapter
//!
//! A complete [`Adapter`] over JSON record tables held in process memory.
//! It backs the test suite and documents what a real data-access adapter is
//! expected to do for each contract operation.
//!
//! The base query comes from the `base_query` option: a model name, a table
//! name or a full serialized [`MemoryQuery`].

mod engine;
mod schema;

pub use engine::{compare_values, where_eq, Filter, FilterOp, JoinClause, MemoryQuery, OrderClause};
pub use schema::{singularize, MemoryDatabase, ModelSchema, Record, Relation};

use crate::adapter::{Adapter, JoinSpec, RelationOptions};
use crate::constants::{option_keys, state_keys};
use crate::error::{QueryError, Result};
use crate::pipeline::config::QueryConfig;
use crate::pipeline::context::Context;
use crate::query::{JoinDefinition, JoinType, SortDirection};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone, Default)]
pub struct MemoryAdapter {
    database: Arc<RwLock<MemoryDatabase>>,
}

impl MemoryAdapter {
    pub fn new(database: MemoryDatabase) -> Self {
        Self {
            database: Arc::new(RwLock::new(database)),
        }
    }

    /// Build from registry options: a serialized [`MemoryDatabase`] or nothing
    pub fn from_options(options: &Value) -> Result<Self> {
        match options {
            Value::Null => Ok(Self::default()),
            options => Ok(Self::new(serde_json::from_value(options.clone())?)),
        }
    }

    /// Shared handle to the underlying database
    pub fn database(&self) -> Arc<RwLock<MemoryDatabase>> {
        Arc::clone(&self.database)
    }

    pub fn insert(&self, table: &str, record: Value) -> Result<Value> {
        self.database.write().insert(table, record)
    }
}

fn qualify(table: &str, column: &str) -> String {
    if column.contains('.') {
        column.to_string()
    } else {
        format!("{table}.{column}")
    }
}

/// Foreign key column on the owning side, e.g. `theme_id`
fn foreign_key_for(schema: &ModelSchema) -> String {
    format!("{}_{}", schema.singular_name(), schema.id_attribute)
}

fn pivot_table_name(source: &ModelSchema, target: &ModelSchema) -> String {
    let mut tables = [source.table.as_str(), target.table.as_str()];
    tables.sort_unstable();
    tables.join("_")
}

fn relation_not_found(model: &str, relation: &str) -> QueryError {
    QueryError::configuration(format!("Model \"{model}\" has no relation \"{relation}\""))
}

fn matching<'a>(
    rows: &'a [Record],
    column: &str,
    key: Option<&'a Value>,
) -> impl Iterator<Item = &'a Record> + 'a {
    let column = column.to_string();
    rows.iter().filter(move |row| match key {
        Some(key) if !key.is_null() => row.get(&column) == Some(key),
        _ => false,
    })
}

/// Records related to `record` through `relation`
fn related_records(
    database: &MemoryDatabase,
    source: &ModelSchema,
    relation: &Relation,
    target: &ModelSchema,
    record: &Record,
) -> Value {
    let target_rows = database.rows(&target.table);
    let own_id = record.get(&source.id_attribute);
    let to_value = |row: &Record| Value::Object(row.clone());

    match relation {
        Relation::BelongsTo { foreign_key, .. } => {
            let foreign_key = foreign_key.clone().unwrap_or_else(|| foreign_key_for(target));
            matching(target_rows, &target.id_attribute, record.get(&foreign_key))
                .next()
                .map_or(Value::Null, to_value)
        }
        Relation::HasMany { foreign_key, .. } => {
            let foreign_key = foreign_key.clone().unwrap_or_else(|| foreign_key_for(source));
            Value::Array(matching(target_rows, &foreign_key, own_id).map(to_value).collect())
        }
        Relation::HasOne { foreign_key, .. } => {
            let foreign_key = foreign_key.clone().unwrap_or_else(|| foreign_key_for(source));
            matching(target_rows, &foreign_key, own_id)
                .next()
                .map_or(Value::Null, to_value)
        }
        Relation::BelongsToMany {
            join_table,
            foreign_key,
            other_key,
            ..
        } => {
            let join_table = join_table
                .clone()
                .unwrap_or_else(|| pivot_table_name(source, target));
            let foreign_key = foreign_key.clone().unwrap_or_else(|| foreign_key_for(source));
            let other_key = other_key.clone().unwrap_or_else(|| foreign_key_for(target));

            let related = matching(database.rows(&join_table), &foreign_key, own_id)
                .filter_map(|pivot| {
                    matching(target_rows, &target.id_attribute, pivot.get(&other_key)).next()
                })
                .map(to_value)
                .collect();
            Value::Array(related)
        }
    }
}

/// Hydrate `path` (e.g. `["books", "theme"]`) onto every record
fn load_path(
    database: &MemoryDatabase,
    model: &str,
    records: &mut [Value],
    path: &[&str],
) -> Result<()> {
    let Some((&relation_name, rest)) = path.split_first() else {
        return Ok(());
    };

    let source = database.model(model)?;
    let relation = source
        .relations
        .get(relation_name)
        .ok_or_else(|| relation_not_found(model, relation_name))?;
    let target_model = relation.target();
    let target = database.model(target_model)?;

    for record in records.iter_mut() {
        let Value::Object(map) = record else {
            continue;
        };

        // Intermediate segments reuse what an earlier load hydrated
        if rest.is_empty() || !map.contains_key(relation_name) {
            let related = related_records(database, source, relation, target, map);
            map.insert(relation_name.to_string(), related);
        }

        if rest.is_empty() {
            continue;
        }
        if let Some(loaded) = map.get_mut(relation_name) {
            if loaded.is_object() {
                load_path(database, target_model, std::slice::from_mut(loaded), rest)?;
            } else if let Value::Array(items) = loaded {
                load_path(database, target_model, items, rest)?;
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create_query(&self, context: &Context) -> Result<Option<Value>> {
        let query = match context.option(option_keys::BASE_QUERY) {
            Some(Value::String(name)) => {
                let database = self.database.read();
                let table = database
                    .models
                    .get(&name)
                    .map_or(name.clone(), |schema| schema.table.clone());
                Some(MemoryQuery::new(table).into_value()?)
            }
            Some(query @ Value::Object(_)) => Some(MemoryQuery::from_value(&query)?.into_value()?),
            _ => None,
        };
        Ok(query)
    }

    async fn execute_query(&self, query: &Value, _context: &Context) -> Result<Value> {
        let query = MemoryQuery::from_value(query)?;
        let records = engine::execute(&query, &self.database.read());
        debug!(table = %query.table, rows = records.len(), "Executed memory query");
        Ok(Value::Array(records))
    }

    async fn execute_count_query(&self, query: &Value, _context: &Context) -> Result<u64> {
        let query = MemoryQuery::from_value(query)?;
        Ok(engine::count(&query, &self.database.read()))
    }

    async fn apply_join_definition(
        &self,
        query: Value,
        join: &JoinDefinition,
        _context: &Context,
    ) -> Result<Option<Value>> {
        let join_type = join.effective_join_type();
        if matches!(join_type, JoinType::Right | JoinType::Full) {
            return Err(QueryError::configuration(format!(
                "Join type \"{join_type}\" is not supported by the memory adapter"
            )));
        }
        if !self.database.read().tables.contains_key(&join.join_table) {
            debug!(table = %join.join_table, "Join target table does not exist");
            return Ok(None);
        }

        let mut query = MemoryQuery::from_value(&query)?;
        if !query.has_join(&join.name) {
            query.joins.push(JoinClause {
                name: join.name.clone(),
                table: join.join_table.clone(),
                column: query.qualify(&join.column),
                join_column: qualify(&join.name, &join.join_column),
                join_type,
            });
        }
        Ok(Some(query.into_value()?))
    }

    async fn order_query_by(
        &self,
        query: Value,
        column: &str,
        direction: SortDirection,
        _context: &Context,
    ) -> Result<Value> {
        let mut query = MemoryQuery::from_value(&query)?;
        query.order.push(OrderClause {
            column: column.to_string(),
            direction,
        });
        query.into_value()
    }

    async fn paginate_query(
        &self,
        query: Value,
        offset: u64,
        limit: u64,
        _context: &Context,
    ) -> Result<Value> {
        let mut query = MemoryQuery::from_value(&query)?;
        query.offset = Some(offset);
        query.limit = Some(limit);
        query.into_value()
    }

    /// Object keys serialize sorted, so equal shapes give equal identifiers
    fn query_identifier(&self, query: &Value, _context: &Context) -> Result<String> {
        Ok(serde_json::to_string(query)?)
    }

    fn table_name(&self, model: &str, _context: &Context) -> Result<String> {
        Ok(self.database.read().model(model)?.table.clone())
    }

    fn join_definitions(
        &self,
        model: &str,
        relation: &str,
        options: &RelationOptions,
        _config: &QueryConfig,
    ) -> Result<Vec<JoinSpec>> {
        let database = self.database.read();
        let source = database.model(model)?;
        let definition = source
            .relations
            .get(relation)
            .ok_or_else(|| relation_not_found(model, relation))?;
        let target = database.model(definition.target())?;

        let join_name = options
            .join_name
            .clone()
            .unwrap_or_else(|| target.table.clone());
        let join_type = options.join_type.clone();

        let specs = match definition {
            Relation::BelongsTo { foreign_key, .. } => {
                let foreign_key = options
                    .foreign_key
                    .clone()
                    .or_else(|| foreign_key.clone())
                    .unwrap_or_else(|| foreign_key_for(target));
                vec![JoinSpec {
                    column: qualify(&source.table, &foreign_key),
                    join_column: options
                        .foreign_key_target
                        .clone()
                        .unwrap_or_else(|| qualify(&join_name, &target.id_attribute)),
                    join_table: target.table.clone(),
                    name: join_name,
                    join_type,
                    required_join: None,
                }]
            }
            Relation::HasMany { foreign_key, .. } | Relation::HasOne { foreign_key, .. } => {
                let foreign_key = options
                    .foreign_key
                    .clone()
                    .or_else(|| foreign_key.clone())
                    .unwrap_or_else(|| foreign_key_for(source));
                vec![JoinSpec {
                    column: options
                        .foreign_key_target
                        .clone()
                        .unwrap_or_else(|| qualify(&source.table, &source.id_attribute)),
                    join_column: qualify(&join_name, &foreign_key),
                    join_table: target.table.clone(),
                    name: join_name,
                    join_type,
                    required_join: None,
                }]
            }
            Relation::BelongsToMany {
                join_table,
                foreign_key,
                other_key,
                ..
            } => {
                let pivot = options
                    .join_table_name
                    .clone()
                    .or_else(|| join_table.clone())
                    .unwrap_or_else(|| pivot_table_name(source, target));
                let foreign_key = options
                    .foreign_key
                    .clone()
                    .or_else(|| foreign_key.clone())
                    .unwrap_or_else(|| foreign_key_for(source));
                let other_key = options
                    .other_key
                    .clone()
                    .or_else(|| other_key.clone())
                    .unwrap_or_else(|| foreign_key_for(target));

                vec![
                    JoinSpec {
                        name: pivot.clone(),
                        column: options
                            .foreign_key_target
                            .clone()
                            .unwrap_or_else(|| qualify(&source.table, &source.id_attribute)),
                        join_column: qualify(&pivot, &foreign_key),
                        join_table: pivot.clone(),
                        join_type: join_type.clone(),
                        required_join: None,
                    },
                    JoinSpec {
                        column: qualify(&pivot, &other_key),
                        join_column: options
                            .other_key_target
                            .clone()
                            .unwrap_or_else(|| qualify(&join_name, &target.id_attribute)),
                        join_table: target.table.clone(),
                        name: join_name,
                        join_type,
                        required_join: Some(pivot),
                    },
                ]
            }
        };
        Ok(specs)
    }

    async fn eager_load(
        &self,
        result: Value,
        relations: &[String],
        _options: &Value,
        context: &Context,
    ) -> Result<Value> {
        let query = context
            .get(state_keys::QUERY)
            .ok_or_else(|| QueryError::adapter_contract("Eager loading requires a query"))?;
        let table = MemoryQuery::from_value(&query)?.table;

        let database = self.database.read();
        let model = database
            .model_for_table(&table)
            .map(|(name, _)| name.to_string())
            .ok_or_else(|| {
                QueryError::configuration(format!("No model is registered for table \"{table}\""))
            })?;

        let mut result = result;
        for relation in relations {
            let path: Vec<&str> = relation.split('.').collect();
            if result.is_object() {
                load_path(&database, &model, std::slice::from_mut(&mut result), &path)?;
            } else if let Value::Array(records) = &mut result {
                load_path(&database, &model, records, &path)?;
            }
        }
        Ok(result)
    }
}

impl std::fmt::Debug for MemoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let database = self.database.read();
        f.debug_struct("MemoryAdapter")
            .field("tables", &database.tables.keys().collect::<Vec<_>>())
            .field("models", &database.models.keys().collect::<Vec<_>>())
            .finish()
    }
}
