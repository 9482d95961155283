//! Query shape and evaluation for the in-memory adapter.
//!
//! A [`MemoryQuery`] is serialized into the context as a plain JSON object
//! (`{table, joins, filters, order, offset, limit}`). Evaluation flattens every
//! row into qualified `alias.column` keys, applies joins, filters, ordering and
//! the pagination window, then projects the base table's columns back out.

use super::schema::{MemoryDatabase, Record};
use crate::error::{QueryError, Result};
use crate::query::{JoinType, SortDirection};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryQuery {
    pub table: String,
    #[serde(default)]
    pub joins: Vec<JoinClause>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Vec<OrderClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    /// Alias the joined rows are qualified with
    pub name: String,
    pub table: String,
    pub column: String,
    pub join_column: String,
    pub join_type: JoinType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    #[default]
    Eq,
    Ne,
    In,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    #[serde(default)]
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderClause {
    pub column: String,
    pub direction: SortDirection,
}

impl MemoryQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn from_value(query: &Value) -> Result<Self> {
        serde_json::from_value(query.clone()).map_err(|e| {
            QueryError::adapter_contract(format!("Query is not a memory adapter query: {e}"))
        })
    }

    pub fn into_value(self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Qualify a bare column with the base table
    pub fn qualify(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{}", self.table, column)
        }
    }

    pub fn has_join(&self, name: &str) -> bool {
        self.joins.iter().any(|join| join.name == name)
    }
}

/// Add an equality filter to a serialized query
pub fn where_eq(query: Value, column: &str, value: impl Into<Value>) -> Result<Value> {
    let mut query = MemoryQuery::from_value(&query)?;
    query.filters.push(Filter {
        column: column.to_string(),
        op: FilterOp::Eq,
        value: value.into(),
    });
    query.into_value()
}

type Row = Map<String, Value>;

fn qualify_record(alias: &str, record: &Record) -> Row {
    record
        .iter()
        .map(|(column, value)| (format!("{alias}.{column}"), value.clone()))
        .collect()
}

fn merge_row(left: &Row, right: Row) -> Row {
    let mut row = left.clone();
    row.extend(right);
    row
}

fn join_rows(rows: Vec<Row>, join: &JoinClause, database: &MemoryDatabase) -> Vec<Row> {
    let targets: Vec<Row> = database
        .rows(&join.table)
        .iter()
        .map(|record| qualify_record(&join.name, record))
        .collect();

    let mut joined = Vec::new();
    for row in rows {
        if join.join_type == JoinType::Cross {
            joined.extend(targets.iter().cloned().map(|target| merge_row(&row, target)));
            continue;
        }

        let key = row.get(&join.column).filter(|value| !value.is_null());
        let matches: Vec<&Row> = match key {
            Some(key) => targets
                .iter()
                .filter(|target| target.get(&join.join_column) == Some(key))
                .collect(),
            None => Vec::new(),
        };

        if matches.is_empty() {
            if join.join_type == JoinType::Left {
                joined.push(row);
            }
        } else {
            joined.extend(matches.into_iter().map(|target| merge_row(&row, target.clone())));
        }
    }
    joined
}

fn matches_filter(row: &Row, filter: &Filter, query: &MemoryQuery) -> bool {
    let actual = row.get(&query.qualify(&filter.column)).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => actual == &filter.value,
        FilterOp::Ne => actual != &filter.value,
        FilterOp::In => filter
            .value
            .as_array()
            .is_some_and(|values| values.contains(actual)),
    }
}

/// Total order over JSON scalars: nulls first, then booleans, numbers, strings
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => rank(left).cmp(&rank(right)),
    }
}

fn filtered_rows(query: &MemoryQuery, database: &MemoryDatabase) -> Vec<Row> {
    let mut rows: Vec<Row> = database
        .rows(&query.table)
        .iter()
        .map(|record| qualify_record(&query.table, record))
        .collect();

    for join in &query.joins {
        rows = join_rows(rows, join, database);
    }

    rows.retain(|row| query.filters.iter().all(|filter| matches_filter(row, filter, query)));
    rows
}

fn project(query: &MemoryQuery, row: Row) -> Value {
    let prefix = format!("{}.", query.table);
    let record: Map<String, Value> = row
        .into_iter()
        .filter_map(|(column, value)| {
            column
                .strip_prefix(&prefix)
                .map(|column| (column.to_string(), value))
        })
        .collect();
    Value::Object(record)
}

/// Run the query and return the base table's records
pub fn execute(query: &MemoryQuery, database: &MemoryDatabase) -> Vec<Value> {
    let mut rows = filtered_rows(query, database);

    if !query.order.is_empty() {
        let columns: Vec<(String, SortDirection)> = query
            .order
            .iter()
            .map(|clause| (query.qualify(&clause.column), clause.direction))
            .collect();
        rows.sort_by(|a, b| {
            columns
                .iter()
                .map(|(column, direction)| {
                    let ordering = compare_values(
                        a.get(column).unwrap_or(&Value::Null),
                        b.get(column).unwrap_or(&Value::Null),
                    );
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
    }

    let offset = query.offset.unwrap_or(0) as usize;
    let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);

    rows.into_iter()
        .skip(offset)
        .take(limit)
        .map(|row| project(query, row))
        .collect()
}

/// Rows matched by joins and filters, ignoring ordering and the window
pub fn count(query: &MemoryQuery, database: &MemoryDatabase) -> u64 {
    filtered_rows(query, database).len() as u64
}
