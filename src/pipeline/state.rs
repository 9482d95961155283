//! # Dotted-Path State Store
//!
//! The state tree is the only channel through which stages communicate.
//! Paths such as `"pagination.total"` address nested object fields; writing a
//! path creates any missing parent objects.

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct StateTree {
    root: Value,
}

impl Default for StateTree {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTree {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Read the value at `path`; the empty path yields the whole tree
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.root, path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Write `value` at `path`, replacing non-object intermediates
    pub fn set(&mut self, path: &str, value: Value) {
        if path.is_empty() {
            self.root = value;
            return;
        }

        let mut segments = path.split('.').peekable();
        let mut current = &mut self.root;
        while let Some(segment) = segments.next() {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let Value::Object(map) = current else {
                unreachable!("intermediate was just replaced by an object");
            };

            if segments.peek().is_none() {
                map.insert(segment.to_string(), value);
                return;
            }
            current = map
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
    }

    /// Remove and return the value at `path`
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let (parent, leaf) = match path.rsplit_once('.') {
            Some((parent, leaf)) => (parent, leaf),
            None => ("", path),
        };
        let parent = if parent.is_empty() {
            Some(&mut self.root)
        } else {
            lookup_mut(&mut self.root, parent)
        };
        parent?.as_object_mut()?.remove(leaf)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }
}

/// Resolve a dotted path inside an arbitrary value
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.')
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn lookup_mut<'a>(value: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(value, |current, segment| current.as_object_mut()?.get_mut(segment))
}

/// Shallow-merge `overrides` into `target`; later keys win
pub fn merge_objects(target: &mut Map<String, Value>, overrides: &Value) {
    if let Value::Object(overrides) = overrides {
        for (key, value) in overrides {
            target.insert(key.clone(), value.clone());
        }
    }
}
