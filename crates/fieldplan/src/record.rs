//! Result rows and their decoding into models.
//!
//! Rows reach the decoder from the database or from the result cache in the
//! same [`Record`] shape, so both paths produce identical models.

use crate::colmap::{FieldColumnMap, StructColumnMap};
use crate::error::{OrmError, OrmResult};
use crate::meta::Model;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// One result row: `(alias, value)` pairs in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alias: impl Into<String>, value: Value) {
        self.columns.push((alias.into(), value));
    }

    /// Builder-style [`Record::push`].
    pub fn with(mut self, alias: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(alias, value.into());
        self
    }

    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == alias)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Rebuild models from rows by walking the column map.
///
/// Rows sharing the root primary key collapse into one model; related rows
/// reached through a has-many relation are collected into its `Vec`.
pub fn decode<M: Model>(records: &[Record], colmap: &StructColumnMap) -> OrmResult<Vec<M>> {
    let selected: Vec<&FieldColumnMap> = colmap.iter().filter(|entry| entry.is_selected()).collect();
    let keys: Vec<&str> = selected
        .iter()
        .filter(|entry| entry.parent().is_none() && entry.column().primary_key)
        .map(|entry| entry.alias())
        .collect();
    let many_paths = many_paths(&selected);
    let root_default = M::table_def().default_value;

    let mut groups: Vec<Value> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for (row_idx, record) in records.iter().enumerate() {
        let row = assemble(record, &selected, &many_paths, root_default());
        let group_key = if keys.is_empty() {
            format!("#{row_idx}")
        } else {
            let values: Vec<&Value> = keys
                .iter()
                .map(|alias| record.get(alias).unwrap_or(&Value::Null))
                .collect();
            serde_json::to_string(&values)?
        };
        match index.get(&group_key) {
            Some(&idx) => merge_children(&mut groups[idx], row, &many_paths),
            None => {
                index.insert(group_key, groups.len());
                groups.push(row);
            }
        }
    }

    groups
        .into_iter()
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|err| OrmError::decode(M::table_def().name, err.to_string()))
        })
        .collect()
}

/// Field-name paths of every has-many segment, outermost first.
fn many_paths(selected: &[&FieldColumnMap]) -> Vec<Vec<&'static str>> {
    let mut paths: Vec<Vec<&'static str>> = Vec::new();
    for entry in selected {
        let segments = entry.path();
        for (idx, segment) in segments.iter().enumerate() {
            if !segment.many {
                continue;
            }
            let path: Vec<&'static str> = segments[..=idx].iter().map(|seg| seg.name).collect();
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths.sort_by_key(Vec::len);
    paths
}

/// Build the value of a single row, with has-many segments as one-element
/// arrays (or empty arrays when the related row is all NULL).
fn assemble(
    record: &Record,
    selected: &[&FieldColumnMap],
    many_paths: &[Vec<&'static str>],
    mut row: Value,
) -> Value {
    let mut filled: Vec<Vec<&'static str>> = Vec::new();
    for entry in selected {
        let Some(value) = record.get(entry.alias()) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        let segments = entry.path();
        let Some((last, parents)) = segments.split_last() else {
            continue;
        };
        let mut target = &mut row;
        let mut walked: Vec<&'static str> = Vec::new();
        for segment in parents {
            walked.push(segment.name);
            let object = as_object(target);
            let slot = object.entry(segment.name).or_insert(Value::Null);
            if !slot.is_object() {
                *slot = segment
                    .default
                    .map(|default| default())
                    .filter(Value::is_object)
                    .unwrap_or_else(|| Value::Object(Map::new()));
            }
            if segment.many && !filled.contains(&walked) {
                filled.push(walked.clone());
            }
            target = slot;
        }
        as_object(target).insert(last.name.to_string(), value.clone());
    }

    // Linked columns never create a related object on their own; a missing
    // left-joined row stays `None` or an empty `Vec`.
    for entry in selected {
        let Some(value) = record.get(entry.alias()).filter(|value| !value.is_null()) else {
            continue;
        };
        for mirror in entry.mirrors() {
            let Some((last, parents)) = mirror.split_last() else {
                continue;
            };
            let names: Vec<&str> = parents.iter().map(|segment| segment.name).collect();
            if let Some(Value::Object(object)) = lookup_mut(&mut row, &names) {
                object.insert(last.name.to_string(), value.clone());
            }
        }
    }

    // Innermost first, so outer arrays wrap already converted children.
    for path in many_paths.iter().rev() {
        if let Some(slot) = lookup_mut(&mut row, path) {
            *slot = if filled.contains(path) && slot.is_object() {
                Value::Array(vec![slot.take()])
            } else {
                Value::Array(Vec::new())
            };
        }
    }
    row
}

/// Append the has-many children of `row` to `group`, skipping duplicates.
fn merge_children(group: &mut Value, mut row: Value, many_paths: &[Vec<&'static str>]) {
    for path in many_paths {
        // Nested has-many arrays travel with their outer element.
        if many_paths
            .iter()
            .any(|outer| outer.len() < path.len() && path.starts_with(outer))
        {
            continue;
        }
        let Some(Value::Array(children)) = lookup_mut(&mut row, path).map(Value::take) else {
            continue;
        };
        match lookup_mut(group, path) {
            Some(Value::Array(existing)) => {
                for child in children {
                    if !existing.contains(&child) {
                        existing.push(child);
                    }
                }
            }
            _ => {
                if let Some((last, parents)) = path.split_last() {
                    if let Some(parent) = lookup_mut(group, parents) {
                        as_object(parent).insert(last.to_string(), Value::Array(children));
                    }
                }
            }
        }
    }
}

fn as_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

fn lookup_mut<'v>(value: &'v mut Value, path: &[&str]) -> Option<&'v mut Value> {
    path.iter()
        .try_fold(value, |current, name| current.as_object_mut()?.get_mut(*name))
}
