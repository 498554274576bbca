use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{FormError, Result};
use crate::schema::{lookup, remove_path, set_path};

/// Live field values of one form, keyed by top-level field name.
///
/// Nested fields are addressed with dotted paths (`personalInfo.email`,
/// `beneficiaries.0.percentage`). Only the owning [`FormInstance`] writes to
/// it; everyone else sees fields through snapshots.
///
/// [`FormInstance`]: crate::form::FormInstance
#[derive(Clone, Debug, Default)]
pub struct FieldStore {
    data: Arc<DashMap<String, Value>>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` at `path`. Array indices may update an entry or append
    /// one; anything further out is refused and nothing changes.
    pub fn set(&self, path: &str, value: Value) -> Result<()> {
        let Some((head, rest)) = path.split_once('.') else {
            self.data.insert(path.to_string(), value);
            return Ok(());
        };
        let mut entry = self.data.get(head).map(|v| v.clone()).unwrap_or(Value::Null);
        if !set_path(&mut entry, rest, value) {
            return Err(FormError::InvalidFieldPath(path.to_string()));
        }
        self.data.insert(head.to_string(), entry);
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            None => self.data.get(path).map(|v| v.clone()),
            Some((head, rest)) => self
                .data
                .get(head)
                .and_then(|entry| lookup(entry.value(), rest).cloned()),
        }
    }

    pub fn remove(&self, path: &str) -> Option<Value> {
        match path.split_once('.') {
            None => self.data.remove(path).map(|(_, v)| v),
            Some((head, rest)) => self
                .data
                .get_mut(head)
                .and_then(|mut entry| remove_path(entry.value_mut(), rest)),
        }
    }

    /// Replace every field with the top-level entries of `document`.
    pub fn replace(&self, document: Value) {
        self.data.clear();
        self.merge(document);
    }

    /// Overlay `document` onto the current fields. Nested objects are merged
    /// key by key; anything else replaces the existing value.
    pub fn merge(&self, document: Value) {
        let Value::Object(fields) = document else {
            return;
        };
        for (key, value) in fields {
            let mut entry = self.data.entry(key).or_insert(Value::Null);
            merge_value(entry.value_mut(), value);
        }
    }

    pub fn to_document(&self) -> Value {
        let fields: Map<String, Value> = self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        Value::Object(fields)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

fn merge_value(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                merge_value(target.entry(key).or_insert(Value::Null), value);
            }
        }
        (target, incoming) => *target = incoming,
    }
}
