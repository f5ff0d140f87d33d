use std::cmp::Ordering;
use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::debug;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::model::{
    Document, SecondLayer, CREATED_AT_FIELD, ID_FIELD, REVISION_FIELD, UPDATED_AT_FIELD,
};
use crate::store::pending::{AppliedPopulate, FindOptions};
use crate::store::traits::DocumentStore;

#[derive(Default)]
struct Inner {
    collections: HashMap<String, Vec<Document>>,
    /// (collection, path) -> referenced collection, the moral
    /// equivalent of schema `ref` declarations.
    refs: HashMap<(String, String), String>,
    /// collection -> fields with a unique index.
    unique: HashMap<String, Vec<String>>,
}

/// In-memory reference implementation of [`DocumentStore`].
///
/// Supports the full driver surface: `$gte/$gt/$lte/$lt` comparison
/// operators with string/number coercion, `-field` sort and projection
/// conventions, skip/limit, reference population (one or two levels)
/// and unique indexes that fail violating inserts with an
/// `E11000 duplicate key` style message.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `collection.path` holds ids referencing documents
    /// in `target`. Populate requests for unregistered paths are
    /// silently left unexpanded.
    pub fn register_reference(&self, collection: &str, path: &str, target: &str) {
        self.inner
            .write()
            .refs
            .insert((collection.to_string(), path.to_string()), target.to_string());
    }

    /// Enforce store-level uniqueness on `field`. This is the real
    /// guarantee behind the service layer's best-effort existence
    /// guard, which can race under concurrent writers.
    pub fn create_unique_index(&self, collection: &str, field: &str) {
        self.inner
            .write()
            .unique
            .entry(collection.to_string())
            .or_default()
            .push(field.to_string());
    }

    /// Number of documents currently stored in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.inner
            .read()
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    fn insert_prepared(inner: &mut Inner, collection: &str, data: Document) -> Result<Document> {
        let mut doc = match data {
            Value::Object(map) => map,
            other => return Err(anyhow!("document must be a JSON object, got {}", other)),
        };

        if let Some(fields) = inner.unique.get(collection) {
            let existing = inner.collections.get(collection);
            for field in fields {
                let Some(candidate) = doc.get(field) else {
                    continue;
                };
                let collides = existing.map_or(false, |docs| {
                    docs.iter()
                        .any(|d| d.get(field).map_or(false, |v| values_equal(v, candidate)))
                });
                if collides {
                    return Err(anyhow!(
                        "E11000 duplicate key error collection: {} index: {}_1",
                        collection,
                        field
                    ));
                }
            }
        }

        let now = Utc::now().to_rfc3339();
        doc.entry(ID_FIELD.to_string())
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        doc.entry(CREATED_AT_FIELD.to_string())
            .or_insert_with(|| Value::String(now.clone()));
        doc.insert(UPDATED_AT_FIELD.to_string(), Value::String(now));
        doc.insert(REVISION_FIELD.to_string(), Value::from(1u64));

        let stored = Value::Object(doc);
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, options: &FindOptions) -> Result<Option<Document>> {
        let inner = self.inner.read();
        let Some(docs) = inner.collections.get(collection) else {
            return Ok(None);
        };
        let mut found = match docs.iter().find(|d| matches_filter(d, &options.filter)) {
            Some(doc) => doc.clone(),
            None => return Ok(None),
        };
        apply_populate(&inner, collection, &mut found, &options.populate);
        if let Some(spec) = &options.projection {
            found = project(found, spec);
        }
        Ok(Some(found))
    }

    async fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Document>> {
        let inner = self.inner.read();
        let mut out: Vec<Document> = inner
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| matches_filter(d, &options.filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(spec) = &options.sort {
            sort_documents(&mut out, spec);
        }
        if let Some(skip) = options.skip {
            out.drain(..out.len().min(skip as usize));
        }
        if let Some(limit) = options.limit {
            out.truncate(limit as usize);
        }
        for doc in &mut out {
            apply_populate(&inner, collection, doc, &options.populate);
        }
        if let Some(spec) = &options.projection {
            out = out.into_iter().map(|doc| project(doc, spec)).collect();
        }
        debug!("find on {} returned {} document(s)", collection, out.len());
        Ok(out)
    }

    async fn insert_one(&self, collection: &str, data: Document) -> Result<Document> {
        let mut inner = self.inner.write();
        Self::insert_prepared(&mut inner, collection, data)
    }

    async fn insert_many(&self, collection: &str, data: Vec<Document>) -> Result<Vec<Document>> {
        let mut inner = self.inner.write();
        // Ordered bulk insert: a failing document aborts the remainder,
        // documents before it stay inserted.
        data.into_iter()
            .map(|doc| Self::insert_prepared(&mut inner, collection, doc))
            .collect()
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        patch: &Value,
        projection: Option<&str>,
    ) -> Result<Option<Document>> {
        let filter = filter.as_object().cloned().unwrap_or_default();
        let patch = patch
            .as_object()
            .ok_or_else(|| anyhow!("update patch must be a JSON object"))?;

        let mut inner = self.inner.write();
        let Some(docs) = inner.collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(doc) = docs.iter_mut().find(|d| matches_filter(d, &filter)) else {
            return Ok(None);
        };
        if let Value::Object(fields) = doc {
            for (key, value) in patch {
                if key == ID_FIELD {
                    continue;
                }
                fields.insert(key.clone(), value.clone());
            }
            let rev = fields
                .get(REVISION_FIELD)
                .and_then(Value::as_u64)
                .unwrap_or(0);
            fields.insert(REVISION_FIELD.to_string(), Value::from(rev + 1));
            fields.insert(
                UPDATED_AT_FIELD.to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
        let updated = doc.clone();
        Ok(Some(match projection {
            Some(spec) => project(updated, spec),
            None => updated,
        }))
    }

    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<u64> {
        let filter = filter.as_object().cloned().unwrap_or_default();
        let mut inner = self.inner.write();
        let Some(docs) = inner.collections.get_mut(collection) else {
            return Ok(0);
        };
        match docs.iter().position(|d| matches_filter(d, &filter)) {
            Some(index) => {
                docs.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64> {
        let filter = filter.as_object().cloned().unwrap_or_default();
        let mut inner = self.inner.write();
        let Some(docs) = inner.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !matches_filter(d, &filter));
        Ok((before - docs.len()) as u64)
    }
}

/// Numeric view of a value; strings parse when they look like numbers,
/// so `"5"` and `5` compare equal the way store drivers coerce them.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    matches!((numeric(a), numeric(b)), (Some(x), Some(y)) if x == y)
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (numeric(a), numeric(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Match one field against a constraint. Operator objects compare with
/// the `$` operators; plain objects recurse field-by-field, so operator
/// objects nested below the top level (`{"stats": {"views": {"$gt":
/// "100"}}}`) still apply. Recursive object matching is subset
/// matching: extra fields on the stored document do not disqualify it.
fn matches_constraint(actual: Option<&Value>, constraint: &Value) -> bool {
    match constraint {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            let Some(actual) = actual else {
                return false;
            };
            ops.iter().all(|(op, rhs)| match op.as_str() {
                "$gte" => compare_values(actual, rhs)
                    .map_or(false, |ord| ord != Ordering::Less),
                "$gt" => compare_values(actual, rhs)
                    .map_or(false, |ord| ord == Ordering::Greater),
                "$lte" => compare_values(actual, rhs)
                    .map_or(false, |ord| ord != Ordering::Greater),
                "$lt" => compare_values(actual, rhs)
                    .map_or(false, |ord| ord == Ordering::Less),
                "$ne" => !values_equal(actual, rhs),
                _ => false,
            })
        }
        Value::Object(nested) => match actual {
            Some(Value::Object(fields)) => nested
                .iter()
                .all(|(key, sub)| matches_constraint(fields.get(key), sub)),
            _ => false,
        },
        expected => actual.map_or(false, |actual| values_equal(actual, expected)),
    }
}

fn matches_filter(doc: &Document, filter: &Map<String, Value>) -> bool {
    filter
        .iter()
        .all(|(key, constraint)| matches_constraint(doc.get(key), constraint))
}

/// Sort on a space-separated field list, `-` prefix meaning
/// descending. Stable; documents missing a field sort first.
fn sort_documents(docs: &mut [Document], spec: &str) {
    let keys: Vec<(&str, bool)> = spec
        .split_whitespace()
        .map(|token| match token.strip_prefix('-') {
            Some(field) => (field, true),
            None => (token, false),
        })
        .collect();

    docs.sort_by(|a, b| {
        for (field, descending) in &keys {
            let ord = match (a.get(*field), b.get(*field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
            };
            if ord != Ordering::Equal {
                return if *descending { ord.reverse() } else { ord };
            }
        }
        Ordering::Equal
    });
}

/// Apply a space-separated projection spec. Any bare token switches to
/// inclusion mode, keeping exactly the listed fields; an all-excluded
/// spec drops the listed fields and keeps the rest.
fn project(doc: Document, spec: &str) -> Document {
    let tokens: Vec<&str> = spec.split_whitespace().collect();
    if tokens.is_empty() {
        return doc;
    }
    let fields = match doc {
        Value::Object(fields) => fields,
        other => return other,
    };

    let includes: Vec<&str> = tokens
        .iter()
        .filter(|t| !t.starts_with('-'))
        .copied()
        .collect();

    let projected: Map<String, Value> = if includes.is_empty() {
        let excluded: Vec<&str> = tokens.iter().map(|t| &t[1..]).collect();
        fields
            .into_iter()
            .filter(|(key, _)| !excluded.contains(&key.as_str()))
            .collect()
    } else {
        fields
            .into_iter()
            .filter(|(key, _)| includes.contains(&key.as_str()))
            .collect()
    };
    Value::Object(projected)
}

fn second_layer_to_applied(second: &SecondLayer) -> Option<AppliedPopulate> {
    match second {
        SecondLayer::Path(path) if path.is_empty() => None,
        SecondLayer::Path(path) => Some(AppliedPopulate {
            path: path.clone(),
            select: None,
            populate: None,
        }),
        SecondLayer::Spec(field) => AppliedPopulate::from_field(field),
    }
}

/// Resolve one referenced document by id, applying the entry's own
/// projection and optional second-level expansion.
fn resolve_reference(
    inner: &Inner,
    target: &str,
    id: &Value,
    entry: &AppliedPopulate,
) -> Option<Document> {
    let docs = inner.collections.get(target)?;
    let mut doc = docs
        .iter()
        .find(|d| d.get(ID_FIELD).map_or(false, |v| values_equal(v, id)))?
        .clone();

    if let Some(second) = entry.populate.as_ref().and_then(second_layer_to_applied) {
        apply_populate(inner, target, &mut doc, std::slice::from_ref(&second));
    }
    if let Some(spec) = &entry.select {
        doc = project(doc, spec);
    }
    Some(doc)
}

fn apply_populate(inner: &Inner, collection: &str, doc: &mut Document, populate: &[AppliedPopulate]) {
    for entry in populate {
        let key = (collection.to_string(), entry.path.clone());
        let Some(target) = inner.refs.get(&key) else {
            continue;
        };
        let Some(current) = doc.get(&entry.path).cloned() else {
            continue;
        };
        let expanded = match current {
            Value::Array(ids) => Value::Array(
                ids.iter()
                    .filter_map(|id| resolve_reference(inner, target, id, entry))
                    .collect(),
            ),
            id => match resolve_reference(inner, target, &id, entry) {
                Some(referenced) => referenced,
                None => continue,
            },
        };
        if let Value::Object(fields) = doc {
            fields.insert(entry.path.clone(), expanded);
        }
    }
}
