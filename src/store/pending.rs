use serde_json::{Map, Value};

use crate::model::{Document, PopulateField, SecondLayer};
use crate::store::traits::DocumentStore;

/// Configuration accumulated on a pending operation before it is
/// handed to the store driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub filter: Map<String, Value>,
    pub projection: Option<String>,
    pub sort: Option<String>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub populate: Vec<AppliedPopulate>,
}

/// A populate entry in the form the store consumes: resolved path,
/// space-joined projection for the expanded document, and an untouched
/// second-level descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedPopulate {
    pub path: String,
    pub select: Option<String>,
    pub populate: Option<SecondLayer>,
}

impl AppliedPopulate {
    /// Translate a caller-facing spec entry. Entries with an empty or
    /// missing `path` translate to `None` and are dropped by callers.
    pub fn from_field(field: &PopulateField) -> Option<Self> {
        let path = field.path.as_deref().filter(|p| !p.is_empty())?.to_string();
        Some(Self {
            path,
            select: field.fields.as_ref().map(|fields| fields.join(" ")),
            populate: field.second_layer_populate.clone(),
        })
    }
}

/// Seam shared by the two pending-operation kinds so relation
/// expansion can be applied to either.
pub trait Populatable {
    fn populate(self, spec: AppliedPopulate) -> Self;
}

/// A not-yet-executed multi-document find. Each modifier consumes and
/// returns the builder; the builder is exclusively owned by one call
/// and discarded after execution.
#[derive(Debug, Clone)]
pub struct PendingFind {
    collection: String,
    options: FindOptions,
}

impl PendingFind {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            options: FindOptions::default(),
        }
    }

    /// Merge constraints into the find condition. Later entries win on
    /// key collision, matching the store's condition-merging behavior.
    pub fn filter(mut self, filter: Map<String, Value>) -> Self {
        self.options.filter.extend(filter);
        self
    }

    pub fn select(mut self, spec: &str) -> Self {
        self.options.projection = Some(spec.to_string());
        self
    }

    pub fn sort(mut self, spec: &str) -> Self {
        self.options.sort = Some(spec.to_string());
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.options.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.options.limit = Some(n);
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    pub async fn exec<S: DocumentStore>(self, store: &S) -> anyhow::Result<Vec<Document>> {
        store.find(&self.collection, &self.options).await
    }
}

impl Populatable for PendingFind {
    fn populate(mut self, spec: AppliedPopulate) -> Self {
        self.options.populate.push(spec);
        self
    }
}

/// A not-yet-executed single-document find.
#[derive(Debug, Clone)]
pub struct PendingFindOne {
    collection: String,
    options: FindOptions,
}

impl PendingFindOne {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            options: FindOptions::default(),
        }
    }

    pub fn filter(mut self, filter: Map<String, Value>) -> Self {
        self.options.filter.extend(filter);
        self
    }

    pub fn select(mut self, spec: &str) -> Self {
        self.options.projection = Some(spec.to_string());
        self
    }

    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    pub async fn exec<S: DocumentStore>(self, store: &S) -> anyhow::Result<Option<Document>> {
        store.find_one(&self.collection, &self.options).await
    }
}

impl Populatable for PendingFindOne {
    fn populate(mut self, spec: AppliedPopulate) -> Self {
        self.options.populate.push(spec);
        self
    }
}
