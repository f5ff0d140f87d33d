use anyhow::Result;
use serde_json::Value;

use crate::model::Document;
use crate::store::pending::FindOptions;

/// Driver contract for the underlying document store.
///
/// The service layer never talks to a concrete store directly; pending
/// find configuration travels in [`FindOptions`], mutations take plain
/// JSON filters and documents. Implementations decide how projections,
/// sorts and populates are honored.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_one(&self, collection: &str, options: &FindOptions) -> Result<Option<Document>>;

    async fn find(&self, collection: &str, options: &FindOptions) -> Result<Vec<Document>>;

    /// Insert a single document and return it as stored (with the
    /// store-assigned id and bookkeeping fields).
    async fn insert_one(&self, collection: &str, data: Document) -> Result<Document>;

    async fn insert_many(&self, collection: &str, data: Vec<Document>) -> Result<Vec<Document>>;

    /// Apply `patch` to the first document matching `filter` and return
    /// the updated document, projected when a projection is given.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Value,
        patch: &Value,
        projection: Option<&str>,
    ) -> Result<Option<Document>>;

    /// Returns the number of documents removed.
    async fn delete_one(&self, collection: &str, filter: &Value) -> Result<u64>;

    async fn delete_many(&self, collection: &str, filter: &Value) -> Result<u64>;
}
