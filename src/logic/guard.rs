use futures::future::join_all;
use itertools::Itertools;
use serde_json::{Map, Value};

use crate::error::{CrudError, CrudResult};
use crate::model::ModelHandle;
use crate::store::pending::FindOptions;
use crate::store::traits::DocumentStore;

/// Reject a create when a document matching `check` already exists.
///
/// An empty check means no uniqueness was requested: no lookup is
/// performed and the guard always passes. A collision names the
/// check's field names, never its values.
///
/// Best-effort only: the lookup and the subsequent insert are separate
/// steps, so two concurrent writers can both pass before either
/// commits. True uniqueness needs a store-level unique index.
pub async fn ensure_absent<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    check: &Map<String, Value>,
) -> CrudResult<()> {
    if check.is_empty() {
        return Ok(());
    }
    let options = FindOptions {
        filter: check.clone(),
        ..FindOptions::default()
    };
    if store.find_one(&model.collection, &options).await?.is_some() {
        return Err(CrudError::Conflict(format!(
            "the data for \"{}\" already exists in the database",
            check.keys().join(", ")
        )));
    }
    Ok(())
}

/// Batch form of [`ensure_absent`]: every check is fanned out
/// concurrently and the whole group awaited before any insert. One
/// collision fails the whole batch; with several simultaneous
/// collisions the first observed one is reported.
pub async fn ensure_all_absent<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    checks: &[Map<String, Value>],
) -> CrudResult<()> {
    let lookups = checks.iter().map(|check| ensure_absent(store, model, check));
    join_all(lookups)
        .await
        .into_iter()
        .collect::<CrudResult<Vec<()>>>()?;
    Ok(())
}
