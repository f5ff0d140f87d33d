use futures::future::join_all;
use log::debug;
use serde_json::{Map, Value};

use crate::error::{CrudError, CrudResult};
use crate::logic::expand::populate_model;
use crate::logic::guard::{ensure_absent, ensure_all_absent};
use crate::logic::query::Queries;
use crate::model::{CrudResponse, Document, ModelHandle, PopulateArg, QueryBag, ID_FIELD};
use crate::store::pending::{PendingFind, PendingFindOne};
use crate::store::traits::DocumentStore;

// The service layer is a stateless module of free functions; nothing
// persists across calls, every pending find is owned by one call.

fn id_filter(id: &Value) -> Map<String, Value> {
    let mut filter = Map::new();
    filter.insert(ID_FIELD.to_string(), id.clone());
    filter
}

async fn reload_by_id<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    id: &Value,
) -> CrudResult<Option<Document>> {
    let mut pending = PendingFindOne::new(&model.collection).filter(id_filter(id));
    if let Some(projection) = model.projection() {
        pending = pending.select(&projection);
    }
    Ok(pending.exec(store).await?)
}

/// Create one document after an optional uniqueness check, then reload
/// it with the model's field selection applied.
pub async fn create<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    data: Document,
    check: Map<String, Value>,
) -> CrudResult<CrudResponse<Document>> {
    ensure_absent(store, model, &check).await?;

    let created = store.insert_one(&model.collection, data).await?;
    let id = created.get(ID_FIELD).cloned().unwrap_or(Value::Null);
    let reloaded = reload_by_id(store, model, &id).await?.ok_or_else(|| {
        CrudError::NotCreated(format!("{} is not successfully created", model.collection))
    })?;

    debug!("created one document in {}", model.collection);
    Ok(CrudResponse::ok("Successfully created", reloaded))
}

/// Bulk create. All uniqueness checks run concurrently and must pass
/// before the single bulk insert; one collision fails the whole batch
/// with no partial commit. Reloads fan out too, but the output array
/// preserves input order because each reload is keyed by its own id.
pub async fn create_many<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    data: Vec<Document>,
    checks: Vec<Map<String, Value>>,
) -> CrudResult<CrudResponse<Vec<Document>>> {
    ensure_all_absent(store, model, &checks).await?;

    let created = store.insert_many(&model.collection, data).await?;
    if created.is_empty() {
        return Err(CrudError::NotCreated(format!(
            "{} is not successfully created",
            model.collection
        )));
    }

    let reloads = created.iter().map(|doc| {
        let id = doc.get(ID_FIELD).cloned().unwrap_or(Value::Null);
        async move { reload_by_id(store, model, &id).await }
    });
    let reloaded = join_all(reloads)
        .await
        .into_iter()
        .map(|reloaded| {
            reloaded?.ok_or_else(|| {
                CrudError::NotCreated(format!(
                    "{} is not successfully created",
                    model.collection
                ))
            })
        })
        .collect::<CrudResult<Vec<Document>>>()?;

    debug!(
        "created {} document(s) in {}",
        reloaded.len(),
        model.collection
    );
    Ok(CrudResponse::ok("Successfully created", reloaded))
}

/// Update the first document matching `filter`, projecting the result
/// only when the model carries a field selection.
pub async fn update<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    filter: &Value,
    patch: &Value,
) -> CrudResult<CrudResponse<Document>> {
    let projection = model.projection();
    let updated = store
        .find_one_and_update(&model.collection, filter, patch, projection.as_deref())
        .await?
        .ok_or_else(|| {
            CrudError::NotUpdated(format!("{} not updated successfully", model.collection))
        })?;
    Ok(CrudResponse::ok("Successfully updated", updated))
}

/// Fetch a single document with projection and relation expansion.
///
/// The resolved document is what gets checked: a filter matching
/// nothing raises `NotFound` rather than returning an empty success.
pub async fn get_one<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    filter: Map<String, Value>,
    populate: Option<PopulateArg>,
) -> CrudResult<CrudResponse<Document>> {
    let mut pending = PendingFindOne::new(&model.collection).filter(filter);
    if let Some(projection) = model.projection() {
        pending = pending.select(&projection);
    }
    let pending = populate_model(pending, populate);
    let fetched = pending.exec(store).await?.ok_or_else(|| {
        CrudError::NotFound(format!(
            "{} is not successfully fetched",
            model.collection
        ))
    })?;
    Ok(CrudResponse::ok("Fetched successfully", fetched))
}

/// Fetch many documents: optional category filter, the model's
/// projection, relation expansion, then the full query pipeline
/// (filter, fields, pagination, sort) from the request's query bag.
///
/// `doc_length` counts fetched result batches, not documents; the
/// single-model path always yields 1.
pub async fn get_many<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    query: QueryBag,
    populate: Option<PopulateArg>,
    category_filter: Option<Map<String, Value>>,
) -> CrudResult<CrudResponse<Vec<Document>>> {
    let mut pending = PendingFind::new(&model.collection);
    if let Some(filter) = category_filter {
        pending = pending.filter(filter);
    }
    if let Some(projection) = model.projection() {
        pending = pending.select(&projection);
    }
    let pending = populate_model(pending, populate);

    let configured = Queries::new(pending, query)
        .filter()?
        .limit_fields()
        .paginate()
        .sort()
        .into_query();

    let mut batches: Vec<Vec<Document>> = Vec::new();
    let batch = configured.exec(store).await.map_err(|err| {
        CrudError::NotFetched(format!("{} is not fetched: {}", model.collection, err))
    })?;
    batches.push(batch);

    let doc_length = batches.len();
    let data = batches.swap_remove(0);
    debug!(
        "fetched {} document(s) from {}",
        data.len(),
        model.collection
    );
    Ok(CrudResponse::ok("Data fetched successfully", data).with_doc_length(doc_length))
}

/// Delete the first document matching `filter`. Matching nothing still
/// succeeds; only a store failure surfaces as `NotDeleted`.
pub async fn delete<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    filter: &Value,
) -> CrudResult<CrudResponse<String>> {
    store
        .delete_one(&model.collection, filter)
        .await
        .map_err(|err| {
            CrudError::NotDeleted(format!(
                "{} is not successfully deleted: {}",
                model.collection, err
            ))
        })?;
    Ok(CrudResponse::ok("Deleted successfully", "deleted".to_string()))
}

/// Delete every document matching `filter`, with the same looseness as
/// [`delete`]: zero matches is still a success.
pub async fn delete_many<S: DocumentStore>(
    store: &S,
    model: &ModelHandle,
    filter: &Value,
) -> CrudResult<CrudResponse<String>> {
    store
        .delete_many(&model.collection, filter)
        .await
        .map_err(|err| {
            CrudError::NotDeleted(format!(
                "{} is not successfully deleted: {}",
                model.collection, err
            ))
        })?;
    Ok(CrudResponse::ok("Deleted successfully", "deleted".to_string()))
}
