use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RunEnv;
use crate::error::CrudError;
use crate::logic::crud;
use crate::model::{failure_message, ModelHandle, PopulateArg, QueryBag};
use crate::store::traits::DocumentStore;

pub type AppState<S> = Arc<ApiContext<S>>;

/// Shared handler state: the store driver plus the deployment mode
/// that gates stack detail in error responses.
pub struct ApiContext<S> {
    pub store: S,
    pub env: RunEnv,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub data: Value,
    /// Uniqueness filter; empty means no check requested.
    #[serde(default)]
    pub check: Map<String, Value>,
    /// Field selection in the store's `-field` string convention.
    #[serde(default)]
    pub exempt: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateManyRequest {
    pub data: Vec<Value>,
    #[serde(default)]
    pub check: Vec<Map<String, Value>>,
    #[serde(default)]
    pub exempt: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub filter: Value,
    pub data: Value,
    #[serde(default)]
    pub exempt: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GetOneRequest {
    pub filter: Map<String, Value>,
    #[serde(default)]
    pub populate: Option<PopulateArg>,
    #[serde(default)]
    pub exempt: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub filter: Value,
}

/// Render a service error as the uniform failure envelope plus status.
///
/// Store-level duplicate key errors are recognized by message content
/// and rewritten to a generic message; stack detail is attached only
/// outside production.
pub fn error_center(error: &CrudError, env: RunEnv) -> (StatusCode, Json<Value>) {
    let raw = error.to_string();
    let message = if raw.contains("E11000") {
        "data already exist in the database".to_string()
    } else {
        raw.clone()
    };
    let stack = (!env.is_production()).then(|| format!("{:?}", error));
    (error.status(), Json(failure_message(&message, &raw, stack)))
}

pub async fn create<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Json(body): Json<CreateRequest>,
) -> Response {
    let model = ModelHandle::with_exempt(&collection, &body.exempt);
    match crud::create(&state.store, &model, body.data, body.check).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(error) => error_center(&error, state.env).into_response(),
    }
}

pub async fn create_many<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Json(body): Json<CreateManyRequest>,
) -> Response {
    let model = ModelHandle::with_exempt(&collection, &body.exempt);
    match crud::create_many(&state.store, &model, body.data, body.check).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(error) => error_center(&error, state.env).into_response(),
    }
}

pub async fn update<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Json(body): Json<UpdateRequest>,
) -> Response {
    let model = ModelHandle::with_exempt(&collection, &body.exempt);
    match crud::update(&state.store, &model, &body.filter, &body.data).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error_center(&error, state.env).into_response(),
    }
}

pub async fn get_many<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let model = ModelHandle::new(&collection);
    let mut bag: QueryBag = params
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect();

    // `populate` rides in the query string as JSON; it is a control
    // parameter at this layer, never a filter constraint.
    let populate = match bag.remove("populate") {
        Some(Value::String(raw)) => match serde_json::from_str::<PopulateArg>(&raw) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                return error_center(&CrudError::ParseFailure(err), state.env).into_response()
            }
        },
        _ => None,
    };

    match crud::get_many(&state.store, &model, bag, populate, None).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error_center(&error, state.env).into_response(),
    }
}

pub async fn get_one<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Json(body): Json<GetOneRequest>,
) -> Response {
    let model = ModelHandle::with_exempt(&collection, &body.exempt);
    match crud::get_one(&state.store, &model, body.filter, body.populate).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error_center(&error, state.env).into_response(),
    }
}

pub async fn delete_one<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Json(body): Json<DeleteRequest>,
) -> Response {
    let model = ModelHandle::new(&collection);
    match crud::delete(&state.store, &model, &body.filter).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error_center(&error, state.env).into_response(),
    }
}

pub async fn delete_many<S: DocumentStore>(
    State(state): State<AppState<S>>,
    Path(collection): Path<String>,
    Json(body): Json<DeleteRequest>,
) -> Response {
    let model = ModelHandle::new(&collection);
    match crud::delete_many(&state.store, &model, &body.filter).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(error) => error_center(&error, state.env).into_response(),
    }
}
