use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::DocumentStore;

/// Generic CRUD routes, one set per collection path. Route authors
/// mount this once and every collection gets the full operation set.
pub fn create_router<S: DocumentStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/:collection",
            post(handlers::create::<S>)
                .get(handlers::get_many::<S>)
                .patch(handlers::update::<S>)
                .delete(handlers::delete_one::<S>),
        )
        .route(
            "/:collection/batch",
            post(handlers::create_many::<S>).delete(handlers::delete_many::<S>),
        )
        .route("/:collection/search", post(handlers::get_one::<S>))
}
