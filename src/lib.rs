pub mod api;
pub mod config;
pub mod error;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers::{ApiContext, AppState};
pub use api::routes::create_router;

// Export the service surface
pub use error::{CrudError, CrudResult};
pub use logic::{
    create, create_many, delete, delete_many, ensure_absent, ensure_all_absent, get_many, get_one,
    populate_model, update, Queries,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{
    AppliedPopulate, DocumentStore, FindOptions, MemoryStore, PendingFind, PendingFindOne,
    Populatable,
};
