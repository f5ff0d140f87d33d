pub mod crud;
pub mod expand;
pub mod guard;
pub mod query;

pub use crud::*;
pub use expand::*;
pub use guard::*;
pub use query::*;
