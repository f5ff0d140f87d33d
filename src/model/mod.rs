pub mod common;
pub mod envelope;
pub mod populate;

pub use common::*;
pub use envelope::*;
pub use populate::*;
