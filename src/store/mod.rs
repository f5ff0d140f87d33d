pub mod memory;
pub mod pending;
pub mod traits;

pub use memory::*;
pub use pending::*;
pub use traits::*;
