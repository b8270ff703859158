pub mod aggregate;
pub mod store;
pub mod synthetic;

pub use aggregate::*;
pub use store::*;
pub use synthetic::*;
