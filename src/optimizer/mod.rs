pub mod builder;
pub mod dispatch;
pub mod error;
pub mod extract;
pub mod model;
pub mod settings;
pub mod solver;

pub use builder::*;
pub use dispatch::*;
pub use error::*;
pub use extract::*;
pub use model::*;
pub use settings::*;
pub use solver::*;
