pub mod battery;
pub mod fleet;
pub mod forecast;

pub use battery::*;
pub use fleet::*;
pub use forecast::*;
