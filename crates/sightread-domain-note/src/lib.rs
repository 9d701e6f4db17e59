pub mod model;
pub mod name;

pub use model::*;
pub use name::*;
