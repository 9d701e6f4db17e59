pub mod catalog;
pub mod hint;
pub mod mistakes;

pub use catalog::*;
pub use hint::*;
pub use mistakes::*;
