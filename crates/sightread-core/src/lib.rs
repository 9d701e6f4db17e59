pub mod error;
pub mod hints;
pub mod midi_input;
pub mod pitch;
pub mod session;

pub use error::*;
pub use hints::*;
pub use midi_input::*;
pub use pitch::*;
pub use session::*;
