pub mod audio;
pub mod clock;
pub mod coach;
pub mod midi;
pub mod storage;
pub mod types;

pub use audio::*;
pub use clock::*;
pub use coach::*;
pub use midi::*;
pub use storage::*;
pub use types::*;
