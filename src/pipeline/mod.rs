pub mod animator;
pub mod reveal;

pub use animator::{ProgressAnimator, FINALIZING_MESSAGE};
pub use reveal::CharReveal;
