pub mod history;
pub mod outcome;
pub mod request;

pub use history::HistoryEntry;
pub use outcome::{Alternative, CharDetail, ModelHealth, SolveOutcome};
pub use request::{ImageInput, SolveMode, SolveRequest};
