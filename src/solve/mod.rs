pub mod client;
pub mod controller;
pub mod state;

pub use client::{HttpRecognitionClient, RecognitionClient};
pub use controller::SolveController;
pub use state::{Settlement, SolveState, SolveStatus};
