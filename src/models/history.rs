use serde::{Deserialize, Serialize};

use super::SolveMode;

/// A past successful solve. Field names match what earlier versions wrote
/// to the `captchaHistory` key so old logs keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(rename = "image")]
    pub image_data_uri: String,
    #[serde(rename = "result")]
    pub result_text: String,
    #[serde(rename = "type")]
    pub mode: SolveMode,
    #[serde(rename = "confidence")]
    pub confidence_percent: f64,
    #[serde(rename = "timestamp")]
    pub created_at_epoch_ms: i64,
}
