use std::time::Duration;

use serde::Serialize;

use crate::models::{CharDetail, HistoryEntry, SolveOutcome};

pub const DEFAULT_ARCHITECTURE: &str = "CNN + ViT + BiLSTM";

const BLANK_GLYPH: &str = "␣";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Badge {
    Processing,
    Success,
    Failure,
    History,
}

impl Badge {
    pub fn label(&self) -> &'static str {
        match self {
            Badge::Processing => "Processing...",
            Badge::Success => "Solved",
            Badge::Failure => "Failed",
            Badge::History => "History",
        }
    }
}

/// Contents of the main result panel.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub text: String,
    pub confidence_percent: f64,
    pub confidence_label: String,
    pub processing_time: String,
    pub model: String,
}

impl ResultView {
    /// `elapsed` is the client-side wall time, used when the server did not
    /// report its own processing time.
    pub fn from_outcome(outcome: &SolveOutcome, elapsed: Duration) -> Self {
        let processing_time = match outcome.processing_time_ms {
            Some(ms) => format!("{}ms", ms.round()),
            None => format!("{:.2}s", elapsed.as_secs_f64()),
        };

        Self {
            text: outcome.predicted_text.clone(),
            confidence_percent: outcome.confidence_percent,
            confidence_label: confidence_label(outcome.confidence_percent),
            processing_time,
            model: outcome
                .architecture
                .clone()
                .unwrap_or_else(|| DEFAULT_ARCHITECTURE.to_string()),
        }
    }

    pub fn from_history(entry: &HistoryEntry) -> Self {
        Self {
            text: entry.result_text.clone(),
            confidence_percent: entry.confidence_percent,
            confidence_label: confidence_label(entry.confidence_percent),
            processing_time: "from history".to_string(),
            model: entry.mode.model_label().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 90.0 {
            ConfidenceTier::High
        } else if percent >= 70.0 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharCard {
    /// 1-based, as displayed.
    pub position: usize,
    pub glyph: String,
    pub confidence_percent: f64,
    pub confidence_label: String,
    pub tier: ConfidenceTier,
    pub alternatives: Vec<String>,
}

impl CharCard {
    pub fn from_detail(detail: &CharDetail) -> Self {
        // The first alternative is the prediction itself.
        let alternatives = detail
            .top_alternatives
            .iter()
            .skip(1)
            .map(|alt| format!("{} {:.0}%", glyph(&alt.character), alt.confidence_percent))
            .collect();

        Self {
            position: detail.position + 1,
            glyph: glyph(&detail.predicted_char),
            confidence_percent: detail.confidence_percent,
            confidence_label: confidence_label(detail.confidence_percent),
            tier: ConfidenceTier::for_percent(detail.confidence_percent),
            alternatives,
        }
    }
}

/// Cards for the breakdown grid, or `None` when the grid should be hidden.
pub fn char_cards(outcome: &SolveOutcome) -> Option<Vec<CharCard>> {
    let details = outcome.char_details();
    if details.is_empty() {
        return None;
    }
    Some(details.iter().map(CharCard::from_detail).collect())
}

pub fn confidence_label(percent: f64) -> String {
    format!("{percent:.1}%")
}

fn glyph(raw: &str) -> String {
    if raw == "_" {
        BLANK_GLYPH.to_string()
    } else {
        raw.to_string()
    }
}
