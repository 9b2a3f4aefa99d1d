use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    pub message: String,
}

impl Stage {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StageStatus {
    Pending,
    Active,
    Complete,
}

impl Default for StageStatus {
    fn default() -> Self {
        StageStatus::Pending
    }
}

/// Visual state of every stage, as pushed to the progress overlay.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    pub cursor: usize,
    pub total: usize,
    pub percent: f64,
    pub stages: Vec<StageView>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StageView {
    pub id: String,
    pub status: StageStatus,
}

/// Ordered pipeline stages plus a cursor in `[0, N]`.
///
/// `cursor == 0` means nothing has started; `cursor == k` means stage `k - 1`
/// is the active one and every stage before it is complete. The cursor only
/// moves backwards through [`StageTimeline::reset`].
#[derive(Debug, Clone)]
pub struct StageTimeline {
    stages: Vec<Stage>,
    statuses: Vec<StageStatus>,
    cursor: usize,
}

impl StageTimeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        let statuses = vec![StageStatus::Pending; stages.len()];
        Self {
            stages,
            statuses,
            cursor: 0,
        }
    }

    /// The five stages the recognition model is presented as running.
    pub fn recognition_pipeline() -> Self {
        Self::new(vec![
            Stage::new("input", "Preprocessing image..."),
            Stage::new("feature-extraction", "Extracting features with CNN..."),
            Stage::new("attention", "Applying attention mechanism..."),
            Stage::new("sequence-processing", "Processing sequences with BiLSTM..."),
            Stage::new("classification", "Classifying characters..."),
        ])
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn status(&self, index: usize) -> Option<StageStatus> {
        self.statuses.get(index).copied()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.stages.len()
    }

    /// The stage most recently entered, if any.
    pub fn current_stage(&self) -> Option<&Stage> {
        self.cursor.checked_sub(1).and_then(|idx| self.stages.get(idx))
    }

    pub fn percent(&self) -> f64 {
        if self.stages.is_empty() {
            return 100.0;
        }
        self.cursor as f64 / self.stages.len() as f64 * 100.0
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.statuses.fill(StageStatus::Pending);
    }

    /// Enters the next stage. Returns `false` when already at the end.
    pub fn advance_one(&mut self) -> bool {
        if self.is_exhausted() {
            return false;
        }

        if let Some(previous) = self.cursor.checked_sub(1) {
            self.statuses[previous] = StageStatus::Complete;
        }
        self.statuses[self.cursor] = StageStatus::Active;
        self.cursor += 1;
        true
    }

    pub fn force_complete(&mut self) {
        self.cursor = self.stages.len();
        self.statuses.fill(StageStatus::Complete);
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            cursor: self.cursor,
            total: self.stages.len(),
            percent: self.percent(),
            stages: self
                .stages
                .iter()
                .zip(&self.statuses)
                .map(|(stage, status)| StageView {
                    id: stage.id.clone(),
                    status: *status,
                })
                .collect(),
        }
    }
}

impl Default for StageTimeline {
    fn default() -> Self {
        Self::recognition_pipeline()
    }
}
