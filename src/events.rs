use std::sync::Mutex;

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    models::HistoryEntry,
    solve::SolveState,
    timeline::TimelineSnapshot,
    view::{Badge, CharCard, ResultView},
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// Everything the core writes to the UI. Each variant targets one named slot
/// of the page; the sink decides how (or whether) to render it.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SolverEvent {
    StateChanged(SolveState),
    OverlayShown,
    OverlayHidden,
    StagesChanged(TimelineSnapshot),
    ProgressChanged { message: String, percent: f64 },
    BadgeChanged { badge: Badge, text: String },
    ResultCleared,
    ResultShown(ResultView),
    CharBreakdownShown(Vec<CharCard>),
    CharBreakdownHidden,
    RevealReset,
    CharRevealed { index: usize, character: char },
    HistoryChanged(Vec<HistoryEntry>),
    Notice { level: NoticeLevel, message: String },
}

impl SolverEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SolverEvent::StateChanged(_) => "solve-state-changed",
            SolverEvent::OverlayShown => "overlay-shown",
            SolverEvent::OverlayHidden => "overlay-hidden",
            SolverEvent::StagesChanged(_) => "stages-changed",
            SolverEvent::ProgressChanged { .. } => "progress-changed",
            SolverEvent::BadgeChanged { .. } => "badge-changed",
            SolverEvent::ResultCleared => "result-cleared",
            SolverEvent::ResultShown(_) => "result-shown",
            SolverEvent::CharBreakdownShown(_) => "char-breakdown-shown",
            SolverEvent::CharBreakdownHidden => "char-breakdown-hidden",
            SolverEvent::RevealReset => "reveal-reset",
            SolverEvent::CharRevealed { .. } => "char-revealed",
            SolverEvent::HistoryChanged(_) => "history-changed",
            SolverEvent::Notice { .. } => "notice",
        }
    }

    pub fn badge(badge: Badge) -> Self {
        SolverEvent::BadgeChanged {
            badge,
            text: badge.label().to_string(),
        }
    }

    pub fn progress(message: impl Into<String>, percent: f64) -> Self {
        SolverEvent::ProgressChanged {
            message: message.into(),
            percent,
        }
    }

    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        SolverEvent::Notice {
            level,
            message: message.into(),
        }
    }
}

/// Receiver for UI updates. Emission is fire-and-forget and must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SolverEvent);
}

/// Headless sink that turns slot updates into log lines.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: SolverEvent) {
        match &event {
            SolverEvent::Notice {
                level: NoticeLevel::Error,
                message,
            } => warn!("{message}"),
            SolverEvent::Notice { message, .. } => info!("{message}"),
            SolverEvent::ProgressChanged { message, percent } => {
                info!("[{percent:>5.1}%] {message}")
            }
            SolverEvent::ResultShown(view) => info!(
                "result {} ({}, {}, {})",
                view.text, view.confidence_label, view.processing_time, view.model
            ),
            other => match serde_json::to_string(other) {
                Ok(payload) => debug!("{}: {payload}", other.name()),
                Err(err) => warn!("failed to serialize {}: {err}", other.name()),
            },
        }
    }
}

/// Keeps every event in order. Handy for asserting on what a user would
/// have seen.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SolverEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SolverEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SolverEvent) {
        let mut guard = match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(event);
    }
}
