use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::{Context, Result};

use crate::{
    events::{EventSink, NoticeLevel, SolverEvent},
    models::HistoryEntry,
    view::{Badge, ResultView},
};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const HISTORY_CAPACITY: usize = 20;

/// Storage key; the log lives at `<data dir>/captchaHistory.json`.
pub const HISTORY_KEY: &str = "captchaHistory";

/// Newest-first log of successful solves, mirrored to a JSON file.
///
/// The in-memory list is authoritative. Persistence is best effort: a failed
/// write is logged and the session carries on.
pub struct HistoryStore {
    path: PathBuf,
    entries: RwLock<Vec<HistoryEntry>>,
    sink: Arc<dyn EventSink>,
}

impl HistoryStore {
    /// Opens the log stored under `data_dir`. Missing or unreadable data
    /// yields an empty log.
    pub fn open(data_dir: &Path, sink: Arc<dyn EventSink>) -> Self {
        let path = data_dir.join(format!("{HISTORY_KEY}.json"));
        let entries = read_entries(&path);
        Self {
            path,
            entries: RwLock::new(entries),
            sink,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Vec<HistoryEntry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Vec<HistoryEntry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.read_guard().clone()
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    /// Re-reads the persisted log, replacing the in-memory copy. Never fails.
    pub fn load_all(&self) -> Vec<HistoryEntry> {
        let entries = read_entries(&self.path);
        *self.write_guard() = entries.clone();
        entries
    }

    /// Prepends `entry`, drops anything beyond the capacity and persists.
    pub fn append(&self, entry: HistoryEntry) {
        let snapshot = {
            let mut guard = self.write_guard();
            guard.insert(0, entry);
            guard.truncate(HISTORY_CAPACITY);
            if let Err(err) = self.persist(&guard) {
                log_warn!("history not persisted: {err:#}");
            }
            guard.clone()
        };

        self.sink.emit(SolverEvent::HistoryChanged(snapshot));
    }

    pub fn clear(&self) {
        {
            let mut guard = self.write_guard();
            guard.clear();
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => log_warn!(
                    "failed to remove history at {}: {err}",
                    self.path.display()
                ),
            }
        }

        log_info!("history cleared");
        self.sink.emit(SolverEvent::HistoryChanged(Vec::new()));
        self.sink
            .emit(SolverEvent::notice(NoticeLevel::Success, "History cleared"));
    }

    /// Shows a past result in the result panel. Does not start a solve.
    pub fn select_entry(&self, index: usize) -> Option<HistoryEntry> {
        let entry = self.read_guard().get(index).cloned()?;
        self.sink
            .emit(SolverEvent::ResultShown(ResultView::from_history(&entry)));
        self.sink.emit(SolverEvent::badge(Badge::History));
        Some(entry)
    }

    /// Pushes the current log to the history grid.
    pub fn render(&self) {
        self.sink.emit(SolverEvent::HistoryChanged(self.entries()));
    }

    fn persist(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string(entries)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("failed to write history to {}", self.path.display()))
    }
}

fn read_entries(path: &Path) -> Vec<HistoryEntry> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            log_warn!("failed to read history from {}: {err}", path.display());
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<HistoryEntry>>(&contents) {
        Ok(mut entries) => {
            entries.truncate(HISTORY_CAPACITY);
            entries
        }
        Err(err) => {
            log_warn!("ignoring corrupt history at {}: {err}", path.display());
            Vec::new()
        }
    }
}
