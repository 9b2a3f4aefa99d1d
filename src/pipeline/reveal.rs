use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::events::{EventSink, SolverEvent};

/// Staggered character-by-character reveal of the predicted text.
///
/// Purely cosmetic: it runs detached and nothing waits on it.
pub struct CharReveal {
    sink: Arc<dyn EventSink>,
    delay: Duration,
    current: Mutex<Option<CancellationToken>>,
}

impl CharReveal {
    pub fn new(sink: Arc<dyn EventSink>, delay: Duration) -> Self {
        Self {
            sink,
            delay,
            current: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn cancel(&self) {
        if let Some(token) = self.slot().take() {
            token.cancel();
        }
    }

    /// Stops any reveal in progress and puts the output slots back to `?`.
    pub fn reset(&self) {
        self.cancel();
        self.sink.emit(SolverEvent::RevealReset);
    }

    /// Reveals `text` one character per delay, starting immediately.
    pub fn play(&self, text: &str) {
        let token = CancellationToken::new();
        if let Some(previous) = self.slot().replace(token.clone()) {
            previous.cancel();
        }

        let sink = self.sink.clone();
        let delay = self.delay;
        let characters: Vec<char> = text.chars().collect();

        tokio::spawn(async move {
            for (index, character) in characters.into_iter().enumerate() {
                if index > 0 {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return,
                        _ = time::sleep(delay) => {}
                    }
                }
                if token.is_cancelled() {
                    return;
                }
                sink.emit(SolverEvent::CharRevealed { index, character });
            }
        });
    }
}
