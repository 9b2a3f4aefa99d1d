use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    events::{EventSink, SolverEvent},
    timeline::StageTimeline,
};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

pub const FINALIZING_MESSAGE: &str = "Finalizing...";

struct TickerRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Walks the shared [`StageTimeline`] forward on a fixed cadence, with no
/// knowledge of the request it is decorating.
///
/// The first stage is entered as soon as the ticker starts. Once every stage
/// has been entered the ticker waits one more cadence, publishes
/// "Finalizing...", raises the exhausted flag and exits.
pub struct ProgressAnimator {
    timeline: Arc<Mutex<StageTimeline>>,
    sink: Arc<dyn EventSink>,
    cadence: Duration,
    ticker: Mutex<Option<TickerRun>>,
    exhausted: Arc<watch::Sender<bool>>,
}

impl ProgressAnimator {
    pub fn new(
        timeline: Arc<Mutex<StageTimeline>>,
        sink: Arc<dyn EventSink>,
        cadence: Duration,
    ) -> Self {
        let (exhausted, _) = watch::channel(false);
        Self {
            timeline,
            sink,
            cadence,
            ticker: Mutex::new(None),
            exhausted: Arc::new(exhausted),
        }
    }

    pub async fn start(&self) {
        self.stop().await;
        self.exhausted.send_replace(false);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_ticker(
            self.timeline.clone(),
            self.sink.clone(),
            self.cadence,
            cancel.clone(),
            self.exhausted.clone(),
        ));

        *self.ticker.lock().await = Some(TickerRun { cancel, handle });
    }

    /// Cancels the pending tick, if any. Safe to call repeatedly.
    ///
    /// Holding the timeline lock while cancelling means a tick is either
    /// fully applied before `stop` returns or not applied at all.
    pub async fn stop(&self) {
        let run = self.ticker.lock().await.take();
        if let Some(run) = run {
            let _timeline = self.timeline.lock().await;
            run.cancel.cancel();
            run.handle.abort();
            log_debug!("progress animator stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        match self.ticker.lock().await.as_ref() {
            Some(run) => !run.handle.is_finished(),
            None => false,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        *self.exhausted.borrow()
    }

    /// Flips to `true` once all stages have been shown for a full cadence.
    pub fn subscribe_exhausted(&self) -> watch::Receiver<bool> {
        self.exhausted.subscribe()
    }
}

async fn run_ticker(
    timeline: Arc<Mutex<StageTimeline>>,
    sink: Arc<dyn EventSink>,
    cadence: Duration,
    cancel: CancellationToken,
    exhausted: Arc<watch::Sender<bool>>,
) {
    let mut interval = time::interval(cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let mut guard = timeline.lock().await;
        if cancel.is_cancelled() {
            break;
        }

        if guard.advance_one() {
            let message = guard
                .current_stage()
                .map(|stage| stage.message.clone())
                .unwrap_or_default();
            log_debug!("stage {}/{}: {}", guard.cursor(), guard.len(), message);
            sink.emit(SolverEvent::StagesChanged(guard.snapshot()));
            sink.emit(SolverEvent::progress(message, guard.percent()));
        } else {
            sink.emit(SolverEvent::progress(FINALIZING_MESSAGE, 100.0));
            exhausted.send_replace(true);
            log_debug!("all stages shown; waiting on the server");
            break;
        }
    }
}
