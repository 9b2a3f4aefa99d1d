use std::{path::Path, sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{sync::Mutex, time::Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    config::SolverConfig,
    error::{SolveError, ValidationError},
    events::{EventSink, NoticeLevel, SolverEvent},
    history::HistoryStore,
    models::{HistoryEntry, ImageInput, ModelHealth, SolveMode, SolveOutcome, SolveRequest},
    pipeline::{CharReveal, ProgressAnimator},
    timeline::StageTimeline,
    view::{self, Badge, ResultView},
};

use super::{client::RecognitionClient, SolveState};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub const INITIAL_MESSAGE: &str = "Initializing...";
pub const FAILURE_NOTICE: &str = "Failed to solve CAPTCHA. Is the server running?";

/// What the user has picked so far: the image and the mode.
#[derive(Debug, Clone, Default)]
struct SessionContext {
    image: Option<ImageInput>,
    mode: SolveMode,
}

/// Runs one solve at a time: sends the request, animates the pipeline while
/// it is out, then converges the visuals on whatever the server said.
#[derive(Clone)]
pub struct SolveController {
    client: Arc<dyn RecognitionClient>,
    history: Arc<HistoryStore>,
    sink: Arc<dyn EventSink>,
    timeline: Arc<Mutex<StageTimeline>>,
    animator: Arc<ProgressAnimator>,
    reveal: Arc<CharReveal>,
    state: Arc<Mutex<SolveState>>,
    session: Arc<Mutex<SessionContext>>,
    in_flight: Arc<Mutex<Option<CancellationToken>>>,
}

impl SolveController {
    pub fn new(
        client: Arc<dyn RecognitionClient>,
        history: Arc<HistoryStore>,
        sink: Arc<dyn EventSink>,
        config: &SolverConfig,
    ) -> Self {
        Self::with_timeline(
            client,
            history,
            sink,
            StageTimeline::recognition_pipeline(),
            config.stage_cadence,
            config.reveal_delay,
        )
    }

    pub fn with_timeline(
        client: Arc<dyn RecognitionClient>,
        history: Arc<HistoryStore>,
        sink: Arc<dyn EventSink>,
        timeline: StageTimeline,
        stage_cadence: Duration,
        reveal_delay: Duration,
    ) -> Self {
        let timeline = Arc::new(Mutex::new(timeline));
        let animator = ProgressAnimator::new(timeline.clone(), sink.clone(), stage_cadence);
        let reveal = CharReveal::new(sink.clone(), reveal_delay);

        Self {
            client,
            history,
            sink,
            timeline,
            animator: Arc::new(animator),
            reveal: Arc::new(reveal),
            state: Arc::new(Mutex::new(SolveState::new())),
            session: Arc::new(Mutex::new(SessionContext::default())),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    pub fn animator(&self) -> &ProgressAnimator {
        &self.animator
    }

    pub async fn state(&self) -> SolveState {
        self.state.lock().await.clone()
    }

    pub async fn timeline(&self) -> StageTimeline {
        self.timeline.lock().await.clone()
    }

    pub async fn select_image(&self, image: ImageInput) {
        self.session.lock().await.image = Some(image);
    }

    /// Loads an image from disk. Non-image files are refused with a notice.
    pub async fn select_image_path(&self, path: &Path) -> Result<(), SolveError> {
        match ImageInput::from_path(path) {
            Ok(image) => {
                self.select_image(image).await;
                Ok(())
            }
            Err(err) => {
                let message = match &err {
                    ValidationError::NotAnImage { .. } => "Please drop an image file".to_string(),
                    other => other.to_string(),
                };
                self.sink.emit(SolverEvent::notice(NoticeLevel::Error, message));
                Err(err.into())
            }
        }
    }

    pub async fn clear_image(&self) {
        self.session.lock().await.image = None;
    }

    pub async fn has_image(&self) -> bool {
        self.session.lock().await.image.is_some()
    }

    pub async fn set_mode(&self, mode: SolveMode) {
        self.session.lock().await.mode = mode;
    }

    pub async fn health(&self) -> Result<ModelHealth, SolveError> {
        self.client.health().await
    }

    async fn transition(&self, apply: impl FnOnce(&mut SolveState)) {
        let mut state = self.state.lock().await;
        apply(&mut state);
        self.sink.emit(SolverEvent::StateChanged(state.clone()));
    }

    /// Submits the selected image in the selected mode.
    ///
    /// Fails synchronously, without leaving the current state, when no image
    /// is selected or another solve is still running. Every other failure
    /// settles the attempt as `Settled(Failure)`.
    ///
    /// The request and its settlement run on their own task, so dropping the
    /// returned future does not strand the attempt: it still settles and the
    /// controller accepts the next solve.
    pub async fn solve(&self) -> Result<SolveOutcome, SolveError> {
        let (request, cancel) = {
            let mut state = self.state.lock().await;
            if state.is_busy() {
                log_warn!("solve rejected: attempt {:?} still in flight", state.attempt_id);
                return Err(SolveError::InFlight);
            }

            let session = self.session.lock().await;
            let Some(image) = session.image.clone() else {
                self.sink.emit(SolverEvent::notice(
                    NoticeLevel::Error,
                    ValidationError::NoImage.to_string(),
                ));
                return Err(ValidationError::NoImage.into());
            };

            let request = SolveRequest {
                attempt_id: Uuid::new_v4().to_string(),
                image,
                mode: session.mode,
            };
            let cancel = CancellationToken::new();
            *self.in_flight.lock().await = Some(cancel.clone());
            state.begin(request.attempt_id.clone(), request.mode, Utc::now());
            self.sink.emit(SolverEvent::StateChanged(state.clone()));
            (request, cancel)
        };

        let controller = self.clone();
        let attempt = tokio::spawn(async move { controller.run_attempt(request, cancel).await });

        match attempt.await {
            Ok(result) => result,
            Err(err) => Err(SolveError::Transport(format!("solve task failed: {err}"))),
        }
    }

    async fn run_attempt(
        &self,
        request: SolveRequest,
        cancel: CancellationToken,
    ) -> Result<SolveOutcome, SolveError> {
        let started = Instant::now();

        log_info!(
            "[{}] solving {} ({} bytes, mode {})",
            request.attempt_id,
            request.image.file_name(),
            request.image.bytes().len(),
            request.mode
        );

        self.clear_visuals().await;

        self.transition(SolveState::race).await;
        self.animator.start().await;

        let result = tokio::select! {
            result = self.client.solve(&request) => result,
            _ = cancel.cancelled() => Err(SolveError::Cancelled),
        };
        self.in_flight.lock().await.take();

        self.transition(SolveState::converge).await;

        match result {
            Ok(outcome) => {
                self.settle_success(&request, &outcome, started.elapsed()).await;
                Ok(outcome)
            }
            Err(err) => {
                self.settle_failure(&request, &err).await;
                Err(err)
            }
        }
    }

    /// Aborts the in-flight request, if any. The attempt settles as a
    /// failure of kind `Cancelled`.
    pub async fn cancel(&self) -> bool {
        match self.in_flight.lock().await.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Closes the progress overlay. From a settled state this also returns
    /// the machine to `Idle`; result panels are left as they are.
    pub async fn dismiss(&self) {
        self.sink.emit(SolverEvent::OverlayHidden);

        let mut state = self.state.lock().await;
        if state.dismiss() {
            self.animator.stop().await;
            self.sink.emit(SolverEvent::StateChanged(state.clone()));
        }
    }

    async fn clear_visuals(&self) {
        self.sink.emit(SolverEvent::ResultCleared);
        self.sink.emit(SolverEvent::CharBreakdownHidden);
        self.sink.emit(SolverEvent::badge(Badge::Processing));
        self.reveal.reset();
        self.sink.emit(SolverEvent::OverlayShown);

        {
            let mut timeline = self.timeline.lock().await;
            timeline.reset();
            self.sink.emit(SolverEvent::StagesChanged(timeline.snapshot()));
        }
        self.sink.emit(SolverEvent::progress(INITIAL_MESSAGE, 0.0));
    }

    async fn settle_success(&self, request: &SolveRequest, outcome: &SolveOutcome, elapsed: Duration) {
        self.animator.stop().await;
        {
            let mut timeline = self.timeline.lock().await;
            timeline.force_complete();
            self.sink.emit(SolverEvent::StagesChanged(timeline.snapshot()));
        }

        let text = &outcome.predicted_text;
        self.sink
            .emit(SolverEvent::ResultShown(ResultView::from_outcome(outcome, elapsed)));
        match view::char_cards(outcome) {
            Some(cards) => self.sink.emit(SolverEvent::CharBreakdownShown(cards)),
            None => self.sink.emit(SolverEvent::CharBreakdownHidden),
        }
        self.reveal.play(text);
        self.sink.emit(SolverEvent::progress(
            format!("Result: {text} - Click ✕ to close"),
            100.0,
        ));
        self.sink.emit(SolverEvent::badge(Badge::Success));

        self.history.append(HistoryEntry {
            image_data_uri: request.image.data_uri(),
            result_text: text.clone(),
            mode: request.mode,
            confidence_percent: outcome.confidence_percent,
            created_at_epoch_ms: Utc::now().timestamp_millis(),
        });

        self.sink.emit(SolverEvent::notice(
            NoticeLevel::Success,
            format!("CAPTCHA solved: {text}"),
        ));
        self.transition(|state| state.settle_success(Utc::now())).await;

        log_info!(
            "[{}] solved '{}' at {:.1}% in {}ms",
            request.attempt_id,
            text,
            outcome.confidence_percent,
            elapsed.as_millis()
        );
    }

    async fn settle_failure(&self, request: &SolveRequest, err: &SolveError) {
        self.animator.stop().await;
        {
            let mut timeline = self.timeline.lock().await;
            timeline.reset();
            self.sink.emit(SolverEvent::StagesChanged(timeline.snapshot()));
        }

        self.reveal.cancel();
        self.sink.emit(SolverEvent::CharBreakdownHidden);
        self.sink.emit(SolverEvent::badge(Badge::Failure));
        self.sink.emit(SolverEvent::OverlayHidden);

        let notice = match err {
            SolveError::Cancelled => SolverEvent::notice(NoticeLevel::Info, "Solve cancelled"),
            _ => SolverEvent::notice(NoticeLevel::Error, FAILURE_NOTICE),
        };
        self.sink.emit(notice);

        let kind = err.kind();
        self.transition(|state| state.settle_failure(kind, Utc::now())).await;

        log_error!("[{}] solve failed: {}", request.attempt_id, err);
    }
}
