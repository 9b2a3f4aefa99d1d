use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use captcha_solver_lib::{
    error::{ErrorKind, SolveError, ValidationError},
    events::{NoticeLevel, RecordingSink, SolverEvent},
    history::{HistoryStore, HISTORY_CAPACITY},
    models::{ImageInput, ModelHealth, SolveMode, SolveOutcome, SolveRequest},
    solve::{RecognitionClient, Settlement, SolveController, SolveStatus},
    timeline::{StageStatus, StageTimeline},
};
use tempfile::TempDir;
use tokio::time::sleep;

const CADENCE: Duration = Duration::from_millis(800);
const REVEAL: Duration = Duration::from_millis(200);

#[derive(Clone)]
enum Reply {
    Outcome(SolveOutcome),
    Status(u16),
    Malformed,
}

struct MockClient {
    delay: Duration,
    reply: Reply,
    calls: AtomicUsize,
    modes: Mutex<Vec<SolveMode>>,
}

impl MockClient {
    fn new(delay: Duration, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            delay,
            reply,
            calls: AtomicUsize::new(0),
            modes: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionClient for MockClient {
    async fn solve(&self, request: &SolveRequest) -> Result<SolveOutcome, SolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.modes.lock().unwrap().push(request.mode);
        sleep(self.delay).await;
        match &self.reply {
            Reply::Outcome(outcome) => Ok(outcome.clone()),
            Reply::Status(status) => Err(SolveError::Status {
                status: *status,
                body: "Internal Server Error".into(),
            }),
            Reply::Malformed => Err(SolveError::MalformedResponse("missing prediction".into())),
        }
    }

    async fn health(&self) -> Result<ModelHealth, SolveError> {
        Ok(ModelHealth {
            text: true,
            math: false,
        })
    }
}

fn ab3x() -> SolveOutcome {
    SolveOutcome::from_body(
        r#"{
            "prediction": "AB3X",
            "confidence": 96.2,
            "char_details": [
                {"position": 0, "predicted": "A", "confidence": 99.0, "top_3": [{"char": "A", "confidence": 99.0}]},
                {"position": 1, "predicted": "B", "confidence": 97.5, "top_3": [{"char": "B", "confidence": 97.5}, {"char": "8", "confidence": 2.1}]},
                {"position": 2, "predicted": "3", "confidence": 93.0, "top_3": []},
                {"position": 3, "predicted": "X", "confidence": 95.3, "top_3": []}
            ]
        }"#,
    )
    .unwrap()
}

struct Harness {
    _dir: TempDir,
    sink: Arc<RecordingSink>,
    client: Arc<MockClient>,
    history: Arc<HistoryStore>,
    controller: SolveController,
}

async fn harness(delay: Duration, reply: Reply) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::new());
    let client = MockClient::new(delay, reply);
    let history = Arc::new(HistoryStore::open(dir.path(), sink.clone()));
    let controller = SolveController::with_timeline(
        client.clone(),
        history.clone(),
        sink.clone(),
        StageTimeline::recognition_pipeline(),
        CADENCE,
        REVEAL,
    );

    Harness {
        _dir: dir,
        sink,
        client,
        history,
        controller,
    }
}

fn png() -> ImageInput {
    ImageInput::new(b"\x89PNG fake".to_vec(), "image/png", "captcha.png").unwrap()
}

fn all_complete(timeline: &StageTimeline) -> bool {
    (0..timeline.len()).all(|i| timeline.status(i) == Some(StageStatus::Complete))
}

fn stage_updates(sink: &RecordingSink) -> usize {
    sink.events()
        .iter()
        .filter(|event| matches!(event, SolverEvent::StagesChanged(_)))
        .count()
}

#[tokio::test(start_paused = true)]
async fn text_solve_settles_successfully_and_records_history() {
    let h = harness(Duration::from_millis(1500), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;
    h.controller.set_mode(SolveMode::Text).await;

    let outcome = h.controller.solve().await.unwrap();
    assert_eq!(outcome.predicted_text, "AB3X");

    let state = h.controller.state().await;
    assert_eq!(state.status, SolveStatus::Settled(Settlement::Success));
    assert_eq!(state.mode, Some(SolveMode::Text));

    let entries = h.history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].result_text, "AB3X");
    assert_eq!(entries[0].mode, SolveMode::Text);
    assert!(entries[0].image_data_uri.starts_with("data:image/png;base64,"));

    let timeline = h.controller.timeline().await;
    assert_eq!(timeline.cursor(), timeline.len());
    assert!(all_complete(&timeline));

    let events = h.sink.events();
    assert!(events.contains(&SolverEvent::notice(
        NoticeLevel::Success,
        "CAPTCHA solved: AB3X"
    )));
    assert!(events
        .iter()
        .any(|event| matches!(event, SolverEvent::CharBreakdownShown(cards) if cards.len() == 4)));
    assert_eq!(*h.client.modes.lock().unwrap(), vec![SolveMode::Text]);
}

#[tokio::test(start_paused = true)]
async fn math_solve_against_server_error_settles_as_failure() {
    let h = harness(Duration::from_millis(300), Reply::Status(500)).await;
    h.controller.select_image(png()).await;
    h.controller.set_mode(SolveMode::Math).await;

    let err = h.controller.solve().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);

    let state = h.controller.state().await;
    assert_eq!(state.status, SolveStatus::Settled(Settlement::Failure));
    assert_eq!(state.failure, Some(ErrorKind::Transport));
    assert!(h.history.is_empty());

    let timeline = h.controller.timeline().await;
    assert_eq!(timeline.cursor(), 0);
    assert!((0..timeline.len()).all(|i| timeline.status(i) == Some(StageStatus::Pending)));

    let events = h.sink.events();
    assert!(events.contains(&SolverEvent::CharBreakdownHidden));
    assert!(events.contains(&SolverEvent::notice(
        NoticeLevel::Error,
        "Failed to solve CAPTCHA. Is the server running?"
    )));
    assert!(!events
        .iter()
        .any(|event| matches!(event, SolverEvent::CharBreakdownShown(_))));
}

#[tokio::test(start_paused = true)]
async fn malformed_response_is_a_failure_without_history() {
    let h = harness(Duration::from_millis(100), Reply::Malformed).await;
    h.controller.select_image(png()).await;

    let err = h.controller.solve().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    assert_eq!(
        h.controller.state().await.failure,
        Some(ErrorKind::MalformedResponse)
    );
    assert!(h.history.is_empty());
    assert_eq!(h.controller.timeline().await.cursor(), 0);
}

#[tokio::test(start_paused = true)]
async fn solving_without_an_image_stays_idle() {
    let h = harness(Duration::from_millis(100), Reply::Outcome(ab3x())).await;

    let err = h.controller.solve().await.unwrap_err();
    assert!(matches!(
        err,
        SolveError::Validation(ValidationError::NoImage)
    ));
    assert_eq!(h.controller.state().await.status, SolveStatus::Idle);
    assert_eq!(h.client.calls(), 0);
    assert_eq!(
        h.sink.events(),
        vec![SolverEvent::notice(
            NoticeLevel::Error,
            "Please upload an image first"
        )]
    );

    h.controller.select_image(png()).await;
    h.controller.clear_image().await;
    assert!(h.controller.solve().await.is_err());
    assert_eq!(h.client.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn early_response_forces_completion_and_silences_ticks() {
    let h = harness(Duration::from_millis(100), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    h.controller.solve().await.unwrap();
    assert!(!h.controller.animator().is_exhausted());

    let timeline = h.controller.timeline().await;
    assert_eq!(timeline.cursor(), timeline.len());
    assert!(all_complete(&timeline));

    let updates = stage_updates(&h.sink);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(stage_updates(&h.sink), updates);
    assert!(all_complete(&h.controller.timeline().await));
}

#[tokio::test(start_paused = true)]
async fn late_response_converges_after_stages_run_out() {
    let h = harness(Duration::from_secs(10), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.solve().await });

    sleep(Duration::from_secs(5)).await;
    assert!(h.controller.animator().is_exhausted());
    assert_eq!(h.controller.state().await.status, SolveStatus::Racing);
    let timeline = h.controller.timeline().await;
    assert_eq!(timeline.cursor(), timeline.len());
    assert!(!all_complete(&timeline));

    task.await.unwrap().unwrap();
    assert!(all_complete(&h.controller.timeline().await));
    assert_eq!(h.history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_submission_is_rejected_while_in_flight() {
    let h = harness(Duration::from_secs(2), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    let controller = h.controller.clone();
    let first = tokio::spawn(async move { controller.solve().await });
    sleep(Duration::from_millis(50)).await;

    let err = h.controller.solve().await.unwrap_err();
    assert!(matches!(err, SolveError::InFlight));
    assert_eq!(h.controller.state().await.status, SolveStatus::Racing);

    first.await.unwrap().unwrap();
    assert_eq!(h.client.calls(), 1);
    assert_eq!(h.history.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn history_holds_the_last_twenty_solves() {
    let h = harness(Duration::from_millis(10), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    for _ in 0..25 {
        h.controller.solve().await.unwrap();
        assert_eq!(
            h.controller.state().await.status,
            SolveStatus::Settled(Settlement::Success)
        );
    }

    assert_eq!(h.history.len(), HISTORY_CAPACITY);
    assert_eq!(h.client.calls(), 25);
}

#[tokio::test(start_paused = true)]
async fn cancel_settles_as_cancelled_failure() {
    let h = harness(Duration::from_secs(30), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.solve().await });
    sleep(Duration::from_millis(1000)).await;

    assert!(h.controller.cancel().await);
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, SolveError::Cancelled));

    let state = h.controller.state().await;
    assert_eq!(state.status, SolveStatus::Settled(Settlement::Failure));
    assert_eq!(state.failure, Some(ErrorKind::Cancelled));
    assert_eq!(h.controller.timeline().await.cursor(), 0);
    assert!(h.history.is_empty());
    assert!(!h.controller.cancel().await);
}

#[tokio::test(start_paused = true)]
async fn dismiss_returns_to_idle_and_keeps_result() {
    let h = harness(Duration::from_millis(100), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;
    h.controller.solve().await.unwrap();

    h.sink.clear();
    h.controller.dismiss().await;

    assert_eq!(h.controller.state().await.status, SolveStatus::Idle);
    let events = h.sink.events();
    assert_eq!(events.first(), Some(&SolverEvent::OverlayHidden));
    assert!(!events.contains(&SolverEvent::ResultCleared));

    // The next submission is what clears the old result.
    h.sink.clear();
    h.controller.solve().await.unwrap();
    assert!(h.sink.events().contains(&SolverEvent::ResultCleared));
}

#[tokio::test(start_paused = true)]
async fn result_is_revealed_character_by_character() {
    let h = harness(Duration::from_millis(100), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;
    h.controller.solve().await.unwrap();

    sleep(Duration::from_secs(1)).await;
    let revealed: String = h
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            SolverEvent::CharRevealed { character, .. } => Some(character),
            _ => None,
        })
        .collect();
    assert_eq!(revealed, "AB3X");
}

#[tokio::test(start_paused = true)]
async fn selecting_a_non_image_file_is_refused() {
    let h = harness(Duration::from_millis(100), Reply::Outcome(ab3x())).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "not an image").unwrap();

    let err = h.controller.select_image_path(&path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!h.controller.has_image().await);
    assert!(h.sink.events().contains(&SolverEvent::notice(
        NoticeLevel::Error,
        "Please drop an image file"
    )));
}

#[tokio::test(start_paused = true)]
async fn dropped_solve_still_settles_and_frees_the_controller() {
    let h = harness(Duration::from_secs(5), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    let abandoned = tokio::time::timeout(Duration::from_millis(500), h.controller.solve()).await;
    assert!(abandoned.is_err());

    sleep(Duration::from_secs(60)).await;
    assert_eq!(
        h.controller.state().await.status,
        SolveStatus::Settled(Settlement::Success)
    );
    assert_eq!(h.history.len(), 1);
    assert!(!h.controller.animator().is_running().await);

    let outcome = h.controller.solve().await.unwrap();
    assert_eq!(outcome.predicted_text, "AB3X");
    assert_eq!(h.client.calls(), 2);
    assert_eq!(h.history.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn dismiss_while_racing_only_hides_the_overlay() {
    let h = harness(Duration::from_secs(2), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.solve().await });
    sleep(Duration::from_millis(500)).await;

    h.sink.clear();
    h.controller.dismiss().await;
    assert_eq!(h.sink.events(), vec![SolverEvent::OverlayHidden]);
    assert_eq!(h.controller.state().await.status, SolveStatus::Racing);
    assert!(h.controller.animator().is_running().await);

    task.await.unwrap().unwrap();
    assert_eq!(
        h.controller.state().await.status,
        SolveStatus::Settled(Settlement::Success)
    );
    assert_eq!(h.history.len(), 1);
    assert!(all_complete(&h.controller.timeline().await));
}

#[tokio::test(start_paused = true)]
async fn cancel_is_honored_as_soon_as_the_attempt_is_busy() {
    let h = harness(Duration::from_secs(30), Reply::Outcome(ab3x())).await;
    h.controller.select_image(png()).await;

    let controller = h.controller.clone();
    let task = tokio::spawn(async move { controller.solve().await });
    while !h.controller.state().await.is_busy() {
        tokio::task::yield_now().await;
    }

    assert!(h.controller.cancel().await);
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, SolveError::Cancelled));
    assert_eq!(h.controller.state().await.failure, Some(ErrorKind::Cancelled));
}
