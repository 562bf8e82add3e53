// THEORY:
// The `dashboard` module is the top-level API of the crate. It wires the whole
// flow into one object with an explicit lifecycle:
//
//     timer tick → fetch → decode → transform → bind + status → animated frames
//
// `Dashboard::start` spawns two tasks. The poller task owns the timer and the
// in-flight requests. The render task owns everything visual: the `CellBinding`,
// the current `StatusMessage`, and the `FrameSink` that frames are published to.
// Only the render task ever touches the binding, so there is no locking around
// it. `DashboardHandle::stop` flips a shutdown flag that both tasks watch, waits
// for them, and hands the released binding back to the caller.
//
// Frames are not drawn on the poll cadence. After a bind the render task
// rasterizes on a faster animation timer until every cell's transition has
// finished, flags that last frame as `settled`, and then goes quiet until the
// next successful poll.

use image::RgbaImage;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::DashboardConfig;
use crate::core_modules::cell_binding::CellBinding;
use crate::core_modules::grid_cell::grid_cell::transform_with_width;
use crate::core_modules::poller::{PollEvent, Poller};
use crate::core_modules::source::{FetchOutcome, MatrixSource};
use crate::core_modules::status::StatusMessage;
use crate::error::DashboardError;

// Re-export key data structures for the public API.
pub use crate::core_modules::cell_binding::{BindReport, CellElement};
pub use crate::core_modules::envelope::{FetchEnvelope, Timestamp};
pub use crate::core_modules::grid_cell::grid_cell::{CellKey, GridCell};
pub use crate::core_modules::source::{AnySource, SourceKind};
pub use crate::core_modules::status::SourceLabel;

/// One rasterized view of the grid.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub canvas: RgbaImage,
    pub ts_millis: u64,
    /// `true` once no cell is mid-transition.
    pub settled: bool,
}

/// Where the render task sends its output.
pub trait FrameSink: Send + 'static {
    fn publish_frame(&mut self, frame: &RenderedFrame);
    fn publish_status(&mut self, status: &StatusMessage);
}

/// Discards everything. Status is still observable through the handle.
pub struct NullSink;

impl FrameSink for NullSink {
    fn publish_frame(&mut self, _frame: &RenderedFrame) {}
    fn publish_status(&mut self, _status: &StatusMessage) {}
}

/// The render-side state of a running dashboard.
pub struct Dashboard<K> {
    config: DashboardConfig,
    binding: CellBinding,
    sink: K,
    status_tx: watch::Sender<StatusMessage>,
    needs_frame: bool,
}

impl<K: FrameSink> Dashboard<K> {
    /// Starts polling `source` and rendering into `sink`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S: MatrixSource>(config: DashboardConfig, source: S, sink: K) -> DashboardHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(StatusMessage::Idle);

        info!(
            source = %source.describe(),
            grid = config.grid_size,
            canvas = config.canvas_size,
            poll_ms = config.poll_interval.as_millis() as u64,
            "starting dashboard"
        );

        let poller = Poller::new(source, config.poll_interval).spawn(events_tx, shutdown_rx.clone());
        let dashboard = Dashboard {
            binding: CellBinding::new(&config),
            config,
            sink,
            status_tx,
            needs_frame: false,
        };
        let renderer = tokio::spawn(dashboard.run(events_rx, shutdown_rx));

        DashboardHandle {
            shutdown: shutdown_tx,
            status: status_rx,
            poller,
            renderer,
        }
    }

    async fn run(mut self, mut events: mpsc::UnboundedReceiver<PollEvent>, mut shutdown: watch::Receiver<bool>) -> CellBinding {
        let mut frames = time::interval(self.config.frame_interval.max(Duration::from_millis(1)));
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.apply(event),
                    None => break,
                },
                _ = frames.tick(), if self.needs_frame => self.render_frame(),
            }
        }

        debug!(cells = self.binding.len(), "render loop stopped");
        self.binding
    }

    fn apply(&mut self, event: PollEvent) {
        match event {
            PollEvent::Started { at, .. } => self.set_status(StatusMessage::Fetching { at }),
            PollEvent::Finished { tick, outcome } => match outcome {
                Ok(FetchOutcome::NoData) => self.set_status(StatusMessage::WaitingForData),
                Ok(FetchOutcome::Envelope(envelope)) => {
                    let report = self.render_envelope(&envelope);
                    debug!(tick, entered = report.entered, updated = report.updated, "matrix bound");
                    self.set_status(StatusMessage::live(&envelope));
                }
                Err(error) => self.set_status(StatusMessage::error(error)),
            },
        }
    }

    fn render_envelope(&mut self, envelope: &FetchEnvelope) -> BindReport {
        let expected = self.config.expected_samples();
        if envelope.matrix.len() != expected {
            warn!(expected, actual = envelope.matrix.len(), "matrix size does not match the grid");
        }

        let cells = transform_with_width(&envelope.matrix, self.config.grid_size);
        let report = self.binding.bind(&cells, Instant::now());
        self.needs_frame = true;
        report
    }

    fn render_frame(&mut self) {
        let now = Instant::now();
        let settled = !self.binding.is_animating(now);
        let frame = RenderedFrame {
            canvas: self.binding.rasterize(now),
            ts_millis: chrono::Local::now().timestamp_millis().max(0) as u64,
            settled,
        };
        self.sink.publish_frame(&frame);
        if settled {
            self.needs_frame = false;
        }
    }

    fn set_status(&mut self, status: StatusMessage) {
        match &status {
            StatusMessage::Error { message } => warn!(%message, "status"),
            other => debug!(status = %other, "status"),
        }
        self.sink.publish_status(&status);
        self.status_tx.send_replace(status);
    }
}

/// Owner of a running dashboard. Dropping it also ends both tasks, but the
/// binding is discarded instead of returned.
pub struct DashboardHandle {
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<StatusMessage>,
    poller: JoinHandle<()>,
    renderer: JoinHandle<CellBinding>,
}

impl DashboardHandle {
    pub fn status(&self) -> watch::Receiver<StatusMessage> {
        self.status.clone()
    }

    pub fn current_status(&self) -> StatusMessage {
        self.status.borrow().clone()
    }

    /// Cancels the timer, aborts in-flight fetches and returns the binding.
    pub async fn stop(self) -> Result<CellBinding, DashboardError> {
        let _ = self.shutdown.send(true);
        self.poller.await?;
        let binding = self.renderer.await?;
        info!(cells = binding.len(), "dashboard stopped");
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays a fixed list of outcomes, repeating the last one forever.
    struct Scripted {
        outcomes: Mutex<VecDeque<Result<FetchOutcome, FetchError>>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<Result<FetchOutcome, FetchError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
            }
        }
    }

    impl MatrixSource for Scripted {
        async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
            let mut outcomes = self.outcomes.lock().expect("script lock");
            if outcomes.len() > 1 {
                outcomes.pop_front().expect("non-empty")
            } else {
                match outcomes.front() {
                    Some(Ok(outcome)) => Ok(outcome.clone()),
                    Some(Err(FetchError::Http { status })) => Err(FetchError::Http { status: *status }),
                    _ => Ok(FetchOutcome::NoData),
                }
            }
        }

        fn describe(&self) -> String {
            "scripted".into()
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        statuses: Arc<Mutex<Vec<StatusMessage>>>,
        frames: Arc<Mutex<Vec<(bool, [u8; 4])>>>,
    }

    impl FrameSink for Recorder {
        fn publish_frame(&mut self, frame: &RenderedFrame) {
            let corner = frame.canvas.get_pixel(0, 0).0;
            self.frames.lock().expect("frames lock").push((frame.settled, corner));
        }

        fn publish_status(&mut self, status: &StatusMessage) {
            self.statuses.lock().expect("status lock").push(status.clone());
        }
    }

    fn fast_config() -> DashboardConfig {
        DashboardConfig {
            grid_size: 8,
            canvas_size: 32,
            poll_interval: Duration::from_millis(30),
            transition: Duration::from_millis(20),
            frame_interval: Duration::from_millis(5),
            ..DashboardConfig::default()
        }
    }

    fn envelope(value: f64, message: &str) -> Result<FetchOutcome, FetchError> {
        Ok(FetchOutcome::Envelope(FetchEnvelope {
            matrix: vec![value; 64],
            timestamp: Timestamp::Millis(0.0),
            message: message.into(),
        }))
    }

    async fn wait_until(recorder: &Recorder, predicate: impl Fn(&[StatusMessage]) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if predicate(&recorder.statuses.lock().expect("status lock")) {
                return;
            }
            time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached; statuses: {:?}", recorder.statuses.lock().expect("status lock"));
    }

    #[tokio::test]
    async fn live_matrix_is_bound_and_rendered() {
        let recorder = Recorder::default();
        let source = Scripted::new(vec![envelope(0.0, "live UDP data"), envelope(100.0, "live UDP data")]);
        let handle = Dashboard::start(fast_config(), source, recorder.clone());

        wait_until(&recorder, |statuses| statuses.iter().filter(|s| s.is_live()).count() >= 3).await;
        let binding = handle.stop().await.expect("clean stop");

        assert_eq!(binding.len(), 64);
        let statuses = recorder.statuses.lock().expect("status lock");
        assert!(matches!(statuses[0], StatusMessage::Fetching { .. }));
        assert!(statuses.contains(&StatusMessage::Live {
            timestamp: Timestamp::Millis(0.0).display_time(),
            source: SourceLabel::UdpStream,
        }));

        let frames = recorder.frames.lock().expect("frames lock");
        assert!(frames.iter().any(|(settled, _)| *settled));
    }

    #[tokio::test]
    async fn no_data_waits_without_rendering() {
        let recorder = Recorder::default();
        let handle = Dashboard::start(fast_config(), Scripted::new(vec![Ok(FetchOutcome::NoData)]), recorder.clone());

        wait_until(&recorder, |statuses| statuses.contains(&StatusMessage::WaitingForData)).await;
        assert_ne!(handle.current_status().state(), "error");
        let binding = handle.stop().await.expect("clean stop");

        assert!(binding.is_empty());
        assert!(recorder.frames.lock().expect("frames lock").is_empty());
    }

    #[tokio::test]
    async fn errors_are_reported_and_polling_continues() {
        let recorder = Recorder::default();
        let source = Scripted::new(vec![
            Err(FetchError::Http { status: 500 }),
            envelope(42.0, "fallback"),
        ]);
        let handle = Dashboard::start(fast_config(), source, recorder.clone());

        wait_until(&recorder, |statuses| statuses.iter().any(StatusMessage::is_live)).await;
        handle.stop().await.expect("clean stop");

        let statuses = recorder.statuses.lock().expect("status lock");
        let error_at = statuses
            .iter()
            .position(|s| s == &StatusMessage::error("HTTP error! status: 500"))
            .expect("error surfaced");
        let live_at = statuses.iter().position(StatusMessage::is_live).expect("recovered");
        assert!(error_at < live_at);
        assert!(statuses.iter().any(|s| matches!(
            s,
            StatusMessage::Live { source: SourceLabel::SyntheticFallback, .. }
        )));
    }

    #[tokio::test]
    async fn handle_exposes_status_watch() {
        let handle = Dashboard::start(fast_config(), Scripted::new(vec![Ok(FetchOutcome::NoData)]), NullSink);
        let mut status = handle.status();

        time::timeout(Duration::from_secs(5), status.wait_for(|s| *s == StatusMessage::WaitingForData))
            .await
            .expect("status reached in time")
            .expect("sender alive");

        handle.stop().await.expect("clean stop");
    }

    /// First call answers late with 0.0, second answers at once with 100.0,
    /// later calls never resolve.
    struct StaleFirst {
        calls: std::sync::atomic::AtomicU64,
    }

    impl MatrixSource for StaleFirst {
        async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
            match self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) {
                0 => {
                    time::sleep(Duration::from_millis(200)).await;
                    envelope(0.0, "stale")
                }
                1 => envelope(100.0, "fresh"),
                _ => std::future::pending().await,
            }
        }

        fn describe(&self) -> String {
            "stale-first".into()
        }
    }

    #[tokio::test]
    async fn last_response_to_resolve_is_what_stays_bound() {
        let recorder = Recorder::default();
        let config = DashboardConfig {
            poll_interval: Duration::from_millis(50),
            ..fast_config()
        };
        let scale = crate::core_modules::color_scale::ColorScale::new(config.value_domain, config.palette);
        let source = StaleFirst {
            calls: std::sync::atomic::AtomicU64::new(0),
        };
        let handle = Dashboard::start(config, source, recorder.clone());

        wait_until(&recorder, |statuses| statuses.iter().filter(|s| s.is_live()).count() >= 2).await;
        let binding = handle.stop().await.expect("clean stop");

        let cell = binding.get(&CellKey { x: 0, y: 0 }).expect("cell bound");
        assert_eq!(cell.value, 0.0);
        assert_eq!(cell.target(), scale.color(0.0));
        assert_ne!(cell.target(), scale.color(100.0));
    }
}
