// THEORY:
// The `Poller` is the heartbeat of the dashboard. It owns a fixed-interval timer
// and, on every tick, fires one fetch against its `MatrixSource`. It does not wait
// for that fetch to finish before the next tick: every request runs as its own
// task in a `JoinSet`, so a slow producer produces overlapping requests whose
// responses may arrive in any order. There is no deduplication and no
// cancellation of stale requests while the poller runs.
//
// The poller does not render anything. It reports two events per tick over an
// unbounded channel: `Started` the moment a request goes out, and `Finished` with
// the outcome whenever that request resolves. The render loop applies them in
// arrival order, which makes "the last response to resolve wins" fall out
// naturally.
//
// Shutdown is a `watch` flag. When it flips, the timer stops, every in-flight
// fetch is aborted, and the event sender is dropped.

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::core_modules::source::{FetchOutcome, MatrixSource};
use crate::error::FetchError;

/// Monotonic tick number, starting at 1.
pub type TickId = u64;

#[derive(Debug)]
pub enum PollEvent {
    Started {
        tick: TickId,
        at: DateTime<Local>,
    },
    Finished {
        tick: TickId,
        outcome: Result<FetchOutcome, FetchError>,
    },
}

pub struct Poller<S> {
    source: Arc<S>,
    interval: Duration,
}

impl<S: MatrixSource> Poller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source: Arc::new(source),
            interval,
        }
    }

    /// Runs the tick loop on its own task until `shutdown` becomes `true`
    /// or the event receiver goes away.
    pub fn spawn(self, events: mpsc::UnboundedSender<PollEvent>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(events, shutdown))
    }

    async fn run(self, events: mpsc::UnboundedSender<PollEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut tick: TickId = 0;

        info!(source = %self.source.describe(), interval_ms = self.interval.as_millis() as u64, "poller started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    tick += 1;
                    if events.send(PollEvent::Started { tick, at: Local::now() }).is_err() {
                        break;
                    }
                    debug!(tick, in_flight = in_flight.len(), "issuing fetch");

                    let source = Arc::clone(&self.source);
                    let events = events.clone();
                    in_flight.spawn(async move {
                        let outcome = source.fetch().await;
                        if let Err(error) = &outcome {
                            debug!(tick, %error, "fetch failed");
                        }
                        let _ = events.send(PollEvent::Finished { tick, outcome });
                    });
                }
                // Reap finished fetches so the set does not grow without bound.
                Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
            }
        }

        let aborted = in_flight.len();
        in_flight.shutdown().await;
        info!(ticks = tick, aborted, "poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::envelope::{FetchEnvelope, Timestamp};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Answers the first call slowly and later calls immediately.
    struct SlowFirst {
        calls: AtomicU64,
    }

    impl MatrixSource for SlowFirst {
        async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                time::sleep(Duration::from_millis(250)).await;
            }
            Ok(FetchOutcome::Envelope(FetchEnvelope {
                matrix: vec![call as f64],
                timestamp: Timestamp::Millis(0.0),
                message: format!("call {call}"),
            }))
        }

        fn describe(&self) -> String {
            "slow-first".into()
        }
    }

    #[tokio::test]
    async fn ticks_do_not_wait_for_in_flight_fetches() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = Poller::new(SlowFirst { calls: AtomicU64::new(0) }, Duration::from_millis(40));
        let handle = poller.spawn(events_tx, shutdown_rx);

        let mut finished_order = Vec::new();
        while finished_order.len() < 3 {
            match time::timeout(Duration::from_secs(5), events_rx.recv()).await {
                Ok(Some(PollEvent::Finished { tick, .. })) => finished_order.push(tick),
                Ok(Some(PollEvent::Started { .. })) => {}
                other => panic!("poller stalled: {other:?}"),
            }
        }

        // Tick 1 is still sleeping while ticks 2 and 3 complete.
        assert_eq!(&finished_order[..2], &[2, 3]);

        shutdown_tx.send(true).expect("poller listening");
        handle.await.expect("poller exits cleanly");
    }

    #[tokio::test]
    async fn shutdown_aborts_in_flight_and_closes_the_channel() {
        struct Never;
        impl MatrixSource for Never {
            async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
                std::future::pending().await
            }
            fn describe(&self) -> String {
                "never".into()
            }
        }

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Poller::new(Never, Duration::from_millis(10)).spawn(events_tx, shutdown_rx);

        match time::timeout(Duration::from_secs(5), events_rx.recv()).await {
            Ok(Some(PollEvent::Started { tick: 1, .. })) => {}
            other => panic!("expected first tick, got {other:?}"),
        }

        shutdown_tx.send(true).expect("poller listening");
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller stops promptly")
            .expect("poller task joins");

        // Drain whatever ticks slipped in; the channel must then be closed.
        while let Some(event) = events_rx.recv().await {
            assert!(matches!(event, PollEvent::Started { .. }));
        }
    }
}
