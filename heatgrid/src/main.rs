// Headless runner: polls a source, logs every status change and optionally
// keeps a PNG snapshot of the latest settled frame on disk.

use clap::Parser;
use heatgrid::config::{DEFAULT_MATRIX_URL, DEFAULT_SENSOR_URL};
use heatgrid::core_modules::color_scale::Palette;
use heatgrid::core_modules::utils::image_helper::image_helper;
use heatgrid::dashboard::{AnySource, SourceKind};
use heatgrid::{Dashboard, DashboardConfig, FrameSink, RenderedFrame, StatusMessage};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "heatgrid", about = "Poll a matrix endpoint and render it as a heat grid")]
struct Args {
    /// Which producer to poll.
    #[arg(long, value_enum, default_value_t = SourceKind::Matrix)]
    source: SourceKind,

    #[arg(long, env = "HEATGRID_MATRIX_URL", default_value = DEFAULT_MATRIX_URL)]
    matrix_url: String,

    #[arg(long, env = "HEATGRID_SENSOR_URL", default_value = DEFAULT_SENSOR_URL)]
    sensor_url: String,

    /// Poll interval; also used as the cell transition duration.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// HTTP timeout. Unset means the transport default.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long, value_enum, default_value_t = Palette::Viridis)]
    palette: Palette,

    /// Write every settled frame to this PNG file.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Stop after this many completed polls.
    #[arg(long)]
    polls: Option<u64>,
}

impl Args {
    fn dashboard_config(&self) -> DashboardConfig {
        let interval = Duration::from_millis(self.interval_ms);
        DashboardConfig {
            poll_interval: interval,
            transition: interval,
            matrix_url: self.matrix_url.clone(),
            sensor_url: self.sensor_url.clone(),
            request_timeout: self.timeout_ms.map(Duration::from_millis),
            palette: self.palette,
            ..DashboardConfig::default()
        }
    }
}

/// Saves settled frames and counts finished polls. The render task calls
/// `publish_status` once per status, so the count sees every outcome.
struct SnapshotSink {
    path: Option<PathBuf>,
    completed: watch::Sender<u64>,
}

impl SnapshotSink {
    fn new(path: Option<PathBuf>) -> (Self, watch::Receiver<u64>) {
        let (completed, completed_rx) = watch::channel(0);
        (Self { path, completed }, completed_rx)
    }
}

impl FrameSink for SnapshotSink {
    fn publish_frame(&mut self, frame: &RenderedFrame) {
        let Some(path) = &self.path else { return };
        if !frame.settled {
            return;
        }
        if let Err(error) = image_helper::save(path, &frame.canvas) {
            warn!(path = %path.display(), %error, "failed to write snapshot");
        }
    }

    fn publish_status(&mut self, status: &StatusMessage) {
        info!("{status}");
        if !matches!(status, StatusMessage::Idle | StatusMessage::Fetching { .. }) {
            self.completed.send_modify(|count| *count += 1);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    heatgrid::init_tracing("heatgrid=info");
    let args = Args::parse();

    let config = args.dashboard_config();
    let source = AnySource::from_config(args.source, &config)?;
    let (sink, mut completed) = SnapshotSink::new(args.snapshot.clone());
    let handle = Dashboard::start(config, source, sink);

    let limit_reached = async {
        match args.polls {
            Some(limit) => {
                if completed.wait_for(|count| *count >= limit).await.is_ok() {
                    info!(polls = limit, "poll limit reached");
                }
            }
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = limit_reached => {}
    }

    let binding = handle.stop().await?;
    info!(cells = binding.len(), "done");
    Ok(())
}
