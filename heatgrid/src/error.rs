use thiserror::Error;

/// Everything that can end a single poll tick without a render.
///
/// A 204 response is not in here: "no data yet" is an expected outcome and is
/// reported as `FetchOutcome::NoData`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid matrix payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("sensor frame has {actual} bytes, expected {expected}")]
    SensorFrame { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("dashboard task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to write snapshot: {0}")]
    Snapshot(#[from] image::ImageError),
}
