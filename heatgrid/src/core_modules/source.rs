// THEORY:
// A `MatrixSource` is anything the poller can ask for "the latest matrix". The
// trait is the seam between the dashboard's timing logic and the outside world:
// the poller never knows whether a matrix came from the JSON endpoint, the
// binary sensor endpoint, or the offline generator.
//
// Every fetch resolves to one of three shapes:
// - `Ok(FetchOutcome::Envelope(..))`: a matrix to render.
// - `Ok(FetchOutcome::NoData)`: the producer is up but has nothing yet (HTTP 204).
//   This is an expected state, not a failure.
// - `Err(FetchError)`: an HTTP error status, a transport failure, or a payload
//   that could not be decoded.
//
// HTTP sources share one `reqwest::Client`. No timeout is set unless the
// configuration asks for one, so a slow producer leaves requests in flight and
// later ticks simply overlap them.

use reqwest::StatusCode;
use std::future::Future;
use tracing::debug;

use crate::config::DashboardConfig;
use crate::core_modules::envelope::{FetchEnvelope, Timestamp};
use crate::core_modules::sensor_frame::sensor_frame;
use crate::core_modules::synthetic::SyntheticSource;
use crate::error::{DashboardError, FetchError};

pub const SENSOR_MESSAGE: &str = "Synthetic sensor frame";

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    NoData,
    Envelope(FetchEnvelope),
}

pub trait MatrixSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<FetchOutcome, FetchError>> + Send;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Which producer the dashboard should poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SourceKind {
    /// JSON envelopes from the matrix endpoint.
    #[default]
    Matrix,
    /// Binary int16 frames from the sensor endpoint.
    Sensor,
    /// Locally generated frames, no network.
    Synthetic,
}

pub fn build_client(config: &DashboardConfig) -> Result<reqwest::Client, DashboardError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.request_timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(DashboardError::Client)
}

/// Issues the GET and maps the status line. `None` means 204.
async fn get_body(client: &reqwest::Client, url: &str) -> Result<Option<Vec<u8>>, FetchError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    debug!(url, status = status.as_u16(), "matrix endpoint responded");

    if status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(FetchError::Http {
            status: status.as_u16(),
        });
    }
    Ok(Some(response.bytes().await?.to_vec()))
}

/// Polls the JSON matrix endpoint.
#[derive(Clone)]
pub struct HttpMatrixSource {
    client: reqwest::Client,
    url: String,
}

impl HttpMatrixSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl MatrixSource for HttpMatrixSource {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        match get_body(&self.client, &self.url).await? {
            None => Ok(FetchOutcome::NoData),
            Some(body) => Ok(FetchOutcome::Envelope(FetchEnvelope::from_slice(&body)?)),
        }
    }

    fn describe(&self) -> String {
        format!("matrix endpoint {}", self.url)
    }
}

/// Polls the binary sensor endpoint and wraps each frame in an envelope.
#[derive(Clone)]
pub struct HttpSensorSource {
    client: reqwest::Client,
    url: String,
    samples: usize,
}

impl HttpSensorSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>, samples: usize) -> Self {
        Self {
            client,
            url: url.into(),
            samples,
        }
    }
}

impl MatrixSource for HttpSensorSource {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        let Some(body) = get_body(&self.client, &self.url).await? else {
            return Ok(FetchOutcome::NoData);
        };
        let matrix = sensor_frame::decode(&body, self.samples)?;
        Ok(FetchOutcome::Envelope(FetchEnvelope {
            matrix,
            timestamp: Timestamp::now(),
            message: SENSOR_MESSAGE.to_string(),
        }))
    }

    fn describe(&self) -> String {
        format!("sensor endpoint {}", self.url)
    }
}

/// Static dispatch over the built-in sources.
pub enum AnySource {
    Matrix(HttpMatrixSource),
    Sensor(HttpSensorSource),
    Synthetic(SyntheticSource),
}

impl AnySource {
    pub fn from_config(kind: SourceKind, config: &DashboardConfig) -> Result<Self, DashboardError> {
        Ok(match kind {
            SourceKind::Matrix => {
                AnySource::Matrix(HttpMatrixSource::new(build_client(config)?, &config.matrix_url))
            }
            SourceKind::Sensor => AnySource::Sensor(HttpSensorSource::new(
                build_client(config)?,
                &config.sensor_url,
                config.expected_samples(),
            )),
            SourceKind::Synthetic => AnySource::Synthetic(SyntheticSource::new(config.grid_size)),
        })
    }
}

impl MatrixSource for AnySource {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        match self {
            AnySource::Matrix(source) => source.fetch().await,
            AnySource::Sensor(source) => source.fetch().await,
            AnySource::Synthetic(source) => source.fetch().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            AnySource::Matrix(source) => source.describe(),
            AnySource::Sensor(source) => source.describe(),
            AnySource::Synthetic(source) => source.describe(),
        }
    }
}
