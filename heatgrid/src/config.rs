use std::time::Duration;

use crate::core_modules::color_scale::Palette;

/// Width and height of the sample matrix.
pub const GRID_SIZE: usize = 128;
/// Number of samples in one full matrix.
pub const EXPECTED_ARRAY_SIZE: usize = GRID_SIZE * GRID_SIZE;
/// Side length of the rendered canvas in pixels.
pub const CANVAS_SIZE: u32 = 512;
/// Side length of one rendered cell in pixels.
pub const CELL_SIZE: u32 = CANVAS_SIZE / GRID_SIZE as u32;

pub const POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const FRAME_INTERVAL: Duration = Duration::from_millis(50);

pub const DEFAULT_MATRIX_URL: &str = "http://127.0.0.1:5000/latest_matrix";
pub const DEFAULT_SENSOR_URL: &str = "http://127.0.0.1:5000/sensor_data";

/// Configuration for the `Dashboard`, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Samples per matrix row.
    pub grid_size: usize,
    /// Canvas side length in pixels. Cells are `canvas_size / grid_size` wide.
    pub canvas_size: u32,
    /// Time between poll ticks. Ticks fire whether or not earlier fetches finished.
    pub poll_interval: Duration,
    /// How long a cell takes to fade from its old color to its new one.
    pub transition: Duration,
    /// How often the canvas is rasterized while cells are animating.
    pub frame_interval: Duration,
    pub matrix_url: String,
    /// Binary sensor endpoint. Only read by the sensor source.
    pub sensor_url: String,
    /// Optional HTTP client timeout. `None` leaves the transport default in place.
    pub request_timeout: Option<Duration>,
    /// Lower and upper bound of the color scale's input domain.
    pub value_domain: (f64, f64),
    pub palette: Palette,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            canvas_size: CANVAS_SIZE,
            poll_interval: POLL_INTERVAL,
            transition: POLL_INTERVAL,
            frame_interval: FRAME_INTERVAL,
            matrix_url: DEFAULT_MATRIX_URL.to_string(),
            sensor_url: DEFAULT_SENSOR_URL.to_string(),
            request_timeout: None,
            value_domain: (0.0, 100.0),
            palette: Palette::Viridis,
        }
    }
}

impl DashboardConfig {
    pub fn cell_size(&self) -> u32 {
        if self.grid_size == 0 {
            return self.canvas_size;
        }
        (self.canvas_size / self.grid_size as u32).max(1)
    }

    pub fn expected_samples(&self) -> usize {
        self.grid_size * self.grid_size
    }
}
