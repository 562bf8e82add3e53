// THEORY:
// The synthetic generator stands in for the microcontroller when no live feed is
// available. Every frame picks a random "hot spot" and lets the value fall off
// linearly with distance from it, so the dashboard shows a bright blob that
// jumps around the grid once per poll.
//
//     value(x, y) = max(0, 100 - 1.3 * distance((x, y), center))
//
// The center is drawn uniformly from [30, 90] on both axes. Values are quantized
// to tenths so a synthetic frame looks exactly like one that crossed the binary
// sensor wire.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use crate::core_modules::envelope::{FetchEnvelope, Timestamp};
use crate::core_modules::sensor_frame::sensor_frame::quantize;
use crate::core_modules::source::{FetchOutcome, MatrixSource};
use crate::error::FetchError;

const CENTER_MIN: usize = 30;
const CENTER_MAX: usize = 90;
const PEAK: f64 = 100.0;
const FALLOFF_PER_CELL: f64 = 1.3;

pub const SYNTHETIC_MESSAGE: &str = "Synthetic generator";

/// Fills a `grid_size`² row-major matrix with a radial falloff around `center`.
pub fn radial_falloff(grid_size: usize, center: (usize, usize)) -> Vec<f64> {
    let (cx, cy) = (center.0 as f64, center.1 as f64);
    (0..grid_size * grid_size)
        .map(|index| {
            let x = (index % grid_size) as f64;
            let y = (index / grid_size) as f64;
            let distance = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            quantize((PEAK - distance * FALLOFF_PER_CELL).max(0.0))
        })
        .collect()
}

/// An offline `MatrixSource` that never fails and never reports "no data".
pub struct SyntheticSource {
    grid_size: usize,
    rng: Mutex<StdRng>,
}

impl SyntheticSource {
    pub fn new(grid_size: usize) -> Self {
        Self {
            grid_size,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(grid_size: usize, seed: u64) -> Self {
        Self {
            grid_size,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn next_center(&self) -> (usize, usize) {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (
            rng.gen_range(CENTER_MIN..=CENTER_MAX),
            rng.gen_range(CENTER_MIN..=CENTER_MAX),
        )
    }

    pub fn next_envelope(&self) -> FetchEnvelope {
        let center = self.next_center();
        FetchEnvelope {
            matrix: radial_falloff(self.grid_size, center),
            timestamp: Timestamp::now(),
            message: SYNTHETIC_MESSAGE.to_string(),
        }
    }
}

impl MatrixSource for SyntheticSource {
    async fn fetch(&self) -> Result<FetchOutcome, FetchError> {
        Ok(FetchOutcome::Envelope(self.next_envelope()))
    }

    fn describe(&self) -> String {
        format!("synthetic {0}x{0} generator", self.grid_size)
    }
}
