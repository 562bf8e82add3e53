// THEORY:
// The `CellBinding` is the dashboard's visual state. It owns one `CellElement` per
// grid coordinate and is the only thing that survives from one poll to the next.
// A poll produces a fresh list of `GridCell`s; binding that list reconciles it
// against the elements that already exist.
//
// Key architectural principles:
// 1.  **Keyed Reconciliation**: Elements are stored in a map keyed by `CellKey`.
//     For every incoming cell, an absent key *enters*: a new element is created at
//     the cell's pixel position with the fixed cell size. A present key *updates*:
//     its target color changes and a transition begins. Keys that stop appearing
//     are left alone; with a constant matrix size none ever do.
// 2.  **Time-Based Transitions**: An element does not store "the" color, it stores
//     a transition: a start color, a target color, a start instant and a duration.
//     The displayed color at any instant is a cubic-in-out blend between the two.
//     Retargeting mid-flight starts the new transition from whatever is on screen.
// 3.  **Explicit Time**: Every method that cares about time takes an `Instant`.
//     The binding never reads the clock itself, which keeps it deterministic under
//     test and lets the render loop decide the frame cadence.
// 4.  **Rasterization**: `rasterize` paints every element into an RGBA canvas.
//     Elements whose rectangles fall outside the canvas (from oversized input
//     matrices) are clipped rather than rejected.

use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::config::DashboardConfig;
use crate::core_modules::color_scale::{ColorScale, Rgb};
use crate::core_modules::grid_cell::grid_cell::{CellKey, GridCell};

pub const BACKGROUND: Rgb = Rgb::new(0x11, 0x11, 0x11);

/// d3-style cubic in-out easing on [0, 1].
pub fn ease_cubic_in_out(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// One rendered cell and its fill transition.
#[derive(Debug, Clone, PartialEq)]
pub struct CellElement {
    pub key: CellKey,
    /// Top-left corner in canvas pixels.
    pub origin: (u64, u64),
    pub size: u32,
    /// The sample that produced the current target color.
    pub value: f64,
    from: Rgb,
    to: Rgb,
    started: Instant,
    duration: Duration,
}

impl CellElement {
    fn enter(cell: &GridCell, size: u32, color: Rgb, now: Instant) -> Self {
        Self {
            key: cell.key(),
            origin: (cell.x as u64 * size as u64, cell.y as u64 * size as u64),
            size,
            value: cell.value,
            from: color,
            to: color,
            started: now,
            duration: Duration::ZERO,
        }
    }

    fn retarget(&mut self, value: f64, target: Rgb, now: Instant, duration: Duration) {
        self.from = self.color_at(now);
        self.to = target;
        self.value = value;
        self.started = now;
        self.duration = duration;
    }

    fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn color_at(&self, now: Instant) -> Rgb {
        self.from.lerp(self.to, ease_cubic_in_out(self.progress(now)))
    }

    pub fn target(&self) -> Rgb {
        self.to
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.progress(now) < 1.0 && self.from != self.to
    }
}

/// How many elements a single `bind` created and how many it retargeted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindReport {
    pub entered: usize,
    pub updated: usize,
}

/// Owns the key → element map for the whole grid.
pub struct CellBinding {
    canvas_size: u32,
    cell_size: u32,
    transition: Duration,
    scale: ColorScale,
    elements: HashMap<CellKey, CellElement>,
}

impl CellBinding {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            canvas_size: config.canvas_size,
            cell_size: config.cell_size(),
            transition: config.transition,
            scale: ColorScale::new(config.value_domain, config.palette),
            elements: HashMap::with_capacity(config.expected_samples()),
        }
    }

    /// Reconciles `cells` against the current elements.
    pub fn bind(&mut self, cells: &[GridCell], now: Instant) -> BindReport {
        let mut report = BindReport::default();

        for cell in cells {
            let target = self.scale.color(cell.value);
            match self.elements.get_mut(&cell.key()) {
                Some(element) => {
                    element.retarget(cell.value, target, now, self.transition);
                    report.updated += 1;
                }
                None => {
                    let element = CellElement::enter(cell, self.cell_size, target, now);
                    self.elements.insert(element.key, element);
                    report.entered += 1;
                }
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, key: &CellKey) -> Option<&CellElement> {
        self.elements.get(key)
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.elements.values().any(|element| element.is_animating(now))
    }

    /// Paints the binding as it looks at `now`.
    pub fn rasterize(&self, now: Instant) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(self.canvas_size, self.canvas_size, Rgba(BACKGROUND.to_rgba()));
        self.render_into(&mut canvas, now);
        canvas
    }

    pub fn render_into(&self, canvas: &mut RgbaImage, now: Instant) {
        let (width, height) = (canvas.width() as u64, canvas.height() as u64);

        for element in self.elements.values() {
            let (left, top) = element.origin;
            if left >= width || top >= height {
                continue;
            }
            let right = (left + element.size as u64).min(width);
            let bottom = (top + element.size as u64).min(height);
            let fill = Rgba(element.color_at(now).to_rgba());

            for py in top..bottom {
                for px in left..right {
                    canvas.put_pixel(px as u32, py as u32, fill);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::grid_cell::grid_cell::{transform, transform_with_width};

    fn small_config() -> DashboardConfig {
        DashboardConfig {
            grid_size: 4,
            canvas_size: 16,
            transition: Duration::from_millis(1000),
            ..DashboardConfig::default()
        }
    }

    #[test]
    fn easing_endpoints_and_midpoint() {
        assert_eq!(ease_cubic_in_out(0.0), 0.0);
        assert_eq!(ease_cubic_in_out(0.5), 0.5);
        assert_eq!(ease_cubic_in_out(1.0), 1.0);
        assert!(ease_cubic_in_out(0.25) < 0.25);
        assert!(ease_cubic_in_out(0.75) > 0.75);
    }

    #[test]
    fn first_bind_enters_every_cell() {
        let config = small_config();
        let mut binding = CellBinding::new(&config);
        let now = Instant::now();

        let report = binding.bind(&transform_with(&config, 0.0), now);

        assert_eq!(report, BindReport { entered: 16, updated: 0 });
        assert_eq!(binding.len(), 16);
        assert!(!binding.is_animating(now));

        let corner = binding.get(&CellKey { x: 3, y: 2 }).expect("entered");
        assert_eq!(corner.origin, (12, 8));
        assert_eq!(corner.size, 4);
    }

    #[test]
    fn second_bind_updates_and_transitions() {
        let config = small_config();
        let scale = ColorScale::new(config.value_domain, config.palette);
        let mut binding = CellBinding::new(&config);
        let start = Instant::now();

        binding.bind(&transform_with(&config, 0.0), start);
        let report = binding.bind(&transform_with(&config, 100.0), start);
        assert_eq!(report, BindReport { entered: 0, updated: 16 });
        assert_eq!(binding.len(), 16);

        let key = CellKey { x: 1, y: 1 };
        let element = binding.get(&key).expect("present");
        assert_eq!(element.color_at(start), scale.color(0.0));
        assert_eq!(element.color_at(start + Duration::from_millis(500)), scale.color(0.0).lerp(scale.color(100.0), 0.5));
        assert_eq!(element.color_at(start + Duration::from_millis(1000)), scale.color(100.0));
        assert_eq!(element.target(), scale.color(100.0));
        assert_eq!(element.value, 100.0);

        assert!(binding.is_animating(start + Duration::from_millis(999)));
        assert!(!binding.is_animating(start + Duration::from_millis(1000)));
    }

    #[test]
    fn retarget_mid_transition_starts_from_displayed_color() {
        let config = small_config();
        let mut binding = CellBinding::new(&config);
        let start = Instant::now();
        let midway = start + Duration::from_millis(500);

        binding.bind(&transform_with(&config, 0.0), start);
        binding.bind(&transform_with(&config, 100.0), start);
        let shown = binding.get(&CellKey { x: 0, y: 0 }).expect("present").color_at(midway);

        binding.bind(&transform_with(&config, 50.0), midway);
        let element = binding.get(&CellKey { x: 0, y: 0 }).expect("present");
        assert_eq!(element.color_at(midway), shown);
    }

    #[test]
    fn rasterize_fills_cells_and_clips_overflow() {
        let config = small_config();
        let scale = ColorScale::new(config.value_domain, config.palette);
        let mut binding = CellBinding::new(&config);
        let now = Instant::now();

        // Two extra samples land on a fifth row, below the canvas.
        let mut flat = vec![100.0; 16];
        flat.extend([0.0, 0.0]);
        binding.bind(&transform_with_width(&flat, 4), now);
        assert_eq!(binding.len(), 18);

        let canvas = binding.rasterize(now);
        assert_eq!(canvas.dimensions(), (16, 16));
        assert_eq!(canvas.get_pixel(0, 0).0, scale.color(100.0).to_rgba());
        assert_eq!(canvas.get_pixel(15, 15).0, scale.color(100.0).to_rgba());
    }

    #[test]
    fn empty_binding_renders_background() {
        let binding = CellBinding::new(&small_config());
        let canvas = binding.rasterize(Instant::now());
        assert!(canvas.pixels().all(|pixel| pixel.0 == BACKGROUND.to_rgba()));
    }

    fn transform_with(config: &DashboardConfig, value: f64) -> Vec<GridCell> {
        transform_with_width(&vec![value; config.expected_samples()], config.grid_size)
    }

    #[test]
    fn full_grid_binds_16384_cells() {
        let config = DashboardConfig::default();
        let mut binding = CellBinding::new(&config);
        let report = binding.bind(&transform(&vec![25.0; 16384]), Instant::now());

        assert_eq!(report.entered, 16384);
        let last = binding.get(&CellKey { x: 127, y: 127 }).expect("entered");
        assert_eq!(last.origin, (508, 508));
    }
}
