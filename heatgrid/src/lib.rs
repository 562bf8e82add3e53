// THEORY:
// This file is the main entry point for the `heatgrid` library crate. It follows
// the standard Rust convention of using `lib.rs` to define the public API that
// will be exposed to external consumers (like the `heatgrid_visualizer` web view).
//
// The primary goal is to export the `Dashboard` and its associated data
// structures (`DashboardConfig`, `FrameSink`, `StatusMessage`, etc.) as the
// high-level interface for the whole polling and rendering engine. The building
// blocks (`core_modules`) stay public for callers that only need one piece, such
// as the flat-matrix transformer or the color scale.

pub mod config;
pub mod core_modules;
pub mod dashboard;
pub mod error;

pub use config::DashboardConfig;
pub use core_modules::grid_cell::grid_cell::{transform, GridCell};
pub use core_modules::status::StatusMessage;
pub use dashboard::{Dashboard, DashboardHandle, FrameSink, NullSink, RenderedFrame};
pub use error::{DashboardError, FetchError};

/// Installs the global `tracing` subscriber, honoring `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(default_directive: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
