pub mod cell_binding;
pub mod color_scale;
pub mod envelope;
pub mod grid_cell;
pub mod poller;
pub mod sensor_frame;
pub mod source;
pub mod status;
pub mod synthetic;
pub mod utils;
