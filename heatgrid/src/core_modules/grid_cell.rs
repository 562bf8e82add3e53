// THEORY:
// The `GridCell` module is the most fundamental unit of the dashboard. A sample
// matrix arrives as a flat, row-major sequence of numbers; before anything can be
// drawn, each number has to learn where it lives on the grid. This module performs
// that unraveling and nothing else.
//
// Key architectural principles:
// 1.  **Pure Transformation**: `transform` is a function from a slice to a fresh
//     `Vec<GridCell>`. It reads no state, writes no state, and returns the same
//     output for the same input every time.
// 2.  **Faithful Pass-Through**: Values are copied bit for bit. No clamping, no
//     rounding, no range checks. A value of 3.14159 stays 3.14159, and a value of
//     250.0 stays 250.0 even though the color scale only cares about [0, 100].
// 3.  **Caller-Sized Input**: The transformer does not insist on N² samples. A
//     short or long matrix still unravels with the same formula; coordinates past
//     the last row are valid output and the rendering layer decides what to do
//     with them.
// 4.  **Data Container**: Like `Chunk` in a frame pipeline, `GridCell` is a "dumb"
//     record. It knows its coordinates and value and how to name its key. It does
//     not know its color.

pub mod grid_cell {
    use serde::Serialize;
    use std::fmt;

    use crate::config::GRID_SIZE;

    /// The rendering identity of a cell: its `(x, y)` coordinate pair.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct CellKey {
        pub x: usize,
        pub y: usize,
    }

    impl fmt::Display for CellKey {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}-{}", self.x, self.y)
        }
    }

    /// A single sample tagged with its grid coordinates.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct GridCell {
        /// Column index, `index mod N`.
        pub x: usize,
        /// Row index, `floor(index / N)`.
        pub y: usize,
        /// The sample exactly as it appeared in the flat matrix.
        pub value: f64,
    }

    impl GridCell {
        pub fn key(&self) -> CellKey {
            CellKey { x: self.x, y: self.y }
        }
    }

    /// Unravels a flat row-major matrix into coordinate-tagged cells on the
    /// standard `GRID_SIZE`-wide grid.
    pub fn transform(flat: &[f64]) -> Vec<GridCell> {
        transform_with_width(flat, GRID_SIZE)
    }

    /// Unravels `flat` assuming rows of `width` samples.
    ///
    /// A `width` of zero has no rows to wrap into; every sample is placed on
    /// row zero at its own index.
    pub fn transform_with_width(flat: &[f64], width: usize) -> Vec<GridCell> {
        if width == 0 {
            return flat
                .iter()
                .enumerate()
                .map(|(index, &value)| GridCell { x: index, y: 0, value })
                .collect();
        }

        flat.iter()
            .enumerate()
            .map(|(index, &value)| GridCell {
                x: index % width,
                y: index / width,
                value,
            })
            .collect()
    }
}
