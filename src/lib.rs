//! Batch rendering of escape-time fractals on a pool of workers.

pub mod canvas;
pub mod options;
pub mod pgm;
pub mod view;

pub use canvas::{Canvas, Tile};
pub use options::Options;
pub use view::View;
