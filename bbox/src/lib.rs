//! Scalar box geometry used by the tiler.

mod common;

pub use span::*;
pub mod span;

pub use tile_box::*;
pub mod tile_box;
