//! Loading pre-tiled images and per-pixel annotations from disk.

mod batch_loader;
mod normalization;
mod npy;

pub use batch_loader::*;
pub use normalization::*;
