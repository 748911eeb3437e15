//! Misc utilities.

mod checkpoint;

pub use checkpoint::*;
