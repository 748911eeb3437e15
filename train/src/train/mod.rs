//! The training loop.

mod phase;
mod worker;

pub use phase::*;
pub use worker::*;
