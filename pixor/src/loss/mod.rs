//! Classification and box regression losses of the PIXOR model.

mod config;
mod pixor_loss;

pub use config::*;
pub use pixor_loss::*;
