//! The PIXOR detection network.

mod pixor_model;
mod res_block;

pub use pixor_model::*;
pub use res_block::*;
