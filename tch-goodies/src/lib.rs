//! Extensions to the `tch` tensor type.

mod common;
pub mod tensor;

pub use tensor::*;
