pub use anyhow::{format_err, Result};
pub use std::borrow::Borrow;
pub use tch::{Device, Kind, Tensor};
