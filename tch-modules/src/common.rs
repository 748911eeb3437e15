pub use anyhow::{bail, ensure, format_err, Result};
pub use itertools::Itertools;
pub use std::borrow::Borrow;
pub use tch::{nn, Device, Kind, Reduction, Tensor};
pub use tch_act::{Activation, TensorActivationExt as _};
