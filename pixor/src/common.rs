pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use getset::{CopyGetters, Getters};
pub use itertools::Itertools as _;
pub use log::{debug, info, warn};
pub use ndarray::{s, Array1, Array3, Array4, ArrayD, ArrayView3, Axis};
pub use noisy_float::prelude::*;
pub use rand::prelude::*;
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::Borrow,
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
pub use tch::{nn, Device, Kind, Reduction, Tensor};
pub use tch_goodies::TensorExt as _;
pub use tch_tensor_like::TensorLike;
