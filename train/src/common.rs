//! Common imports from external crates.

pub use anyhow::{bail, ensure, format_err, Context as _, Error, Result};
pub use chrono::{DateTime, Local};
pub use futures::future::{Future, FutureExt as _};
pub use indexmap::IndexMap;
pub use itertools::Itertools as _;
pub use noisy_float::prelude::*;
pub use pixor::{
    dataset::{BatchLoader, BatchLoaderInit, NormStats, PixorBatch},
    loss::{PixorLoss, PixorLossOutput},
    metrics::{ClassMetrics, MetricsAccumulator, PixelMetrics, ScoreConvention},
    model::{PixorModel, PixorModelInit, PixorOutput},
};
pub use rand::{prelude::*, rngs::StdRng};
pub use serde::{Deserialize, Serialize};
pub use std::{
    borrow::{Borrow, Cow},
    fmt,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    sync::Arc,
};
pub use tch::{
    nn::{self, OptimizerConfig as _},
    Device, Kind, Tensor,
};
pub use tch_tensor_like::TensorLike;
pub use tokio::sync::broadcast;
pub use tracing::{debug, info, warn};

pub type Fallible<T> = Result<T, Error>;
