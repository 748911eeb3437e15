pub use anyhow::{ensure, format_err, Result};
pub use num_traits::Num;
