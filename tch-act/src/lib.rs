#[cfg(feature = "tch")]
mod impls;

#[cfg(feature = "tch")]
pub use r#trait::*;
#[cfg(feature = "tch")]
mod r#trait;

/// Element-wise activation applied after a convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activation {
    /// Identity. Used by output heads that emit raw logits.
    Linear,
    Relu,
}

impl Default for Activation {
    fn default() -> Self {
        Self::Relu
    }
}
