//! Network layers and loss functions shared by the detection models.

mod common;

pub mod conv_2d;
pub mod cross_entropy;
pub mod deconv_2d;
pub mod smooth_l1_loss;
pub mod sum_2d;

pub use conv_2d::*;
pub use cross_entropy::*;
pub use deconv_2d::*;
pub use smooth_l1_loss::*;
pub use sum_2d::*;
pub use tch_act::Activation;
