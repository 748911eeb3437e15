//! The building blocks of the PIXOR detection model over tiled imagery.

mod common;
pub mod codec;
pub mod dataset;
pub mod loss;
pub mod metrics;
pub mod model;
pub mod tile;
