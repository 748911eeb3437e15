use super::npy::read_array;
use crate::common::*;
use ndarray::Zip;

/// Dataset-wide normalization constants.
///
/// Each array broadcasts against the trailing dimensions of the data it
/// applies to, so a scalar, a per-channel vector or a full per-pixel array
/// are all accepted.
#[derive(Debug, Clone)]
pub struct NormStats {
    image_mean: ArrayD<f32>,
    image_std: ArrayD<f32>,
    box_mean: ArrayD<f32>,
    box_std: ArrayD<f32>,
}

impl NormStats {
    pub const IMAGE_MEAN_FILE: &'static str = "mean.npy";
    pub const IMAGE_STD_FILE: &'static str = "std.npy";
    pub const BOX_MEAN_FILE: &'static str = "train_mean.npy";
    pub const BOX_STD_FILE: &'static str = "train_std.npy";

    pub fn new(
        image_mean: ArrayD<f32>,
        image_std: ArrayD<f32>,
        box_mean: ArrayD<f32>,
        box_std: ArrayD<f32>,
    ) -> Result<Self> {
        ensure!(
            image_std.iter().chain(box_std.iter()).all(|&std| std != 0.0),
            "standard deviations must be non-zero"
        );
        ensure!(
            [&image_mean, &image_std, &box_mean, &box_std]
                .iter()
                .all(|array| array.iter().all(|value| value.is_finite())),
            "normalization constants must be finite"
        );

        Ok(Self {
            image_mean,
            image_std,
            box_mean,
            box_std,
        })
    }

    /// Loads the four constants from the `.npy` files in `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let load = |name: &str| -> Result<ArrayD<f32>> {
            Ok(read_array(&dir.join(name))?.mapv(|value| value as f32))
        };

        let stats = Self::new(
            load(Self::IMAGE_MEAN_FILE)?,
            load(Self::IMAGE_STD_FILE)?,
            load(Self::BOX_MEAN_FILE)?,
            load(Self::BOX_STD_FILE)?,
        )?;
        info!("loaded normalization constants from '{}'", dir.display());
        Ok(stats)
    }

    /// Computes `(pixel - mean) / std`.
    pub fn normalize_image(&self, image: &Array3<f32>) -> Result<Array3<f32>> {
        let mean = broadcast(&self.image_mean, image, "image mean")?;
        let std = broadcast(&self.image_std, image, "image std")?;
        Ok((image - &mean) / &std)
    }

    /// Normalizes the box channels of positive pixels to
    /// `(box - mean) / std`. Background pixels keep their raw values.
    ///
    /// `classes` has shape `[height, width, 1]`, `boxes` has shape
    /// `[height, width, channels]`.
    pub fn normalize_boxes(&self, boxes: &Array3<f32>, classes: &Array3<i64>) -> Result<Array3<f32>> {
        let mean = broadcast(&self.box_mean, boxes, "box mean")?;
        let std = broadcast(&self.box_std, boxes, "box std")?;
        let classes = classes.broadcast(boxes.dim()).ok_or_else(|| {
            format_err!(
                "class map of shape {:?} does not match boxes of shape {:?}",
                classes.shape(),
                boxes.shape()
            )
        })?;

        let mut output = boxes.clone();
        Zip::from(&mut output)
            .and(&classes)
            .and(&mean)
            .and(&std)
            .for_each(|value, &class, &mean, &std| {
                let positive = class.clamp(0, 1) as f32;
                *value = positive * (*value - mean) / std + (1.0 - positive) * *value;
            });
        Ok(output)
    }
}

fn broadcast<'a>(
    constant: &'a ArrayD<f32>,
    data: &Array3<f32>,
    name: &str,
) -> Result<ndarray::ArrayView3<'a, f32>> {
    constant.broadcast(data.dim()).ok_or_else(|| {
        format_err!(
            "{} of shape {:?} cannot broadcast to shape {:?}",
            name,
            constant.shape(),
            data.shape()
        )
    })
}
