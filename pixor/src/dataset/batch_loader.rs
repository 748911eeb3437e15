use super::{
    npy::{read_array, read_integer_array},
    NormStats,
};
use crate::common::*;
use crate::codec::ENCODING_CHANNELS;
use ndarray::{Dimension, Ix3};

pub const IMAGE_DIR: &str = "images";
pub const CLASS_DIR: &str = "class_annotations";
pub const BOX_DIR: &str = "box_annotations";

const IMAGE_CHANNELS: usize = 3;

/// One normalized tile with its per-pixel labels.
#[derive(Debug, Clone)]
pub struct Sample {
    /// `[tile_size, tile_size, 3]`
    pub image: Array3<f32>,
    /// `[tile_size, tile_size, 6]`
    pub boxes: Array3<f32>,
    /// `[tile_size, tile_size, 1]`
    pub classes: Array3<i64>,
}

/// A channels-last batch on the CPU.
#[derive(Debug, TensorLike)]
pub struct PixorBatch {
    /// `[batch, tile_size, tile_size, 3]`, `f32`
    pub images: Tensor,
    /// `[batch, tile_size, tile_size, 6]`, `f32`
    pub boxes: Tensor,
    /// `[batch, tile_size, tile_size, 1]`, `i64`
    pub classes: Tensor,
}

#[derive(Debug, Clone)]
pub struct BatchLoaderInit {
    pub tile_size: usize,
    pub num_classes: usize,
    pub normalize_boxes: bool,
}

impl BatchLoaderInit {
    /// Opens a dataset directory laid out as
    /// `images/<index>.jpg`, `class_annotations/<index>.npy` and
    /// `box_annotations/<index>.npy`, with indices `0..len`.
    pub fn build(self, root: impl AsRef<Path>, stats: Arc<NormStats>) -> Result<BatchLoader> {
        let Self {
            tile_size,
            num_classes,
            normalize_boxes,
        } = self;
        let root = root.as_ref().to_owned();
        ensure!(tile_size > 0, "tile_size must be positive");
        ensure!(num_classes > 0, "num_classes must be positive");

        let image_dir = root.join(IMAGE_DIR);
        let num_samples = fs::read_dir(&image_dir)
            .with_context(|| format!("unable to list '{}'", image_dir.display()))?
            .count();
        info!(
            "found {} samples in '{}'",
            num_samples,
            image_dir.display()
        );

        Ok(BatchLoader {
            root,
            tile_size,
            num_classes,
            normalize_boxes,
            stats,
            index_pool: (0..num_samples).collect(),
        })
    }
}

/// Assembles fixed-size batches of tiles and labels from disk.
///
/// The loader is read-only apart from the order of its index pool, which
/// only changes through [BatchLoader::shuffle].
#[derive(Debug, Getters, CopyGetters)]
pub struct BatchLoader {
    #[getset(get = "pub")]
    root: PathBuf,
    #[getset(get_copy = "pub")]
    tile_size: usize,
    #[getset(get_copy = "pub")]
    num_classes: usize,
    normalize_boxes: bool,
    stats: Arc<NormStats>,
    index_pool: Vec<usize>,
}

impl BatchLoader {
    pub fn len(&self) -> usize {
        self.index_pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_pool.is_empty()
    }

    pub fn index_pool(&self) -> &[usize] {
        &self.index_pool
    }

    /// The number of full batches. A trailing partial batch is dropped.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        if batch_size == 0 {
            0
        } else {
            self.len() / batch_size
        }
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.index_pool.shuffle(rng);
    }

    /// Loads the sample with the given file index.
    pub fn get_tile_and_label(&self, index: usize) -> Result<Sample> {
        let tile_size = self.tile_size;

        let image = {
            let path = self.root.join(IMAGE_DIR).join(format!("{}.jpg", index));
            let image = image::open(&path)
                .with_context(|| format!("unable to open image '{}'", path.display()))?
                .to_rgb8();
            let (width, height) = image.dimensions();
            let image = Array3::from_shape_vec(
                (height as usize, width as usize, IMAGE_CHANNELS),
                image.into_raw(),
            )?
            .mapv(f32::from);
            check_shape(&image, [tile_size, tile_size, IMAGE_CHANNELS], &path)?;
            self.stats.normalize_image(&image)?
        };

        let classes = {
            let path = self.root.join(CLASS_DIR).join(format!("{}.npy", index));
            let classes = read_integer_array(&path)?;
            let classes = match classes.ndim() {
                2 => classes.insert_axis(Axis(2)),
                _ => classes,
            };
            let classes = classes.into_dimensionality::<Ix3>().with_context(|| {
                format!("'{}' is not a 2 or 3 dimensional array", path.display())
            })?;
            check_shape(&classes, [tile_size, tile_size, 1], &path)?;

            let num_classes = self.num_classes as i64;
            if let Some(&class) = classes
                .iter()
                .find(|&&class| class < 0 || class >= num_classes)
            {
                bail!(
                    "'{}' contains class id {}, which is not in range [0, {})",
                    path.display(),
                    class,
                    num_classes
                );
            }
            classes
        };

        let boxes = {
            let path = self.root.join(BOX_DIR).join(format!("{}.npy", index));
            let boxes = read_array(&path)?
                .mapv(|value| value as f32)
                .into_dimensionality::<Ix3>()
                .with_context(|| format!("'{}' is not a 3 dimensional array", path.display()))?;
            check_shape(&boxes, [tile_size, tile_size, ENCODING_CHANNELS], &path)?;

            if self.normalize_boxes {
                self.stats.normalize_boxes(&boxes, &classes)?
            } else {
                boxes
            }
        };

        Ok(Sample {
            image,
            boxes,
            classes,
        })
    }

    /// Loads the samples at positions `start_index..start_index + batch_size`
    /// of the index pool.
    ///
    /// Position `i` lands in batch slot `i % batch_size`. Callers step
    /// `start_index` in multiples of `batch_size`, otherwise the slots are
    /// filled in rotated order.
    pub fn get_batch(&self, start_index: usize, batch_size: usize) -> Result<PixorBatch> {
        ensure!(batch_size > 0, "batch_size must be positive");
        if start_index % batch_size != 0 {
            warn!(
                "start index {} is not a multiple of batch size {}",
                start_index, batch_size
            );
        }
        let tile_size = self.tile_size;

        let mut images = Array4::<f32>::zeros((batch_size, tile_size, tile_size, IMAGE_CHANNELS));
        let mut boxes = Array4::<f32>::zeros((batch_size, tile_size, tile_size, ENCODING_CHANNELS));
        let mut classes = Array4::<i64>::zeros((batch_size, tile_size, tile_size, 1));

        for position in start_index..(start_index + batch_size) {
            let index = *self.index_pool.get(position).ok_or_else(|| {
                format_err!(
                    "position {} is out of range of {} samples",
                    position,
                    self.len()
                )
            })?;
            let sample = self
                .get_tile_and_label(index)
                .with_context(|| format!("unable to load sample {}", index))?;

            let slot = position % batch_size;
            images.index_axis_mut(Axis(0), slot).assign(&sample.image);
            boxes.index_axis_mut(Axis(0), slot).assign(&sample.boxes);
            classes.index_axis_mut(Axis(0), slot).assign(&sample.classes);
        }
        debug!(
            "loaded batch of {} samples from position {}",
            batch_size, start_index
        );

        Ok(PixorBatch {
            images: Tensor::try_from(&images)?,
            boxes: Tensor::try_from(&boxes)?,
            classes: Tensor::try_from(&classes)?,
        })
    }
}

fn check_shape<A, D>(array: &ndarray::Array<A, D>, expect: [usize; 3], path: &Path) -> Result<()>
where
    D: Dimension,
{
    ensure!(
        array.shape() == expect,
        "'{}' has shape {:?}, but expect {:?}",
        path.display(),
        array.shape(),
        expect
    );
    Ok(())
}
