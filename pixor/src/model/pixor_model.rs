use super::{ResBlock, ResBlockInit};
use crate::common::*;
use crate::codec::ENCODING_CHANNELS;
use tch_modules::{Activation, Conv2D, Conv2DInit, Deconv2D, Deconv2DInit, Sum2D};

/// The total down-sampling factor of the encoder. Input sizes must be
/// multiples of it.
pub const DOWNSAMPLE_FACTOR: i64 = 16;

const STEM_CHANNELS: usize = 32;
const BLOCK_CHANNELS: [(usize, usize); 4] = [(24, 96), (48, 192), (64, 256), (96, 384)];
const REDUCE_CHANNELS: usize = 196;
const HEADER_CHANNELS: usize = 96;
const NUM_HEADER_LAYERS: usize = 4;

#[derive(Debug, Clone)]
pub struct PixorModelInit {
    pub input_channels: usize,
    pub num_classes: usize,
}

impl PixorModelInit {
    pub fn new(num_classes: usize) -> Self {
        Self {
            input_channels: 3,
            num_classes,
        }
    }

    pub fn build<'p, P>(self, path: P) -> Result<PixorModel>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self {
            input_channels,
            num_classes,
        } = self;
        ensure!(input_channels > 0, "input_channels must be positive");
        ensure!(num_classes > 0, "num_classes must be positive");

        let stem = vec![
            Conv2DInit::new(input_channels, STEM_CHANNELS, 3).build(path / "stem_1")?,
            Conv2DInit::new(STEM_CHANNELS, STEM_CHANNELS, 3).build(path / "stem_2")?,
        ];

        let blocks: Vec<_> = BLOCK_CHANNELS
            .iter()
            .scan(STEM_CHANNELS, |in_c, &(mid_c, out_c)| {
                let init = ResBlockInit {
                    in_c: *in_c,
                    mid_c,
                    out_c,
                };
                *in_c = out_c;
                Some(init)
            })
            .enumerate()
            .map(|(index, init)| init.build(path / format!("block_{}", index + 1)))
            .try_collect()?;
        let [block2_c, block3_c, block4_c] = [
            BLOCK_CHANNELS[1].1,
            BLOCK_CHANNELS[2].1,
            BLOCK_CHANNELS[3].1,
        ];

        let reduce = Conv2DInit {
            p: 0,
            ..Conv2DInit::new(block4_c, REDUCE_CHANNELS, 1)
        }
        .build(path / "reduce")?;

        // decoder with skip connections from block 3 (1/8) and block 2 (1/4)
        let upsample_1 =
            Deconv2DInit::upsample(REDUCE_CHANNELS, 128, 3, 2)?.build(path / "upsample_1")?;
        let skip_3 = Conv2DInit {
            p: 0,
            ..Conv2DInit::new(block3_c, 128, 1)
        }
        .build(path / "skip_3")?;
        let upsample_2 = Deconv2DInit::upsample(128, HEADER_CHANNELS, 3, 2)?
            .build(path / "upsample_2")?;
        let skip_2 = Conv2DInit {
            p: 0,
            ..Conv2DInit::new(block2_c, HEADER_CHANNELS, 1)
        }
        .build(path / "skip_2")?;
        let upsample_3 = Deconv2DInit::upsample(HEADER_CHANNELS, HEADER_CHANNELS, 3, 4)?
            .build(path / "upsample_3")?;

        let header: Vec<_> = (0..NUM_HEADER_LAYERS)
            .map(|index| {
                Conv2DInit::new(HEADER_CHANNELS, HEADER_CHANNELS, 3)
                    .build(path / format!("header_{}", index + 1))
            })
            .try_collect()?;

        let class_head = Conv2DInit {
            activation: Activation::Linear,
            ..Conv2DInit::new(HEADER_CHANNELS, num_classes, 3)
        }
        .build(path / "class_head")?;
        let box_head = Conv2DInit {
            activation: Activation::Linear,
            ..Conv2DInit::new(HEADER_CHANNELS, ENCODING_CHANNELS, 3)
        }
        .build(path / "box_head")?;

        Ok(PixorModel {
            input_channels: input_channels as i64,
            num_classes: num_classes as i64,
            stem,
            blocks,
            reduce,
            upsample_1,
            skip_3,
            upsample_2,
            skip_2,
            upsample_3,
            header,
            class_head,
            box_head,
            sum: Sum2D::new(),
        })
    }
}

/// Residual encoder, up-sampling decoder and the class and box heads.
#[derive(Debug)]
pub struct PixorModel {
    input_channels: i64,
    num_classes: i64,
    stem: Vec<Conv2D>,
    blocks: Vec<ResBlock>,
    reduce: Conv2D,
    upsample_1: Deconv2D,
    skip_3: Conv2D,
    upsample_2: Deconv2D,
    skip_2: Conv2D,
    upsample_3: Deconv2D,
    header: Vec<Conv2D>,
    class_head: Conv2D,
    box_head: Conv2D,
    sum: Sum2D,
}

impl PixorModel {
    pub fn num_classes(&self) -> i64 {
        self.num_classes
    }

    /// Runs the network on a `[batch, height, width, channels]` input.
    ///
    /// Both outputs keep the input resolution. Height and width must be
    /// multiples of [DOWNSAMPLE_FACTOR].
    pub fn forward(&self, input: &Tensor) -> Result<PixorOutput> {
        let (_batch_size, height, width, channels) = input.size4()?;
        ensure!(
            channels == self.input_channels,
            "expect {} input channels, but get {}",
            self.input_channels,
            channels
        );
        ensure!(
            height > 0
                && width > 0
                && height % DOWNSAMPLE_FACTOR == 0
                && width % DOWNSAMPLE_FACTOR == 0,
            "input size {}x{} is not a positive multiple of {}",
            height,
            width,
            DOWNSAMPLE_FACTOR
        );

        let xs = input.f_to_kind(Kind::Float)?.f_nhwc_to_nchw()?;
        let xs = self
            .stem
            .iter()
            .fold(xs, |xs, conv| conv.forward(&xs));

        let mut features = Vec::with_capacity(self.blocks.len());
        let mut xs = xs;
        for block in &self.blocks {
            xs = block.forward(&xs)?;
            features.push(xs.shallow_clone());
        }
        let (block2, block3) = match features.as_slice() {
            [_, block2, block3, _] => (block2, block3),
            _ => bail!("expect 4 residual blocks, but get {}", features.len()),
        };

        let xs = self.reduce.forward(&xs);
        let xs = self.upsample_1.forward(&xs);
        let xs = self.sum.forward(&[xs, self.skip_3.forward(block3)])?;
        let xs = self.upsample_2.forward(&xs);
        let xs = self.sum.forward(&[xs, self.skip_2.forward(block2)])?;
        let xs = self.upsample_3.forward(&xs);
        let xs = self
            .header
            .iter()
            .fold(xs, |xs, conv| conv.forward(&xs));

        let class_logits = self.class_head.forward(&xs).f_nchw_to_nhwc()?;
        let boxes = self.box_head.forward(&xs).f_nchw_to_nhwc()?;

        Ok(PixorOutput {
            class_logits,
            boxes,
        })
    }
}

/// Per-pixel outputs of [PixorModel], both channels-last.
#[derive(Debug, TensorLike)]
pub struct PixorOutput {
    /// Class logits of shape `[batch, height, width, num_classes]`.
    pub class_logits: Tensor,
    /// Box encodings of shape `[batch, height, width, 6]`.
    pub boxes: Tensor,
}
