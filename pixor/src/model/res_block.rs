use crate::common::*;
use tch_modules::{Conv2D, Conv2DInit, Sum2D};

/// A residual block that halves the spatial size.
///
/// The branch is a strided 3x3 convolution to `mid_c` channels followed by
/// two 3x3 convolutions, and the shortcut is a strided 1x1 projection to
/// `out_c` channels.
#[derive(Debug, Clone)]
pub struct ResBlockInit {
    pub in_c: usize,
    pub mid_c: usize,
    pub out_c: usize,
}

impl ResBlockInit {
    pub fn build<'p, P>(self, path: P) -> Result<ResBlock>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();
        let Self { in_c, mid_c, out_c } = self;

        let shortcut = Conv2DInit {
            s: 2,
            p: 0,
            ..Conv2DInit::new(in_c, out_c, 1)
        }
        .build(path / "shortcut")?;
        let branch = vec![
            Conv2DInit {
                s: 2,
                ..Conv2DInit::new(in_c, mid_c, 3)
            }
            .build(path / "branch_1")?,
            Conv2DInit::new(mid_c, mid_c, 3).build(path / "branch_2")?,
            Conv2DInit::new(mid_c, out_c, 3).build(path / "branch_3")?,
        ];

        Ok(ResBlock {
            shortcut,
            branch,
            sum: Sum2D::new(),
        })
    }
}

#[derive(Debug)]
pub struct ResBlock {
    shortcut: Conv2D,
    branch: Vec<Conv2D>,
    sum: Sum2D,
}

impl ResBlock {
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let shortcut = self.shortcut.forward(xs);
        let branch = self
            .branch
            .iter()
            .fold(xs.shallow_clone(), |xs, conv| conv.forward(&xs));
        self.sum.forward(&[shortcut, branch])
    }
}
