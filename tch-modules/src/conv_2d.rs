use crate::common::*;

#[derive(Debug, Clone)]
pub struct Conv2DInit {
    pub in_c: usize,
    pub out_c: usize,
    pub k: usize,
    pub s: usize,
    pub p: usize,
    pub bias: bool,
    pub activation: Activation,
}

impl Conv2DInit {
    /// A stride-1 convolution that keeps the spatial size for odd kernels.
    pub fn new(in_c: usize, out_c: usize, k: usize) -> Self {
        Self {
            in_c,
            out_c,
            k,
            s: 1,
            p: k / 2,
            bias: true,
            activation: Activation::Relu,
        }
    }

    pub fn build<'p, P>(self, path: P) -> Result<Conv2D>
    where
        P: Borrow<nn::Path<'p>>,
    {
        let path = path.borrow();

        let Self {
            in_c,
            out_c,
            k,
            s,
            p,
            bias,
            activation,
        } = self;

        ensure!(in_c > 0 && out_c > 0, "channel numbers must be positive");
        ensure!(k > 0 && s > 0, "kernel size and stride must be positive");

        let conv = nn::conv2d(
            path / "conv",
            in_c as i64,
            out_c as i64,
            k as i64,
            nn::ConvConfig {
                stride: s as i64,
                padding: p as i64,
                bias,
                ..Default::default()
            },
        );

        Ok(Conv2D { conv, activation })
    }
}

#[derive(Debug)]
pub struct Conv2D {
    conv: nn::Conv2D,
    activation: Activation,
}

impl Conv2D {
    /// Runs the convolution on a `[batch, channels, height, width]` tensor.
    pub fn forward(&self, xs: &Tensor) -> Tensor {
        xs.apply(&self.conv).activation(self.activation)
    }
}
