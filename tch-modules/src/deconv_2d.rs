use crate::common::*;

#[derive(Debug, Clone)]
pub struct Deconv2DInit {
    pub in_c: usize,
    pub out_c: usize,
    pub k: usize,
    pub s: usize,
    pub p: usize,
    pub op: usize,
    pub bias: bool,
    pub activation: Activation,
}

impl Deconv2DInit {
    pub fn new(in_c: usize, out_c: usize, k: usize) -> Self {
        Self {
            in_c,
            out_c,
            k,
            s: 1,
            p: k / 2,
            op: 0,
            bias: true,
            activation: Activation::Relu,
        }
    }

    /// A transposed convolution whose output is exactly `s` times the input
    /// size, i.e. "same" padding.
    pub fn upsample(in_c: usize, out_c: usize, k: usize, s: usize) -> Result<Self> {
        ensure!(s > 0, "stride must be positive");
        let p = k / 2;

        // out = (in - 1) * s - 2p + k + op == in * s
        let op = (s + 2 * p)
            .checked_sub(k)
            .ok_or_else(|| format_err!("kernel size {} is too large for stride {}", k, s))?;
        ensure!(
            op < s,
            "kernel size {} cannot upsample exactly by stride {}",
            k,
            s
        );

        Ok(Self {
            s,
            p,
            op,
            ..Self::new(in_c, out_c, k)
        })
    }

    pub fn build<'p, P>(self, path: P) -> Result<Deconv2D>
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
            op,
            bias,
            activation,
        } = self;

        ensure!(in_c > 0 && out_c > 0, "channel numbers must be positive");
        ensure!(
            op < s.max(1),
            "output padding must be smaller than the stride"
        );

        let deconv = nn::conv_transpose2d(
            path / "deconv",
            in_c as i64,
            out_c as i64,
            k as i64,
            nn::ConvTransposeConfig {
                stride: s as i64,
                padding: p as i64,
                output_padding: op as i64,
                bias,
                ..Default::default()
            },
        );

        Ok(Deconv2D { deconv, activation })
    }
}

#[derive(Debug)]
pub struct Deconv2D {
    deconv: nn::ConvTranspose2D,
    activation: Activation,
}

impl Deconv2D {
    pub fn forward(&self, xs: &Tensor) -> Tensor {
        xs.apply(&self.deconv).activation(self.activation)
    }
}
