use crate::common::*;
use tch_goodies::TensorExt;

/// Huber loss that is quadratic below `beta` and linear above it.
#[derive(Debug)]
pub struct SmoothL1Loss {
    reduction: Reduction,
    beta: f64,
}

impl SmoothL1Loss {
    pub fn new(reduction: Reduction) -> Self {
        Self {
            reduction,
            beta: 1.0,
        }
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        // return zero tensor if (1) input is empty and (2) using mean reduction
        if input.is_empty() && self.reduction == Reduction::Mean {
            return Ok(Tensor::zeros(&[], (Kind::Float, input.device())).set_requires_grad(false));
        }

        let loss = self.elementwise(input, target)?;
        self.reduce(loss)
    }

    /// Loss restricted to the entries where `mask` is non-zero.
    ///
    /// The mask is broadcast against the element-wise loss. With mean
    /// reduction the result is averaged over the selected entries only.
    pub fn forward_masked(&self, input: &Tensor, target: &Tensor, mask: &Tensor) -> Result<Tensor> {
        let loss = self.elementwise(input, target)?;
        let mask = mask.f_to_kind(Kind::Float)?.f_expand_as(&loss)?;

        let loss = match self.reduction {
            Reduction::Mean => loss.f_masked_mean(&mask)?,
            Reduction::Sum => loss.f_mul(&mask)?.f_sum(Kind::Float)?,
            Reduction::None => loss.f_mul(&mask)?,
            Reduction::Other(_) => bail!("unsupported reduction {:?}", self.reduction),
        };
        Ok(loss)
    }

    fn elementwise(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        ensure!(
            input.size() == target.size(),
            "input shape {:?} and target shape {:?} do not match",
            input.size(),
            target.size()
        );

        let beta = self.beta;
        let abs_diff = input.f_sub(target)?.f_abs()?;
        let quadratic = abs_diff.f_clamp_max(beta)?;
        let linear = abs_diff.f_sub(&quadratic)?;
        let loss = quadratic.f_mul(&quadratic)? * (0.5 / beta) + linear;
        Ok(loss)
    }

    fn reduce(&self, loss: Tensor) -> Result<Tensor> {
        let loss = match self.reduction {
            Reduction::None => loss,
            Reduction::Sum => loss.f_sum(Kind::Float)?,
            Reduction::Mean => loss.f_mean(Kind::Float)?,
            Reduction::Other(_) => bail!("unsupported reduction {:?}", self.reduction),
        };
        Ok(loss)
    }
}
