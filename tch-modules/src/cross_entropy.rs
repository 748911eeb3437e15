use crate::common::*;
use tch_goodies::TensorExt;

/// Cross entropy between channels-last logits and sparse class ids.
///
/// The input has shape `[d1, ..., dn, num_classes]` and the target has shape
/// `[d1, ..., dn]` with `int64` class ids.
#[derive(Debug)]
pub struct CrossEntropyLoss {
    reduction: Reduction,
}

impl CrossEntropyLoss {
    pub fn new(reduction: Reduction) -> Self {
        Self { reduction }
    }

    pub fn forward(&self, input: &Tensor, target: &Tensor) -> Result<Tensor> {
        let input_size = input.size();
        let (&num_classes, leading) = input_size
            .split_last()
            .ok_or_else(|| format_err!("the input must have at least one dimension"))?;
        ensure!(
            target.size() == leading,
            "expect target shape {:?}, but get {:?}",
            leading,
            target.size()
        );
        ensure!(
            target.kind() == Kind::Int64,
            "expect an int64 target, but get {:?}",
            target.kind()
        );

        // return zero tensor if (1) input is empty and (2) using mean reduction
        if input.is_empty() && self.reduction == Reduction::Mean {
            return Ok(Tensor::zeros(&[], (Kind::Float, input.device())).set_requires_grad(false));
        }

        check_class_range(target, num_classes)?;

        let loss = input
            .f_reshape(&[-1, num_classes])?
            .f_log_softmax(-1, Kind::Float)?
            .f_nll_loss::<Tensor>(&target.f_reshape(&[-1])?, None, Reduction::None, -100)?;

        let loss = match self.reduction {
            Reduction::None => loss.f_reshape(leading)?,
            Reduction::Sum => loss.f_sum(Kind::Float)?,
            Reduction::Mean => loss.f_mean(Kind::Float)?,
            Reduction::Other(_) => bail!("unsupported reduction {:?}", self.reduction),
        };
        Ok(loss)
    }
}

/// Fails if any class id lies outside `[0, num_classes)`.
pub fn check_class_range(classes: &Tensor, num_classes: i64) -> Result<()> {
    let in_range = tch::no_grad(|| -> Result<bool> {
        let lower = classes.f_ge(0i64)?.f_all()?;
        let upper = classes.f_lt(num_classes)?.f_all()?;
        Ok(bool::from(lower) && bool::from(upper))
    })?;
    ensure!(
        in_range,
        "class ids must be in range [0, {}), but found [{}, {}]",
        num_classes,
        i64::from(classes.min()),
        i64::from(classes.max())
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tch::nn::OptimizerConfig as _;

    #[test]
    fn uniform_logits() -> Result<()> {
        let loss_fn = CrossEntropyLoss::new(Reduction::Mean);
        let input = Tensor::zeros(&[2, 3, 3, 4], (Kind::Float, Device::Cpu));
        let target = Tensor::zeros(&[2, 3, 3], (Kind::Int64, Device::Cpu));
        let loss = f64::from(loss_fn.forward(&input, &target)?);
        assert_abs_diff_eq!(loss, 4f64.ln(), epsilon = 1e-5);

        let per_pixel = CrossEntropyLoss::new(Reduction::None).forward(&input, &target)?;
        assert_eq!(per_pixel.size(), vec![2, 3, 3]);
        Ok(())
    }

    #[test]
    fn reject_out_of_range_class() {
        let loss_fn = CrossEntropyLoss::new(Reduction::Mean);
        let input = Tensor::zeros(&[1, 2, 2, 2], (Kind::Float, Device::Cpu));
        let target = Tensor::of_slice(&[0i64, 1, 2, 0]).view([1, 2, 2]);
        assert!(loss_fn.forward(&input, &target).is_err());

        let target = Tensor::zeros(&[1, 2, 3], (Kind::Int64, Device::Cpu));
        assert!(loss_fn.forward(&input, &target).is_err());
    }

    #[test]
    fn cross_entropy_loss_converges() -> Result<()> {
        let device = Device::Cpu;
        let n_class = 3;

        let vs = nn::VarStore::new(device);
        let root = vs.root();
        let loss_fn = CrossEntropyLoss::new(Reduction::Mean);

        let input = root.randn("input", &[4, 5, 5, n_class], 0.0, 1.0);
        let target =
            Tensor::randint(n_class, &[4, 5, 5], (Kind::Int64, device)).set_requires_grad(false);

        let mut optimizer = nn::Adam::default().build(&vs, 0.1)?;

        for _ in 0..500 {
            let loss = loss_fn.forward(&input, &target)?;
            optimizer.backward_step(&loss);
        }

        let (_, predicted) = input.max_dim(-1, false);
        let accuracy =
            f64::from(predicted.eq_tensor(&target).to_kind(Kind::Float).mean(Kind::Float));
        ensure!(accuracy >= 0.99, "the loss does not coverage");

        Ok(())
    }
}
