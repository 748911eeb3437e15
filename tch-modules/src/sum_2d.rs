use crate::common::*;
use tch_goodies::TensorExt;

/// Sums feature maps of identical `[batch, channels, height, width]` shape.
///
/// It is used to merge residual branches and skip connections.
#[derive(Debug)]
pub struct Sum2D {
    _private: [u8; 0],
}

impl Sum2D {
    pub fn new() -> Self {
        Self { _private: [] }
    }

    pub fn forward<T>(&self, tensors: &[T]) -> Result<Tensor>
    where
        T: Borrow<Tensor>,
    {
        let shapes: Vec<_> = tensors
            .iter()
            .map(|tensor| tensor.borrow().size4())
            .try_collect()?;
        ensure!(
            shapes.iter().all_equal(),
            "cannot sum feature maps of different shapes {:?}",
            shapes
        );
        Tensor::f_sum_tensors(tensors.iter().map(|tensor| tensor.borrow()))
    }
}

impl Default for Sum2D {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_feature_maps() -> Result<()> {
        let sum = Sum2D::new();
        let lhs = Tensor::ones(&[1, 2, 4, 4], (Kind::Float, Device::Cpu));
        let rhs = Tensor::ones(&[1, 2, 4, 4], (Kind::Float, Device::Cpu));
        let output = sum.forward(&[&lhs, &rhs])?;
        assert!(bool::from(output.eq(2.0).all()));

        let other = Tensor::ones(&[1, 3, 4, 4], (Kind::Float, Device::Cpu));
        assert!(sum.forward(&[&lhs, &other]).is_err());
        assert!(sum.forward::<Tensor>(&[]).is_err());
        Ok(())
    }
}
