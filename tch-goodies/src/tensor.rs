use crate::common::*;

pub trait TensorExt {
    fn is_empty(&self) -> bool;

    fn f_sum_tensors<T>(tensors: impl IntoIterator<Item = T>) -> Result<Tensor>
    where
        T: Borrow<Tensor>,
    {
        let mut iter = tensors.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| format_err!("the input iterator must not be empty"))?
            .borrow()
            .shallow_clone();
        let sum = iter.try_fold(first, |lhs, rhs| lhs.f_add(rhs.borrow()))?;
        Ok(sum)
    }

    /// Permutes a `[batch, height, width, channels]` tensor to `[batch, channels, height, width]`.
    fn f_nhwc_to_nchw(&self) -> Result<Tensor>;

    /// Permutes a `[batch, channels, height, width]` tensor to `[batch, height, width, channels]`.
    fn f_nchw_to_nhwc(&self) -> Result<Tensor>;

    /// Mean of the entries selected by `mask`.
    ///
    /// The mask is broadcast to the shape of `self`. It returns zero if the mask
    /// selects nothing.
    fn f_masked_mean(&self, mask: &Tensor) -> Result<Tensor>;

    /// Element-wise division that yields zero wherever the denominator is zero.
    fn f_div_or_zero(&self, denominator: &Tensor) -> Result<Tensor>;
}

impl TensorExt for Tensor {
    fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    fn f_nhwc_to_nchw(&self) -> Result<Tensor> {
        let _ = self.size4()?;
        Ok(self.f_permute(&[0, 3, 1, 2])?)
    }

    fn f_nchw_to_nhwc(&self) -> Result<Tensor> {
        let _ = self.size4()?;
        Ok(self.f_permute(&[0, 2, 3, 1])?)
    }

    fn f_masked_mean(&self, mask: &Tensor) -> Result<Tensor> {
        let mask = mask.f_to_kind(Kind::Float)?.f_expand_as(self)?;
        let sum = self.f_mul(&mask)?.f_sum(Kind::Float)?;
        let count = mask.f_sum(Kind::Float)?.f_clamp_min(1.0)?;
        Ok(sum.f_div(&count)?)
    }

    fn f_div_or_zero(&self, denominator: &Tensor) -> Result<Tensor> {
        let numerator = self.f_to_kind(Kind::Float)?;
        let denominator = denominator.f_to_kind(Kind::Float)?;
        let is_zero = denominator.f_eq(0.0)?.f_to_kind(Kind::Float)?;

        // replace zero denominators by one, then zero out those entries
        let safe_denominator = denominator.f_add(&is_zero)?;
        let keep = 1.0 - &is_zero;
        Ok(numerator.f_div(&safe_denominator)?.f_mul(&keep)?)
    }
}
