//! Conversion between the per-pixel box encoding and absolute box corners.

use crate::common::*;

#[cfg(test)]
mod reference;

/// Number of channels of the per-pixel relative box encoding.
pub const ENCODING_CHANNELS: usize = 6;

/// Decodes the 6-channel relative box encoding `[cos, sin, dx, dy, w, l]`
/// into the four corners of the box, using each pixel's grid position
/// `(x = column, y = row)` as the anchor.
///
/// Works on whole tensors and keeps the autograd graph. The heading is used
/// as given and is not normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxCodec {
    unit: f64,
}

impl BoxCodec {
    pub fn new(unit: f64) -> Result<Self> {
        ensure!(
            unit.is_finite() && unit > 0.0,
            "the box unit must be positive, but get {}",
            unit
        );
        Ok(Self { unit })
    }

    pub fn unit(&self) -> f64 {
        self.unit
    }

    /// Maps a `[batch, height, width, 6]` encoding to corners of shape
    /// `[batch, height, width, 4, 2]`, ordered front-left, rear-left,
    /// rear-right, front-right, each as an `(x, y)` pair.
    pub fn decode(&self, encoding: &Tensor) -> Result<Tensor> {
        let (_batch_size, height, width, channels) = encoding.size4()?;
        ensure!(
            channels == ENCODING_CHANNELS as i64,
            "expect {} encoding channels, but get {}",
            ENCODING_CHANNELS,
            channels
        );
        let kind = encoding.kind();
        ensure!(
            matches!(kind, Kind::Half | Kind::Float | Kind::Double),
            "expect a floating point encoding, but get {:?}",
            kind
        );
        let device = encoding.device();
        let unit = self.unit;

        let channel = |index: i64| encoding.f_select(-1, index);
        let cos = channel(0)?;
        let sin = channel(1)?;
        let dx = channel(2)?;
        let dy = channel(3)?;
        let half_w = channel(4)? * (unit / 2.0);
        let half_l = channel(5)? * (unit / 2.0);

        // grid positions broadcast to [batch, height, width]
        let grid_x = Tensor::f_arange(width, (kind, device))?.f_view([1, 1, width])?;
        let grid_y = Tensor::f_arange(height, (kind, device))?.f_view([1, height, 1])?;
        let cx = dx * unit + grid_x;
        let cy = dy * unit + grid_y;

        // heading axis (cos, sin), lateral axis (-sin, cos)
        let along_x = &half_w * &cos;
        let along_y = &half_w * &sin;
        let across_x = -(&half_l * &sin);
        let across_y = &half_l * &cos;

        let corner = |along: f64, across: f64| -> Result<Tensor> {
            let x = &cx + &along_x * along + &across_x * across;
            let y = &cy + &along_y * along + &across_y * across;
            Ok(Tensor::f_stack(&[x, y], -1)?)
        };

        let corners = vec![
            corner(1.0, 1.0)?,
            corner(-1.0, 1.0)?,
            corner(-1.0, -1.0)?,
            corner(1.0, -1.0)?,
        ];
        Ok(Tensor::f_stack(&corners, -2)?)
    }
}

impl Default for BoxCodec {
    fn default() -> Self {
        Self { unit: 1.0 }
    }
}
