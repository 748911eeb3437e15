//! Scalar box geometry that [super::BoxCodec] is checked against.

use super::ENCODING_CHANNELS;

/// Oriented box in center/heading/extent format. The heading is used as
/// given.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatedBox {
    pub cx: f64,
    pub cy: f64,
    pub cos: f64,
    pub sin: f64,
    pub w: f64,
    pub l: f64,
}

impl RotatedBox {
    /// The box of an encoding `[cos, sin, dx, dy, w, l]` anchored at `[x, y]`.
    pub fn from_encoding(grid: [f64; 2], encoding: [f64; ENCODING_CHANNELS], unit: f64) -> Self {
        let [gx, gy] = grid;
        let [cos, sin, dx, dy, w, l] = encoding;

        Self {
            cx: gx + dx * unit,
            cy: gy + dy * unit,
            cos,
            sin,
            w: w * unit,
            l: l * unit,
        }
    }

    /// Corners as `(x, y)` pairs: front-left, rear-left, rear-right, front-right.
    pub fn corners(&self) -> [[f64; 2]; 4] {
        let Self {
            cx,
            cy,
            cos,
            sin,
            w,
            l,
        } = *self;
        let hw = w / 2.0;
        let hl = l / 2.0;

        // heading axis (cos, sin), lateral axis (-sin, cos)
        let corner = |along: f64, across: f64| {
            [
                cx + along * cos - across * sin,
                cy + along * sin + across * cos,
            ]
        };

        [
            corner(hw, hl),
            corner(-hw, hl),
            corner(-hw, -hl),
            corner(hw, -hl),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn zero_encoding_collapses_to_grid_point() {
        let rbox = RotatedBox::from_encoding([3.0, 5.0], [0.0; 6], 1.0);
        for [x, y] in rbox.corners() {
            assert_abs_diff_eq!(x, 3.0);
            assert_abs_diff_eq!(y, 5.0);
        }
    }

    #[test]
    fn axis_aligned_corners() {
        let rbox = RotatedBox::from_encoding([10.0, 20.0], [1.0, 0.0, 0.0, 0.0, 4.0, 2.0], 1.0);
        let expect = [[12.0, 21.0], [8.0, 21.0], [8.0, 19.0], [12.0, 19.0]];

        for (corner, expect) in rbox.corners().iter().zip(expect.iter()) {
            assert_abs_diff_eq!(corner[0], expect[0]);
            assert_abs_diff_eq!(corner[1], expect[1]);
        }
    }

    #[test]
    fn quarter_turn_swaps_axes() {
        let rbox = RotatedBox::from_encoding([0.0, 0.0], [0.0, 1.0, 0.0, 0.0, 4.0, 2.0], 1.0);
        let [front_left, _, _, _] = rbox.corners();

        // heading points to +y, lateral axis to -x
        assert_abs_diff_eq!(front_left[0], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(front_left[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn encoding_scales_distances() {
        let rbox = RotatedBox::from_encoding([1.0, 1.0], [1.0, 0.0, 0.5, -0.5, 2.0, 1.0], 4.0);
        assert_eq!([rbox.cx, rbox.cy], [3.0, -1.0]);
        assert_eq!([rbox.w, rbox.l], [8.0, 4.0]);
    }
}
