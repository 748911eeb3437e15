use crate::{common::*, Span};

/// A box given by its center and an arbitrary number of trailing
/// dimensions that are carried along untouched.
///
/// `cx` is measured along the row axis of the image and `cy` along the
/// column axis, matching the source annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct TileBox<T> {
    pub cx: T,
    pub cy: T,
    pub extra: Vec<T>,
}

impl<T> TileBox<T>
where
    T: Copy,
{
    /// Builds a box from a flat record `[cx, cy, extra...]`.
    pub fn try_from_slice(record: &[T]) -> Result<Self> {
        match record {
            [cx, cy, extra @ ..] => Ok(Self {
                cx: *cx,
                cy: *cy,
                extra: extra.to_vec(),
            }),
            _ => Err(format_err!(
                "a box record needs at least 2 values, but get {}",
                record.len()
            )),
        }
    }

    pub fn to_vec(&self) -> Vec<T> {
        let mut record = Vec::with_capacity(self.extra.len() + 2);
        record.push(self.cx);
        record.push(self.cy);
        record.extend_from_slice(&self.extra);
        record
    }
}

impl<T> TileBox<T>
where
    T: Copy + Num + PartialOrd,
{
    /// True if the center lies inside both half-open spans.
    pub fn is_centered_in(&self, rows: &Span<T>, cols: &Span<T>) -> bool {
        rows.contains(self.cx) && cols.contains(self.cy)
    }

    /// Moves the center into the frame whose origin is `(row_start, col_start)`.
    pub fn relative_to(self, row_start: T, col_start: T) -> Self {
        let Self { cx, cy, extra } = self;
        Self {
            cx: cx - row_start,
            cy: cy - col_start,
            extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trip() -> Result<()> {
        let tbox = TileBox::try_from_slice(&[5.0, 7.0, 1.0, 2.0])?;
        assert_eq!(tbox.extra, vec![1.0, 2.0]);
        assert_eq!(tbox.to_vec(), vec![5.0, 7.0, 1.0, 2.0]);
        assert!(TileBox::try_from_slice(&[1.0]).is_err());
        Ok(())
    }

    #[test]
    fn relative_center() -> Result<()> {
        let rows = Span::try_new(16.0, 32.0)?;
        let cols = Span::try_new(0.0, 16.0)?;
        let tbox = TileBox::try_from_slice(&[20.0, 3.0, 9.0])?;

        assert!(tbox.is_centered_in(&rows, &cols));
        let tbox = tbox.relative_to(rows.start(), cols.start());
        assert_eq!(tbox.to_vec(), vec![4.0, 3.0, 9.0]);
        Ok(())
    }
}
