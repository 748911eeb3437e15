//! Partitioning of large images and their boxes into fixed-size tiles.

use crate::common::*;
use bbox::{Span, TileBox};

/// A `tile_size x tile_size` patch with the boxes whose centers fall in it.
#[derive(Debug, Clone)]
pub struct Tile<T> {
    pub image: Array3<T>,
    pub row_start: usize,
    pub col_start: usize,
    /// Boxes with centers relative to `(row_start, col_start)`.
    pub boxes: Vec<TileBox<f64>>,
}

/// Cuts `image` of shape `[rows, cols, depth]` into a row-major grid of
/// non-overlapping tiles.
///
/// Trailing rows and columns that do not fill a whole tile are dropped. Each
/// box is assigned to the first tile whose half-open range contains its
/// center and is never assigned twice. Boxes outside the retained region are
/// dropped.
pub fn tile_image<T>(
    image: ArrayView3<T>,
    boxes: Vec<TileBox<f64>>,
    tile_size: usize,
) -> Result<Vec<Tile<T>>>
where
    T: Clone,
{
    ensure!(tile_size > 0, "tile_size must be positive");
    let (rows, cols, _depth) = image.dim();
    let num_tile_rows = rows / tile_size;
    let num_tile_cols = cols / tile_size;

    let mut remaining = boxes;
    let mut tiles = Vec::with_capacity(num_tile_rows * num_tile_cols);

    for tile_row in 0..num_tile_rows {
        for tile_col in 0..num_tile_cols {
            let row_span = Span::nth(tile_row, tile_size);
            let col_span = Span::nth(tile_col, tile_size);
            let row_range = Span::try_new(row_span.start() as f64, row_span.end() as f64)?;
            let col_range = Span::try_new(col_span.start() as f64, col_span.end() as f64)?;

            let (inside, outside): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|tbox| tbox.is_centered_in(&row_range, &col_range));
            remaining = outside;

            let boxes = inside
                .into_iter()
                .map(|tbox| tbox.relative_to(row_range.start(), col_range.start()))
                .collect();
            let image = image
                .slice(s![row_span.start()..row_span.end(), col_span.start()..col_span.end(), ..])
                .to_owned();

            tiles.push(Tile {
                image,
                row_start: row_span.start(),
                col_start: col_span.start(),
                boxes,
            });
        }
    }

    if !remaining.is_empty() {
        debug!(
            "{} boxes lie outside the tiled region and are dropped",
            remaining.len()
        );
    }

    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tbox(cx: f64, cy: f64) -> TileBox<f64> {
        TileBox {
            cx,
            cy,
            extra: vec![cx * 10.0],
        }
    }

    #[test]
    fn tile_count_and_shape() -> Result<()> {
        let image = Array3::<u8>::zeros((50, 70, 3));
        let tiles = tile_image(image.view(), vec![], 16)?;

        assert_eq!(tiles.len(), 3 * 4);
        assert!(tiles.iter().all(|tile| tile.image.dim() == (16, 16, 3)));
        let origins: Vec<_> = tiles.iter().map(|tile| (tile.row_start, tile.col_start)).collect();
        assert_eq!(origins[0], (0, 0));
        assert_eq!(origins[1], (0, 16));
        assert_eq!(origins[4], (16, 0));
        Ok(())
    }

    #[test]
    fn boxes_are_assigned_once() -> Result<()> {
        let image = Array3::from_shape_fn((40, 40, 1), |(row, col, _)| (row * 40 + col) as u32);
        let boxes = vec![
            tbox(3.0, 5.0),
            tbox(20.0, 20.0),
            // on the boundary, belongs to the second tile row
            tbox(16.0, 0.0),
            tbox(31.5, 17.0),
            // outside the retained 32x32 region
            tbox(35.0, 1.0),
            tbox(2.0, 39.0),
        ];
        let tiles = tile_image(image.view(), boxes, 16)?;
        assert_eq!(tiles.len(), 4);

        let counts: Vec<_> = tiles.iter().map(|tile| tile.boxes.len()).collect();
        assert_eq!(counts, vec![1, 0, 1, 2]);
        assert_eq!(counts.iter().sum::<usize>(), 4);

        assert_eq!(tiles[0].boxes[0].to_vec(), vec![3.0, 5.0, 30.0]);
        assert_eq!(tiles[2].boxes[0].to_vec(), vec![0.0, 0.0, 160.0]);
        assert_eq!(tiles[3].boxes[0].to_vec(), vec![4.0, 4.0, 200.0]);
        assert_eq!(tiles[3].boxes[1].to_vec(), vec![15.5, 1.0, 315.0]);

        // the tile holds the matching pixels of the source
        assert_eq!(tiles[3].image[[0, 0, 0]], image[[16, 16, 0]]);
        assert_eq!(tiles[1].image[[2, 3, 0]], image[[2, 19, 0]]);
        Ok(())
    }

    #[test]
    fn reject_zero_tile_size() {
        let image = Array3::<u8>::zeros((4, 4, 1));
        assert!(tile_image(image.view(), vec![], 0).is_err());
    }
}
