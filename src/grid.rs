use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SuspicionError};

/// Per-block scores, `by_count` rows by `bx_count` columns.
pub type ScoreMap = Array2<f64>;

/// Per-block suspicious flags, same shape as the grid.
pub type HighlightMask = Array2<bool>;

/// Pixel rectangle covered by one block, already clipped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRegion {
    pub by: usize,
    pub bx: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BlockRegion {
    pub fn x_end(&self) -> u32 {
        self.x + self.width
    }

    pub fn y_end(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// Ceiling partition of an image into `block_size` squares.
///
/// Trailing rows and columns that do not fill a whole block still get a
/// (smaller) block, so every pixel belongs to exactly one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGrid {
    pub width: u32,
    pub height: u32,
    pub block_size: u32,
    pub by_count: usize,
    pub bx_count: usize,
}

impl BlockGrid {
    pub fn new(width: u32, height: u32, block_size: u32) -> Result<Self> {
        if block_size == 0 {
            return Err(SuspicionError::InvalidParameter(
                "Block size must be a positive integer".into(),
            ));
        }
        if width == 0 || height == 0 {
            return Err(SuspicionError::EmptyImage);
        }

        Ok(Self {
            width,
            height,
            block_size,
            by_count: height.div_ceil(block_size) as usize,
            bx_count: width.div_ceil(block_size) as usize,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.by_count, self.bx_count)
    }

    pub fn block_count(&self) -> usize {
        self.by_count * self.bx_count
    }

    /// Nominal block area, used where edge blocks are deliberately not
    /// rescaled to their clipped size.
    pub fn nominal_area(&self) -> f64 {
        let side = self.block_size as f64;
        side * side
    }

    pub fn region(&self, by: usize, bx: usize) -> BlockRegion {
        let x = bx as u32 * self.block_size;
        let y = by as u32 * self.block_size;

        BlockRegion {
            by,
            bx,
            x,
            y,
            width: self.block_size.min(self.width - x),
            height: self.block_size.min(self.height - y),
        }
    }

    /// Blocks in row-major order.
    pub fn regions(&self) -> impl Iterator<Item = BlockRegion> + '_ {
        (0..self.by_count).flat_map(move |by| (0..self.bx_count).map(move |bx| self.region(by, bx)))
    }

    pub fn zeros(&self) -> ScoreMap {
        Array2::zeros(self.shape())
    }

    /// Builds a map by scoring every block in row-major order.
    pub fn map_blocks<F>(&self, mut score: F) -> ScoreMap
    where
        F: FnMut(&BlockRegion) -> f64,
    {
        let mut map = self.zeros();
        for region in self.regions() {
            map[[region.by, region.bx]] = score(&region);
        }
        map
    }

    pub fn check_shape(&self, map: &ScoreMap) -> Result<()> {
        if map.dim() != self.shape() {
            return Err(SuspicionError::ShapeMismatch {
                expected: self.shape(),
                found: map.dim(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_blocks_are_kept() {
        let grid = BlockGrid::new(100, 50, 32).unwrap();
        assert_eq!(grid.by_count, 2);
        assert_eq!(grid.bx_count, 4);

        let corner = grid.region(1, 3);
        assert_eq!((corner.x, corner.y), (96, 32));
        assert_eq!((corner.width, corner.height), (4, 18));
    }

    #[test]
    fn exact_multiple_has_no_extra_row() {
        let grid = BlockGrid::new(128, 128, 32).unwrap();
        assert_eq!(grid.shape(), (4, 4));
        assert!(grid.regions().all(|r| r.area() == 32 * 32));
    }

    #[test]
    fn regions_cover_every_pixel_once() {
        let grid = BlockGrid::new(70, 45, 16).unwrap();
        let covered: u32 = grid.regions().map(|r| r.area()).sum();
        assert_eq!(covered, 70 * 45);
    }

    #[test]
    fn regions_are_row_major() {
        let grid = BlockGrid::new(64, 64, 32).unwrap();
        let order = grid.regions().map(|r| (r.by, r.bx)).collect::<Vec<_>>();
        assert_eq!(order, vec![(0, 0), (0, 1), (1, 0), (1, 1)]);
    }

    #[test]
    fn rejects_zero_block_size_and_empty_image() {
        assert!(matches!(
            BlockGrid::new(10, 10, 0),
            Err(SuspicionError::InvalidParameter(_))
        ));
        assert!(matches!(
            BlockGrid::new(0, 10, 8),
            Err(SuspicionError::EmptyImage)
        ));
    }
}
