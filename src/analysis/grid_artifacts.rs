use image::GrayImage;

use crate::{
    detection::{BlockDetector, Polarity},
    error::Result,
    grid::{BlockGrid, BlockRegion, ScoreMap},
};

/// Side of the JPEG compression cell. Fixed, not configurable.
pub const GRID_CELL: u32 = 8;

/// Mean discontinuity across 8x8 compression-cell seams inside each block.
///
/// Untouched JPEG content keeps a visible step at every cell seam; local
/// edits and re-saves wash it out, so a low score is the suspicious one.
/// Cells step by 8 from the block's own origin, and a seam only counts when
/// both full 8-sample lines lie inside the image. Only blocks against the
/// right or bottom edge can end up with no seams at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridArtifactDetector;

impl GridArtifactDetector {
    pub fn new() -> Self {
        Self
    }

    fn block_score(&self, gray: &GrayImage, region: &BlockRegion) -> f64 {
        let (width, height) = gray.dimensions();
        let mut total = 0.0;
        let mut count = 0usize;

        for cy in cell_origins(region.y, region.y_end()) {
            for cx in cell_origins(region.x, region.x_end()) {
                if cx + GRID_CELL < width && cy + GRID_CELL <= height {
                    total += vertical_seam(gray, cx + GRID_CELL, cy);
                    count += 1;
                }

                if cy + GRID_CELL < height && cx + GRID_CELL <= width {
                    total += horizontal_seam(gray, cx, cy + GRID_CELL);
                    count += 1;
                }
            }
        }

        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }
}

impl BlockDetector for GridArtifactDetector {
    const POLARITY: Polarity = Polarity::Inverted;

    fn score(&self, gray: &GrayImage, grid: &BlockGrid) -> Result<ScoreMap> {
        Ok(grid.map_blocks(|region| self.block_score(gray, region)))
    }

    fn name(&self) -> &str {
        "grid_artifacts"
    }
}

fn cell_origins(start: u32, end: u32) -> impl Iterator<Item = u32> {
    (start..end).step_by(GRID_CELL as usize)
}

/// Mean `|left - right|` between column `seam_x - 1` and column `seam_x`.
fn vertical_seam(gray: &GrayImage, seam_x: u32, y0: u32) -> f64 {
    let sum = (y0..y0 + GRID_CELL)
        .map(|y| {
            let left = gray.get_pixel(seam_x - 1, y)[0] as f64;
            let right = gray.get_pixel(seam_x, y)[0] as f64;
            (left - right).abs()
        })
        .sum::<f64>();

    sum / GRID_CELL as f64
}

/// Mean `|top - bottom|` between row `seam_y - 1` and row `seam_y`.
fn horizontal_seam(gray: &GrayImage, x0: u32, seam_y: u32) -> f64 {
    let sum = (x0..x0 + GRID_CELL)
        .map(|x| {
            let top = gray.get_pixel(x, seam_y - 1)[0] as f64;
            let bottom = gray.get_pixel(x, seam_y)[0] as f64;
            (top - bottom).abs()
        })
        .sum::<f64>();

    sum / GRID_CELL as f64
}
