use image::GrayImage;

use crate::{
    detection::{BlockDetector, Polarity},
    error::Result,
    grid::{BlockGrid, ScoreMap},
    image_utils::{gray_to_array, region_moments},
};

/// Population variance of luminance per block.
///
/// Smoothing flattens variance, so low values are the suspicious ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct VarianceDetector;

impl VarianceDetector {
    pub fn new() -> Self {
        Self
    }
}

impl BlockDetector for VarianceDetector {
    const POLARITY: Polarity = Polarity::Inverted;

    fn score(&self, gray: &GrayImage, grid: &BlockGrid) -> Result<ScoreMap> {
        let values = gray_to_array(gray);
        Ok(grid.map_blocks(|region| region_moments(&values, region).variance()))
    }

    fn name(&self) -> &str {
        "variance"
    }
}
