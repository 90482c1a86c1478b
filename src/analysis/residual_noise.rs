use image::GrayImage;
use ndarray::Array2;

use crate::{
    analysis::denoise::Denoiser,
    detection::{BlockDetector, Polarity},
    error::Result,
    grid::{BlockGrid, ScoreMap},
    image_utils::{difference, region_moments},
};

/// Variance of the denoising residual per block, a cheap stand-in for
/// sensor-noise (PRNU) analysis.
///
/// Untouched regions keep their natural noise, so the residual stays lively;
/// smoothed or synthesized patches leave a flat residual and score low.
#[derive(Debug, Clone, Copy)]
pub struct ResidualNoiseDetector {
    denoiser: Denoiser,
}

impl ResidualNoiseDetector {
    pub fn new(denoiser: Denoiser) -> Self {
        Self { denoiser }
    }

    pub fn denoiser(&self) -> Denoiser {
        self.denoiser
    }

    pub fn denoise(&self, gray: &GrayImage) -> GrayImage {
        self.denoiser.apply(gray)
    }

    /// `original - denoised`, signed.
    pub fn residual(gray: &GrayImage, denoised: &GrayImage) -> Array2<f64> {
        difference(gray, denoised)
    }

    pub fn score_residual(residual: &Array2<f64>, grid: &BlockGrid) -> ScoreMap {
        grid.map_blocks(|region| region_moments(residual, region).variance())
    }
}

impl BlockDetector for ResidualNoiseDetector {
    const POLARITY: Polarity = Polarity::Inverted;

    fn score(&self, gray: &GrayImage, grid: &BlockGrid) -> Result<ScoreMap> {
        let denoised = self.denoise(gray);
        let residual = Self::residual(gray, &denoised);
        Ok(Self::score_residual(&residual, grid))
    }

    fn name(&self) -> &str {
        "residual_noise"
    }
}
