pub mod fusion;
pub mod threshold;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    grid::{BlockGrid, ScoreMap},
};

/// How a detector's raw score relates to suspicion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Polarity {
    /// Higher raw score means more suspicious; used as is.
    Direct,
    /// Higher raw score means less suspicious; inverted after normalization.
    Inverted,
}

impl Polarity {
    pub fn orient(&self, normalized: ScoreMap) -> ScoreMap {
        match self {
            Polarity::Direct => normalized,
            Polarity::Inverted => fusion::invert(&normalized),
        }
    }
}

/// A per-block statistic computed from the luminance buffer.
pub trait BlockDetector {
    /// Fixed per detector type; configuration never changes it.
    const POLARITY: Polarity;

    fn score(&self, gray: &GrayImage, grid: &BlockGrid) -> Result<ScoreMap>;

    fn polarity(&self) -> Polarity {
        Self::POLARITY
    }

    fn name(&self) -> &str;
}
