use std::{path::Path, sync::Arc};

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{
        denoise::{DenoiseMethod, DenoiserKind, NlMeansParams},
        ela::{JpegRecompressor, Recompressor},
    },
    detection::threshold::validate_percent,
    error::{Result, SuspicionError},
    grid::{BlockGrid, BlockRegion, HighlightMask, ScoreMap},
};

pub mod analysis;
pub mod backend;
pub mod detection;
pub mod error;
pub mod grid;
pub mod image_utils;
pub mod pipeline;
pub mod report;
pub mod scratch;
pub mod session;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub block_size: u32,
    pub threshold_percent: f64,
    pub ela_quality: u8,
    pub denoise: DenoiseMethod,
    pub nl_means: NlMeansParams,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            block_size: 32,
            threshold_percent: 80.0,
            ela_quality: 90,
            denoise: DenoiseMethod::Auto,
            nl_means: NlMeansParams::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SuspicionError::InvalidParameter(format!("Bad config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_threshold_percent(mut self, percent: f64) -> Self {
        self.threshold_percent = percent;
        self
    }

    pub fn with_ela_quality(mut self, quality: u8) -> Self {
        self.ela_quality = quality;
        self
    }

    pub fn with_denoise(mut self, method: DenoiseMethod) -> Self {
        self.denoise = method;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(SuspicionError::InvalidParameter(
                "Block size must be a positive integer".into(),
            ));
        }
        validate_percent(self.threshold_percent)?;
        JpegRecompressor::new(self.ela_quality)?;
        self.nl_means.validate()
    }
}

/// Single-shot analysis of one decoded image.
pub struct SuspicionAnalyzer {
    frame: Arc<RgbaImage>,
    config: AnalysisConfig,
    path: Option<String>,
}

impl SuspicionAnalyzer {
    /// Decodes `path`. Nothing is analyzed if decoding fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let image = image::open(&path)?;

        Ok(Self {
            frame: Arc::new(image.to_rgba8()),
            config: AnalysisConfig::default(),
            path: Some(path_str),
        })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self::from_rgba(image.to_rgba8())
    }

    pub fn from_rgba(frame: RgbaImage) -> Self {
        Self {
            frame: Arc::new(frame),
            config: AnalysisConfig::default(),
            path: None,
        }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    pub async fn analyze(&self) -> Result<SuspicionReport> {
        let recompressor = JpegRecompressor::new(self.config.ela_quality)?;
        self.analyze_with(&recompressor).await
    }

    pub async fn analyze_with<R: Recompressor>(&self, recompressor: &R) -> Result<SuspicionReport> {
        pipeline::run(Arc::clone(&self.frame), &self.config, recompressor, 0, || true)
            .await?
            .ok_or_else(|| SuspicionError::AnalysisFailed("Run was discarded".into()))
    }
}

/// One map per detector, all with the grid's shape.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorMaps {
    pub variance: ScoreMap,
    pub grid_artifacts: ScoreMap,
    pub residual_noise: ScoreMap,
    pub recompression: ScoreMap,
}

impl DetectorMaps {
    pub fn iter(&self) -> impl Iterator<Item = &ScoreMap> {
        [
            &self.variance,
            &self.grid_artifacts,
            &self.residual_noise,
            &self.recompression,
        ]
        .into_iter()
    }
}

#[derive(Debug, Clone)]
pub struct SuspicionReport {
    pub grid: BlockGrid,
    pub threshold_percent: f64,
    pub threshold: f64,
    pub composite: ScoreMap,
    pub mask: HighlightMask,
    /// Detector output before normalization.
    pub raw: DetectorMaps,
    /// Normalized maps after inversion, as fed to fusion.
    pub oriented: DetectorMaps,
    pub denoiser: DenoiserKind,
}

impl SuspicionReport {
    pub fn flagged_count(&self) -> usize {
        self.mask.iter().filter(|&&flag| flag).count()
    }

    /// Pixel rectangles of the flagged blocks, row-major.
    pub fn suspicious_blocks(&self) -> Vec<BlockRegion> {
        self.grid
            .regions()
            .filter(|region| self.mask[[region.by, region.bx]])
            .collect()
    }
}
