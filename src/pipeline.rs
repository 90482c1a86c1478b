use std::sync::Arc;

use image::RgbaImage;
use log::{debug, trace};

use crate::{
    AnalysisConfig, DetectorMaps, SuspicionReport,
    analysis::{
        denoise::{Denoiser, DenoiserKind},
        ela::{RecompressionDetector, Recompressor},
        grid_artifacts::GridArtifactDetector,
        residual_noise::ResidualNoiseDetector,
        variance::VarianceDetector,
    },
    backend,
    detection::{
        BlockDetector,
        fusion::{fuse, normalize},
        threshold::{highlight, nearest_rank_threshold},
    },
    error::Result,
    grid::{BlockGrid, ScoreMap},
    image_utils::rgba_to_gray,
    scratch::RunScratch,
};

/// Output of the synchronous detectors, kept while the round trip is pending.
struct SyncStage {
    grid: BlockGrid,
    variance: ScoreMap,
    grid_artifacts: ScoreMap,
    residual_noise: ScoreMap,
    scratch: RunScratch,
}

impl SyncStage {
    /// Drops the luminance buffers; only the score maps outlive the stage.
    fn release_buffers(&mut self) -> usize {
        self.scratch.release_luminance()
    }
}

fn synchronous_stage(
    frame: &RgbaImage,
    block_size: u32,
    denoiser: Denoiser,
    generation: u64,
) -> Result<SyncStage> {
    let (width, height) = frame.dimensions();
    let grid = BlockGrid::new(width, height, block_size)?;
    let mut scratch = RunScratch::new(generation);

    let gray = scratch.gray.insert(rgba_to_gray(frame));
    let variance_detector = VarianceDetector::new();
    let grid_detector = GridArtifactDetector::new();
    let variance = variance_detector.score(gray, &grid)?;
    let grid_artifacts = grid_detector.score(gray, &grid)?;

    let residual_detector = ResidualNoiseDetector::new(denoiser);
    let denoised = scratch.denoised.insert(residual_detector.denoise(gray));
    let residual = scratch
        .residual
        .insert(ResidualNoiseDetector::residual(gray, denoised));
    let residual_noise = ResidualNoiseDetector::score_residual(residual, &grid);

    trace!(
        "Run {generation}: {}, {} and {} ({:?}) scored",
        variance_detector.name(),
        grid_detector.name(),
        residual_detector.name(),
        denoiser.kind()
    );

    Ok(SyncStage {
        grid,
        variance,
        grid_artifacts,
        residual_noise,
        scratch,
    })
}

/// Normalizes, orients and fuses the raw maps, then thresholds the result.
pub fn decide(
    grid: BlockGrid,
    raw: DetectorMaps,
    threshold_percent: f64,
    denoiser: DenoiserKind,
) -> Result<SuspicionReport> {
    for map in raw.iter() {
        grid.check_shape(map)?;
    }

    let oriented = DetectorMaps {
        variance: VarianceDetector::POLARITY.orient(normalize(&raw.variance)),
        grid_artifacts: GridArtifactDetector::POLARITY.orient(normalize(&raw.grid_artifacts)),
        residual_noise: ResidualNoiseDetector::POLARITY.orient(normalize(&raw.residual_noise)),
        recompression: RecompressionDetector::POLARITY.orient(normalize(&raw.recompression)),
    };

    let composite = fuse(&oriented.iter().collect::<Vec<_>>())?;
    let threshold = nearest_rank_threshold(&composite, threshold_percent)?;
    let mask = highlight(&composite, threshold);

    Ok(SuspicionReport {
        grid,
        threshold_percent,
        threshold,
        composite,
        mask,
        raw,
        oriented,
        denoiser,
    })
}

/// Runs one analysis over `frame`.
///
/// The three synchronous detectors finish first and their maps are held
/// across the recompression round trip. Returns `Ok(None)` when `is_current`
/// reports the run was superseded; nothing from a superseded run escapes.
pub async fn run<R, F>(
    frame: Arc<RgbaImage>,
    config: &AnalysisConfig,
    recompressor: &R,
    generation: u64,
    is_current: F,
) -> Result<Option<SuspicionReport>>
where
    R: Recompressor,
    F: Fn() -> bool,
{
    config.validate()?;
    let backend = backend::ready().await?;
    let denoiser = Denoiser::resolve(config.denoise, config.nl_means, backend.nl_means);

    let stage_frame = Arc::clone(&frame);
    let block_size = config.block_size;
    let mut stage = tokio::task::spawn_blocking(move || {
        synchronous_stage(&stage_frame, block_size, denoiser, generation)
    })
    .await??;
    let released = stage.release_buffers();
    trace!("Run {generation}: released {released} luminance bytes before recompression");

    if !is_current() {
        debug!("Run {generation} superseded before recompression, discarding");
        return Ok(None);
    }

    let recompressed = recompressor.round_trip(Arc::clone(&frame)).await?;

    if !is_current() {
        debug!("Run {generation} superseded during recompression, discarding");
        return Ok(None);
    }

    let SyncStage {
        grid,
        variance,
        grid_artifacts,
        residual_noise,
        mut scratch,
    } = stage;

    let recompressed = scratch.recompressed.insert(recompressed);
    let recompression = RecompressionDetector::new().score(&frame, recompressed, &grid)?;

    debug!(
        "Run {generation}: {}x{} blocks scored, {} scratch bytes in use",
        grid.by_count,
        grid.bx_count,
        scratch.bytes()
    );

    let raw = DetectorMaps {
        variance,
        grid_artifacts,
        residual_noise,
        recompression,
    };

    decide(grid, raw, config.threshold_percent, denoiser.kind()).map(Some)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, array};

    use super::*;
    use crate::detection::Polarity;

    #[test]
    fn decide_combines_polarities() {
        let grid = BlockGrid::new(2, 1, 1).unwrap();
        // Block 0 is smooth, gridless, noiseless and has high ELA error.
        let raw = DetectorMaps {
            variance: array![[0.0, 50.0]],
            grid_artifacts: array![[0.0, 4.0]],
            residual_noise: array![[0.0, 9.0]],
            recompression: array![[3.0, 0.0]],
        };
        let report = decide(grid, raw, 50.0, DenoiserKind::BoxBlur).unwrap();

        assert!(report.composite[[0, 0]] > 0.99);
        assert!(report.composite[[0, 1]] < 0.01);
        assert_eq!(report.mask, array![[true, false]]);
    }

    #[test]
    fn decide_rejects_misshapen_maps() {
        let grid = BlockGrid::new(4, 4, 2).unwrap();
        let raw = DetectorMaps {
            variance: Array2::zeros((2, 2)),
            grid_artifacts: Array2::zeros((2, 2)),
            residual_noise: Array2::zeros((1, 2)),
            recompression: Array2::zeros((2, 2)),
        };
        assert!(decide(grid, raw, 80.0, DenoiserKind::BoxBlur).is_err());
    }

    #[test]
    fn synchronous_stage_fills_scratch() {
        let frame = RgbaImage::from_fn(20, 12, |x, y| image::Rgba([(x * 9) as u8, (y * 13) as u8, 7, 255]));
        let stage = synchronous_stage(&frame, 8, Denoiser::BoxBlur, 1).unwrap();

        assert_eq!(stage.grid.shape(), (2, 3));
        assert_eq!(stage.variance.dim(), (2, 3));
        assert_eq!(stage.grid_artifacts.dim(), (2, 3));
        assert_eq!(stage.residual_noise.dim(), (2, 3));
        assert_eq!(stage.scratch.bytes(), 240 + 240 + 240 * 8);
    }

    #[test]
    fn luminance_buffers_are_released_before_recompression() {
        let frame = RgbaImage::from_fn(16, 16, |x, y| image::Rgba([(x * y) as u8, 0, 0, 255]));
        let mut stage = synchronous_stage(&frame, 8, Denoiser::BoxBlur, 2).unwrap();
        let variance = stage.variance.clone();

        assert_eq!(stage.release_buffers(), 256 + 256 + 256 * 8);
        assert_eq!(stage.scratch.bytes(), 0);
        assert_eq!(stage.variance, variance);
        assert_eq!(stage.residual_noise.dim(), (2, 2));
    }

    #[test]
    fn orientation_does_not_depend_on_denoiser() {
        assert_eq!(VarianceDetector::POLARITY, Polarity::Inverted);
        assert_eq!(GridArtifactDetector::POLARITY, Polarity::Inverted);
        assert_eq!(ResidualNoiseDetector::POLARITY, Polarity::Inverted);
        assert_eq!(RecompressionDetector::POLARITY, Polarity::Direct);
        for denoiser in [Denoiser::BoxBlur, Denoiser::NonLocalMeans(Default::default())] {
            assert_eq!(ResidualNoiseDetector::new(denoiser).polarity(), Polarity::Inverted);
        }
    }
}
