mod common;

use common::{IdentityRecompressor, PatchRecompressor, flat, flat_with_noise_block};
use suspicion_map::{
    AnalysisConfig, SuspicionAnalyzer, analysis::denoise::DenoiseMethod,
    analysis::denoise::DenoiserKind,
};

fn box_blur_config() -> AnalysisConfig {
    AnalysisConfig::default().with_denoise(DenoiseMethod::BoxBlur)
}

#[tokio::test]
async fn uniform_image_flags_every_block() {
    let _ = env_logger::builder().is_test(true).try_init();
    let analyzer = SuspicionAnalyzer::from_rgba(flat(128, 128, 77)).with_config(box_blur_config());
    let report = analyzer.analyze_with(&IdentityRecompressor).await.unwrap();

    for map in [
        &report.raw.variance,
        &report.raw.grid_artifacts,
        &report.raw.residual_noise,
        &report.raw.recompression,
    ] {
        assert!(map.iter().all(|&v| v == 0.0));
    }
    assert!(report.oriented.variance.iter().all(|&v| v == 1.0));
    assert!(report.oriented.recompression.iter().all(|&v| v == 0.0));
    assert!(report.composite.iter().all(|&v| v == 0.75));
    assert_eq!(report.threshold, 0.75);
    assert_eq!(report.flagged_count(), 16);
}

#[tokio::test]
async fn uniform_image_with_jpeg_round_trip() {
    let analyzer = SuspicionAnalyzer::from_rgba(flat(128, 128, 128)).with_config(box_blur_config());
    let report = analyzer.analyze().await.unwrap();

    let first = report.raw.recompression[[0, 0]];
    assert!(report.raw.recompression.iter().all(|&v| v == first));
    assert!(report.mask.iter().all(|&flag| flag));
}

#[tokio::test]
async fn noise_block_is_not_flagged_by_variance() {
    let frame = flat_with_noise_block(128, 128, 2, 1, 32);
    let analyzer = SuspicionAnalyzer::from_rgba(frame).with_config(box_blur_config());
    let report = analyzer.analyze_with(&IdentityRecompressor).await.unwrap();

    let variance = &report.raw.variance;
    assert!(variance[[1, 2]] > 100.0);
    for ((by, bx), &v) in variance.indexed_iter() {
        if (by, bx) != (1, 2) {
            assert_eq!(v, 0.0, "block ({by}, {bx})");
        }
    }

    // Inverted: the textured block contributes the least suspicion.
    assert!(report.oriented.variance[[1, 2]] < 1e-6);
    assert!(report.composite[[1, 2]] < report.composite[[0, 0]]);
    assert!(!report.mask[[1, 2]]);
}

#[tokio::test]
async fn partial_edge_blocks_are_represented() {
    let analyzer = SuspicionAnalyzer::from_rgba(flat(100, 50, 10)).with_config(box_blur_config());
    let report = analyzer.analyze_with(&IdentityRecompressor).await.unwrap();

    assert_eq!(report.grid.shape(), (2, 4));
    assert_eq!(report.composite.dim(), (2, 4));
    assert_eq!(report.mask.dim(), (2, 4));

    let corner = report.grid.region(1, 3);
    assert_eq!((corner.width, corner.height), (4, 18));

    let blocks = report.suspicious_blocks();
    assert_eq!(blocks.len(), 8);
    assert!(blocks.iter().all(|b| b.x_end() <= 100 && b.y_end() <= 50));
}

#[tokio::test]
async fn recompression_difference_stays_in_one_block() {
    let recompressor = PatchRecompressor {
        x: 32,
        y: 64,
        size: 32,
        delta: 6,
    };
    let analyzer = SuspicionAnalyzer::from_rgba(flat(128, 128, 90)).with_config(box_blur_config());
    let report = analyzer.analyze_with(&recompressor).await.unwrap();

    for ((by, bx), &v) in report.raw.recompression.indexed_iter() {
        if (by, bx) == (2, 1) {
            assert!((v - 6.0).abs() < 1e-12);
        } else {
            assert_eq!(v, 0.0, "block ({by}, {bx})");
        }
    }

    let top = report
        .composite
        .indexed_iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, _)| index);
    assert_eq!(top, Some((2, 1)));
}

#[cfg(feature = "nl-means")]
#[tokio::test]
async fn default_config_uses_non_local_means() {
    let frame = flat_with_noise_block(64, 64, 1, 0, 32);
    let report = SuspicionAnalyzer::from_rgba(frame)
        .analyze_with(&IdentityRecompressor)
        .await
        .unwrap();

    assert_eq!(report.denoiser, DenoiserKind::NonLocalMeans);
    assert_eq!(report.raw.residual_noise.dim(), (2, 2));
    assert!(report.raw.residual_noise.iter().all(|v| v.is_finite() && *v >= 0.0));
    assert!(report.composite.iter().all(|v| (0.0..=1.0).contains(v)));
}

#[tokio::test]
async fn threshold_percent_controls_flag_count() {
    let frame = flat_with_noise_block(128, 128, 0, 0, 32);
    let config = box_blur_config().with_threshold_percent(100.0);
    let report = SuspicionAnalyzer::from_rgba(frame)
        .with_config(config)
        .analyze_with(&IdentityRecompressor)
        .await
        .unwrap();

    let max = report.composite.iter().cloned().fold(f64::MIN, f64::max);
    assert_eq!(report.threshold, max);
    assert!(report.flagged_count() >= 1);
    assert_eq!(report.denoiser, DenoiserKind::BoxBlur);
}
