use serde::Serialize;

use crate::{
    SuspicionReport,
    analysis::denoise::DenoiserKind,
    grid::{BlockRegion, ScoreMap},
};

#[derive(Serialize)]
pub struct JsonReport {
    pub width: u32,
    pub height: u32,
    pub block_size: u32,
    pub rows: usize,
    pub columns: usize,
    pub threshold_percent: f64,
    pub threshold: f64,
    pub flagged_blocks: usize,
    pub denoiser: DenoiserKind,
    pub suspicious_regions: Vec<BlockRegion>,
    pub composite: Vec<Vec<f64>>,
    pub detectors: DetectorSection,
}

#[derive(Serialize)]
pub struct DetectorSection {
    pub variance: MapSummary,
    pub grid_artifacts: MapSummary,
    pub residual_noise: MapSummary,
    pub recompression: MapSummary,
}

#[derive(Serialize)]
pub struct MapSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl From<&ScoreMap> for MapSummary {
    fn from(map: &ScoreMap) -> Self {
        Self {
            min: map.iter().cloned().fold(f64::INFINITY, f64::min),
            max: map.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            mean: map.mean().unwrap_or(0.0),
        }
    }
}

impl From<&SuspicionReport> for JsonReport {
    fn from(report: &SuspicionReport) -> Self {
        Self {
            width: report.grid.width,
            height: report.grid.height,
            block_size: report.grid.block_size,
            rows: report.grid.by_count,
            columns: report.grid.bx_count,
            threshold_percent: report.threshold_percent,
            threshold: report.threshold,
            flagged_blocks: report.flagged_count(),
            denoiser: report.denoiser,
            suspicious_regions: report.suspicious_blocks(),
            composite: report
                .composite
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            detectors: DetectorSection {
                variance: MapSummary::from(&report.raw.variance),
                grid_artifacts: MapSummary::from(&report.raw.grid_artifacts),
                residual_noise: MapSummary::from(&report.raw.residual_noise),
                recompression: MapSummary::from(&report.raw.recompression),
            },
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{DetectorMaps, grid::BlockGrid};

    fn report() -> SuspicionReport {
        let maps = DetectorMaps {
            variance: array![[1.0, 3.0]],
            grid_artifacts: array![[0.0, 0.0]],
            residual_noise: array![[2.0, 2.0]],
            recompression: array![[0.5, 0.0]],
        };
        SuspicionReport {
            grid: BlockGrid::new(40, 20, 20).unwrap(),
            threshold_percent: 80.0,
            threshold: 0.7,
            composite: array![[0.7, 0.2]],
            mask: array![[true, false]],
            raw: maps.clone(),
            oriented: maps,
            denoiser: DenoiserKind::BoxBlur,
        }
    }

    #[test]
    fn summarizes_report() {
        let json = JsonReport::from(&report());
        assert_eq!((json.rows, json.columns), (1, 2));
        assert_eq!(json.flagged_blocks, 1);
        assert_eq!(json.suspicious_regions.len(), 1);
        assert_eq!(json.suspicious_regions[0].x, 0);
        assert_eq!(json.composite, vec![vec![0.7, 0.2]]);
        assert_eq!(json.detectors.variance.max, 3.0);
        assert_eq!(json.detectors.variance.mean, 2.0);
    }

    #[test]
    fn serializes_to_json() {
        let text = JsonReport::from(&report()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["flagged_blocks"], 1);
        assert_eq!(value["denoiser"], "BoxBlur");
        assert_eq!(value["suspicious_regions"][0]["width"], 20);
    }
}
