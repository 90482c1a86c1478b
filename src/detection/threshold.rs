use crate::{
    error::{Result, SuspicionError},
    grid::{HighlightMask, ScoreMap},
};

pub fn validate_percent(percent: f64) -> Result<()> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(SuspicionError::InvalidParameter(format!(
            "Threshold percent must lie in [0, 100], got {percent}"
        )));
    }
    Ok(())
}

/// Nearest-rank percentile: the sorted value at `floor(N * percent / 100)`.
///
/// No interpolation between ranks. At `percent == 100` the rank is clamped
/// to the last element.
pub fn nearest_rank_threshold(composite: &ScoreMap, percent: f64) -> Result<f64> {
    validate_percent(percent)?;

    let mut values = composite.iter().cloned().collect::<Vec<_>>();
    if values.is_empty() {
        return Err(SuspicionError::EmptyImage);
    }
    values.sort_by(f64::total_cmp);

    let rank = (values.len() as f64 * percent / 100.0).floor() as usize;
    Ok(values[rank.min(values.len() - 1)])
}

/// A block is suspicious iff its composite score reaches the threshold.
pub fn highlight(composite: &ScoreMap, threshold: f64) -> HighlightMask {
    composite.mapv(|v| v >= threshold)
}
