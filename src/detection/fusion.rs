use crate::{
    error::{Result, SuspicionError},
    grid::ScoreMap,
};

/// Guards the min-max denominator of a constant map.
pub const NORMALIZE_EPSILON: f64 = 1e-8;

/// Min-max scales a map into `[0, 1]`. The input is left untouched.
pub fn normalize(map: &ScoreMap) -> ScoreMap {
    if map.is_empty() {
        return map.clone();
    }

    let min = map.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = map.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min + NORMALIZE_EPSILON;

    map.mapv(|v| (v - min) / range)
}

pub fn invert(normalized: &ScoreMap) -> ScoreMap {
    normalized.mapv(|v| 1.0 - v)
}

/// Unweighted mean of oriented maps. Every map gets `1 / maps.len()`.
pub fn fuse(maps: &[&ScoreMap]) -> Result<ScoreMap> {
    let Some(first) = maps.first() else {
        return Err(SuspicionError::InvalidParameter(
            "Fusion needs at least one score map".into(),
        ));
    };

    let expected = first.dim();
    let mut composite = ScoreMap::zeros(expected);

    for map in maps {
        if map.dim() != expected {
            return Err(SuspicionError::ShapeMismatch {
                expected,
                found: map.dim(),
            });
        }
        composite += *map;
    }

    let weight = 1.0 / maps.len() as f64;
    composite.mapv_inplace(|v| v * weight);

    Ok(composite)
}
