pub mod denoise;
pub mod ela;
pub mod grid_artifacts;
pub mod residual_noise;
pub mod variance;
