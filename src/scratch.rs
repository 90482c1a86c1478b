use image::{GrayImage, RgbaImage};
use log::trace;
use ndarray::Array2;

/// Intermediate buffers owned by exactly one analysis run.
///
/// Everything a run allocates on the way to its score maps lives here and is
/// released together when the arena drops, whether the run completed, failed
/// or went stale.
#[derive(Debug, Default)]
pub struct RunScratch {
    generation: u64,
    pub(crate) gray: Option<GrayImage>,
    pub(crate) denoised: Option<GrayImage>,
    pub(crate) residual: Option<Array2<f64>>,
    pub(crate) recompressed: Option<RgbaImage>,
}

impl RunScratch {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            gray: None,
            denoised: None,
            residual: None,
            recompressed: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Frees the grayscale, denoised and residual buffers and returns the
    /// bytes released. The recompressed frame, if any, is kept.
    pub fn release_luminance(&mut self) -> usize {
        let before = self.bytes();
        self.gray = None;
        self.denoised = None;
        self.residual = None;
        before - self.bytes()
    }

    pub fn bytes(&self) -> usize {
        let gray = self.gray.as_ref().map_or(0, |b| b.as_raw().len());
        let denoised = self.denoised.as_ref().map_or(0, |b| b.as_raw().len());
        let residual = self
            .residual
            .as_ref()
            .map_or(0, |r| r.len() * size_of::<f64>());
        let recompressed = self.recompressed.as_ref().map_or(0, |b| b.as_raw().len());

        gray + denoised + residual + recompressed
    }
}

impl Drop for RunScratch {
    fn drop(&mut self) {
        trace!(
            "Run {} released {} scratch bytes",
            self.generation,
            self.bytes()
        );
    }
}
