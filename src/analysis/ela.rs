use std::{future::Future, io::Cursor, sync::Arc};

use image::{
    DynamicImage, ImageFormat, RgbImage, RgbaImage, buffer::ConvertBuffer,
    codecs::jpeg::JpegEncoder,
};

use crate::{
    detection::Polarity,
    error::{Result, SuspicionError},
    grid::{BlockGrid, ScoreMap},
    image_utils::channel_abs_diff_sum,
};

/// Channel compared between the original and recompressed frames (red).
pub const ELA_CHANNEL: usize = 0;

/// Lossy re-encode followed by a decode back to RGBA of the same size.
///
/// The round trip may complete on another thread or after an external
/// callback, so it is awaited rather than called.
pub trait Recompressor: Send + Sync {
    fn round_trip(&self, frame: Arc<RgbaImage>) -> impl Future<Output = Result<RgbaImage>> + Send;
}

/// JPEG round trip through the `image` codecs, run on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct JpegRecompressor {
    quality: u8,
}

impl JpegRecompressor {
    pub fn new(quality: u8) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(SuspicionError::InvalidParameter(format!(
                "JPEG quality must be between 1 and 100, got {quality}"
            )));
        }
        Ok(Self { quality })
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn recompress(&self, frame: &RgbaImage) -> Result<RgbaImage> {
        let rgb: RgbImage = frame.convert();
        let mut buffer = Cursor::new(Vec::new());

        let encoder = JpegEncoder::new_with_quality(&mut buffer, self.quality);
        DynamicImage::ImageRgb8(rgb).write_with_encoder(encoder)?;

        let decoded =
            image::load_from_memory_with_format(buffer.get_ref(), ImageFormat::Jpeg)?.to_rgba8();

        if decoded.dimensions() != frame.dimensions() {
            return Err(SuspicionError::DimensionMismatch {
                expected: frame.dimensions(),
                found: decoded.dimensions(),
            });
        }

        Ok(decoded)
    }
}

impl Default for JpegRecompressor {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

impl Recompressor for JpegRecompressor {
    async fn round_trip(&self, frame: Arc<RgbaImage>) -> Result<RgbaImage> {
        let codec = *self;
        tokio::task::spawn_blocking(move || codec.recompress(&frame)).await?
    }
}

/// Error level analysis: mean single-channel delta per block after a lossy
/// round trip.
///
/// Sums are divided by the nominal `block_size²` even for clipped edge
/// blocks. Content with a different compression history than its
/// surroundings stands out, so the score is used without inversion.
#[derive(Debug, Clone, Copy)]
pub struct RecompressionDetector {
    channel: usize,
}

impl RecompressionDetector {
    pub fn new() -> Self {
        Self {
            channel: ELA_CHANNEL,
        }
    }

    pub fn score(
        &self,
        original: &RgbaImage,
        recompressed: &RgbaImage,
        grid: &BlockGrid,
    ) -> Result<ScoreMap> {
        let expected = (grid.width, grid.height);
        for found in [original.dimensions(), recompressed.dimensions()] {
            if found != expected {
                return Err(SuspicionError::DimensionMismatch { expected, found });
            }
        }

        let area = grid.nominal_area();
        Ok(grid.map_blocks(|region| {
            channel_abs_diff_sum(original, recompressed, self.channel, region) / area
        }))
    }

    pub const POLARITY: Polarity = Polarity::Direct;

    pub fn polarity(&self) -> Polarity {
        Self::POLARITY
    }

    pub fn name(&self) -> &str {
        "recompression"
    }
}

impl Default for RecompressionDetector {
    fn default() -> Self {
        Self::new()
    }
}
