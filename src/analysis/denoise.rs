use image::GrayImage;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SuspicionError};

#[cfg(feature = "nl-means")]
use rayon::prelude::*;

/// Denoising method requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DenoiseMethod {
    /// Non-local means when available, box blur otherwise.
    #[default]
    Auto,
    NonLocalMeans,
    BoxBlur,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NlMeansParams {
    /// Filter strength `h`; larger values smooth more.
    pub strength: f64,
    pub template_window: u32,
    pub search_window: u32,
}

impl Default for NlMeansParams {
    fn default() -> Self {
        Self {
            strength: 10.0,
            template_window: 7,
            search_window: 21,
        }
    }
}

impl NlMeansParams {
    pub fn validate(&self) -> Result<()> {
        if !self.strength.is_finite() || self.strength <= 0.0 {
            return Err(SuspicionError::InvalidParameter(
                "Non-local means strength must be positive".into(),
            ));
        }
        for (name, window) in [
            ("template", self.template_window),
            ("search", self.search_window),
        ] {
            if window == 0 || window % 2 == 0 {
                return Err(SuspicionError::InvalidParameter(format!(
                    "Non-local means {name} window must be odd, got {window}"
                )));
            }
        }
        Ok(())
    }
}

/// Which filter actually produced the denoised copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenoiserKind {
    NonLocalMeans,
    BoxBlur,
}

/// Denoising capability, resolved once per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Denoiser {
    NonLocalMeans(NlMeansParams),
    BoxBlur,
}

impl Denoiser {
    /// Whether this build carries the non-local means filter.
    pub const fn nl_means_available() -> bool {
        cfg!(feature = "nl-means")
    }

    pub fn resolve(method: DenoiseMethod, params: NlMeansParams, nl_means_available: bool) -> Self {
        match method {
            DenoiseMethod::BoxBlur => Denoiser::BoxBlur,
            DenoiseMethod::Auto | DenoiseMethod::NonLocalMeans if nl_means_available => {
                Denoiser::NonLocalMeans(params)
            }
            DenoiseMethod::Auto | DenoiseMethod::NonLocalMeans => {
                warn!("Non-local means denoising unavailable, falling back to 3x3 box blur");
                Denoiser::BoxBlur
            }
        }
    }

    pub fn kind(&self) -> DenoiserKind {
        match self {
            Denoiser::NonLocalMeans(_) => DenoiserKind::NonLocalMeans,
            Denoiser::BoxBlur => DenoiserKind::BoxBlur,
        }
    }

    pub fn apply(&self, gray: &GrayImage) -> GrayImage {
        match self {
            #[cfg(feature = "nl-means")]
            Denoiser::NonLocalMeans(params) => non_local_means(gray, params),
            #[cfg(not(feature = "nl-means"))]
            Denoiser::NonLocalMeans(_) => box_blur(gray),
            Denoiser::BoxBlur => box_blur(gray),
        }
    }
}

/// 3x3 box filter with the same reflect-101 border as non-local means.
pub fn box_blur(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let (w, h) = (width as usize, height as usize);
    let padded = GrayImage::from_fn(width + 2, height + 2, |px, py| {
        let sx = reflect101(px as isize - 1, w);
        let sy = reflect101(py as isize - 1, h);
        *gray.get_pixel(sx as u32, sy as u32)
    });

    let blurred = imageproc::filter::box_filter(&padded, 1, 1);
    image::imageops::crop_imm(&blurred, 1, 1, width, height).to_image()
}

#[cfg(feature = "nl-means")]
const BAND_ROWS: usize = 32;

/// Non-local means with a square template and search window.
///
/// Each pixel becomes the weighted mean of every pixel in its search window,
/// weighted by `exp(-d² / h²)` where `d²` is the mean squared difference of
/// the two templates. Template sums come from one integral image per search
/// offset, built band by band; bands run in parallel. Borders reflect
/// without repeating the edge pixel.
#[cfg(feature = "nl-means")]
pub fn non_local_means(gray: &GrayImage, params: &NlMeansParams) -> GrayImage {
    let (width, height) = gray.dimensions();
    let w = width as usize;
    let t = (params.template_window / 2) as usize;
    let s = (params.search_window / 2) as isize;
    let pad = s as usize + t;
    let span = 2 * t + 1;
    let area = (span * span) as f64;
    let h2 = params.strength * params.strength;

    let mut out = GrayImage::new(width, height);
    if w == 0 || height == 0 {
        return out;
    }
    let padded = Padded::reflect(gray, pad);

    let pixels: &mut [u8] = &mut out;
    pixels
        .par_chunks_mut(w * BAND_ROWS)
        .enumerate()
        .for_each(|(band, chunk)| {
            let y0 = band * BAND_ROWS;
            let rows = chunk.len() / w;
            let iw = w + 2 * t;
            let ih = rows + 2 * t;
            let stride = iw + 1;

            let mut integral = vec![0.0f64; (ih + 1) * stride];
            let mut num = vec![0.0f64; rows * w];
            let mut den = vec![0.0f64; rows * w];

            for dy in -s..=s {
                for dx in -s..=s {
                    for yy in 0..ih {
                        let py = y0 + pad - t + yy;
                        let qy = (py as isize + dy) as usize;
                        let mut row_sum = 0.0;
                        for xx in 0..iw {
                            let px = pad - t + xx;
                            let qx = (px as isize + dx) as usize;
                            let d = padded.at(py, px) - padded.at(qy, qx);
                            row_sum += d * d;
                            integral[(yy + 1) * stride + xx + 1] =
                                integral[yy * stride + xx + 1] + row_sum;
                        }
                    }

                    for i in 0..rows {
                        let qy = (y0 + i + pad) as isize + dy;
                        for j in 0..w {
                            let ssd = integral[(i + span) * stride + j + span]
                                - integral[i * stride + j + span]
                                - integral[(i + span) * stride + j]
                                + integral[i * stride + j];
                            let weight = (-(ssd / area).max(0.0) / h2).exp();
                            let qx = (j + pad) as isize + dx;

                            let k = i * w + j;
                            num[k] += weight * padded.at(qy as usize, qx as usize);
                            den[k] += weight;
                        }
                    }
                }
            }

            for (k, px) in chunk.iter_mut().enumerate() {
                *px = (num[k] / den[k]).round().clamp(0.0, 255.0) as u8;
            }
        });

    out
}

#[cfg(feature = "nl-means")]
struct Padded {
    data: Vec<f64>,
    stride: usize,
}

#[cfg(feature = "nl-means")]
impl Padded {
    fn reflect(gray: &GrayImage, pad: usize) -> Self {
        let (width, height) = gray.dimensions();
        let (w, h) = (width as usize, height as usize);
        let stride = w + 2 * pad;
        let mut data = Vec::with_capacity(stride * (h + 2 * pad));

        for py in 0..h + 2 * pad {
            let sy = reflect101(py as isize - pad as isize, h);
            for px in 0..stride {
                let sx = reflect101(px as isize - pad as isize, w);
                data.push(gray.get_pixel(sx as u32, sy as u32)[0] as f64);
            }
        }

        Self { data, stride }
    }

    #[inline]
    fn at(&self, y: usize, x: usize) -> f64 {
        self.data[y * self.stride + x]
    }
}

/// Mirror index into `0..n` without repeating the edge sample.
fn reflect101(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}
