use image::{GrayImage, Luma, RgbaImage};
use ndarray::Array2;

use crate::grid::BlockRegion;

/// Rec. 601 luma; alpha is ignored.
pub fn rgba_to_gray(image: &RgbaImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);

    for (x, y, pixel) in image.enumerate_pixels() {
        let lum = 0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
        gray.put_pixel(x, y, Luma([lum.round().clamp(0.0, 255.0) as u8]));
    }

    gray
}

pub fn gray_to_array(image: &GrayImage) -> Array2<f64> {
    let (width, height) = image.dimensions();
    let mut arr = Array2::zeros((height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        arr[[y as usize, x as usize]] = pixel[0] as f64;
    }

    arr
}

/// `original - processed`, signed.
pub fn difference(original: &GrayImage, processed: &GrayImage) -> Array2<f64> {
    let mut residual = gray_to_array(original);
    for (x, y, pixel) in processed.enumerate_pixels() {
        residual[[y as usize, x as usize]] -= pixel[0] as f64;
    }
    residual
}

/// Mean and mean of squares over a clipped region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionMoments {
    pub mean: f64,
    pub mean_sq: f64,
}

impl RegionMoments {
    /// Population variance, `E[x²] - E[x]²`, floored at zero against rounding.
    pub fn variance(&self) -> f64 {
        (self.mean_sq - self.mean * self.mean).max(0.0)
    }
}

pub fn region_moments(values: &Array2<f64>, region: &BlockRegion) -> RegionMoments {
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut count = 0usize;

    for y in region.y..region.y_end() {
        for x in region.x..region.x_end() {
            let val = values[[y as usize, x as usize]];
            sum += val;
            sum_sq += val * val;
            count += 1;
        }
    }

    if count == 0 {
        return RegionMoments {
            mean: 0.0,
            mean_sq: 0.0,
        };
    }

    RegionMoments {
        mean: sum / count as f64,
        mean_sq: sum_sq / count as f64,
    }
}

/// Sum of `|a - b|` over one channel of a region of two equally sized buffers.
pub fn channel_abs_diff_sum(
    a: &RgbaImage,
    b: &RgbaImage,
    channel: usize,
    region: &BlockRegion,
) -> f64 {
    let mut sum = 0.0;

    for y in region.y..region.y_end() {
        for x in region.x..region.x_end() {
            let pa = a.get_pixel(x, y)[channel] as i32;
            let pb = b.get_pixel(x, y)[channel] as i32;
            sum += (pa - pb).abs() as f64;
        }
    }

    sum
}
