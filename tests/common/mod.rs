#![allow(dead_code)]

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use suspicion_map::{analysis::ela::Recompressor, error::Result};

pub fn flat(width: u32, height: u32, value: u8) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
}

/// Deterministic xorshift noise in `0..=255`.
pub struct Noise(u32);

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u8(&mut self) -> u8 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        (self.0 >> 24) as u8
    }
}

/// Flat image with one `size`-square block filled with gray noise.
pub fn flat_with_noise_block(width: u32, height: u32, bx: u32, by: u32, size: u32) -> RgbaImage {
    let mut image = flat(width, height, 128);
    let mut noise = Noise::new(0x9e37_79b9);
    for y in by * size..(by + 1) * size {
        for x in bx * size..(bx + 1) * size {
            let v = noise.next_u8();
            image.put_pixel(x, y, Rgba([v, v, v, 255]));
        }
    }
    image
}

/// Returns the frame untouched, as a lossless codec would.
pub struct IdentityRecompressor;

impl Recompressor for IdentityRecompressor {
    async fn round_trip(&self, frame: Arc<RgbaImage>) -> Result<RgbaImage> {
        Ok((*frame).clone())
    }
}

/// Shifts the red channel of one pixel rectangle, leaving the rest intact.
pub struct PatchRecompressor {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub delta: u8,
}

impl Recompressor for PatchRecompressor {
    async fn round_trip(&self, frame: Arc<RgbaImage>) -> Result<RgbaImage> {
        let mut out = (*frame).clone();
        for y in self.y..self.y + self.size {
            for x in self.x..self.x + self.size {
                let pixel = out.get_pixel_mut(x, y);
                pixel[0] = pixel[0].saturating_add(self.delta);
            }
        }
        Ok(out)
    }
}
