//! RGBA pixel buffer with the brightness/contrast pass.

use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use serde::Serialize;

use super::NormalizeError;

/// Mean luminance below which an image counts as dark.
pub const DARK_THRESHOLD: f64 = 100.0;

/// Mean luminance above which an image counts as bright.
pub const BRIGHT_THRESHOLD: f64 = 180.0;

/// Brightness class of an image, chosen from its mean luminance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BrightnessTier {
    Dark,
    Mid,
    Bright,
}

impl BrightnessTier {
    pub fn classify(mean_luminance: f64) -> Self {
        if mean_luminance < DARK_THRESHOLD {
            Self::Dark
        } else if mean_luminance > BRIGHT_THRESHOLD {
            Self::Bright
        } else {
            Self::Mid
        }
    }

    pub fn adjustment(self) -> Adjustment {
        match self {
            Self::Dark => Adjustment {
                brightness: 40.0,
                contrast: 1.2,
            },
            Self::Mid => Adjustment {
                brightness: 10.0,
                contrast: 1.1,
            },
            Self::Bright => Adjustment {
                brightness: -15.0,
                contrast: 1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustment {
    pub brightness: f32,
    pub contrast: f32,
}

impl Adjustment {
    /// `clamp((v - 128) * contrast + 128 + brightness, 0, 255)`
    pub fn apply_channel(&self, value: u8) -> u8 {
        let v = (f32::from(value) - 128.0) * self.contrast + 128.0 + self.brightness;
        v.round().clamp(0.0, 255.0) as u8
    }
}

/// Decoded RGBA grid. Mutated in place, consumed by encoding.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Average of R, G and B over every pixel. Alpha is ignored.
    pub fn mean_luminance(&self) -> f64 {
        let pixels = u64::from(self.image.width()) * u64::from(self.image.height());
        if pixels == 0 {
            return 0.0;
        }

        let sum: u64 = self
            .image
            .pixels()
            .map(|p| u64::from(p[0]) + u64::from(p[1]) + u64::from(p[2]))
            .sum();

        sum as f64 / (pixels as f64 * 3.0)
    }

    /// Apply an adjustment to the color channels of every pixel.
    pub fn apply(&mut self, adjustment: Adjustment) {
        let mut table = [0u8; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            *slot = adjustment.apply_channel(value as u8);
        }

        for pixel in self.image.pixels_mut() {
            pixel[0] = table[usize::from(pixel[0])];
            pixel[1] = table[usize::from(pixel[1])];
            pixel[2] = table[usize::from(pixel[2])];
        }
    }

    /// Encode as baseline JPEG. Alpha is dropped.
    pub fn encode_jpeg(self, quality: u8) -> Result<Vec<u8>, NormalizeError> {
        let rgb = DynamicImage::ImageRgba8(self.image).to_rgb8();
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
            .map_err(|e| NormalizeError::Encode(format!("JPEG encoding failed: {e}")))?;
        Ok(cursor.into_inner())
    }

    pub fn into_inner(self) -> RgbaImage {
        self.image
    }
}
