//! Framebuffers: the per-pixel estimate image and the splat accumulator
//! that receives light-tracing contributions.

use crate::Color;
use ember_math::Vec2;

/// Apply gamma correction (gamma = 2.0).
#[inline]
pub fn linear_to_gamma(linear: f32) -> f32 {
    if linear > 0.0 {
        linear.sqrt()
    } else {
        0.0
    }
}

/// Clamp a value to [0, 1] range.
#[inline]
pub fn clamp_01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

/// Convert a color to 8-bit RGBA.
pub fn color_to_rgba(color: Color) -> [u8; 4] {
    let r = (255.0 * clamp_01(linear_to_gamma(color.x))) as u8;
    let g = (255.0 * clamp_01(linear_to_gamma(color.y))) as u8;
    let b = (255.0 * clamp_01(linear_to_gamma(color.z))) as u8;
    [r, g, b, 255]
}

/// Linear RGB image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Color>,
}

impl ImageBuffer {
    /// Create a new image buffer filled with black.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::ZERO; pixel_count(width, height)],
        }
    }

    /// Get the pixel at (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        self.pixels[pixel_index(x, y, self.width)]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.pixels[pixel_index(x, y, self.width)] = color;
    }

    /// Convert to RGBA bytes (for display or saving).
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(pixel_count(self.width, self.height) * 4);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(*color));
        }
        bytes
    }
}

/// Pixels in a `width` x `height` image, computed without `u32` overflow.
#[inline]
pub(crate) fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Row-major index of pixel (x, y).
#[inline]
fn pixel_index(x: u32, y: u32, width: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Fractional bits of the splat accumulator.
pub const SPLAT_FRACTION_BITS: u32 = 24;

const SPLAT_SCALE: f32 = (1u64 << SPLAT_FRACTION_BITS) as f32;

/// Full-frame accumulator for contributions whose pixel is only known after
/// projecting a light vertex onto the film.
///
/// Each splat is quantized to fixed point before it is added, so the sum of
/// any set of splats is independent of the order in which they arrive and of
/// how they were spread across worker buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplatBuffer {
    width: u32,
    height: u32,
    cells: Vec<[i64; 3]>,
}

impl SplatBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![[0; 3]; pixel_count(width, height)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Distribute `value` over the four pixels nearest to the continuous
    /// raster position with a tent filter of radius one pixel. Pixel (i, j)
    /// is centered at (i + 0.5, j + 0.5). Non-finite values are dropped.
    pub fn splat(&mut self, raster: Vec2, value: Color) {
        if !value.is_finite() || !raster.is_finite() {
            return;
        }
        let x = raster.x - 0.5;
        let y = raster.y - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        for (dy, wy) in [(0, 1.0 - fy), (1, fy)] {
            for (dx, wx) in [(0, 1.0 - fx), (1, fx)] {
                let weight = wx * wy;
                if weight <= 0.0 {
                    continue;
                }
                self.add(x0 as i64 + dx, y0 as i64 + dy, value * weight);
            }
        }
    }

    fn add(&mut self, x: i64, y: i64, value: Color) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let cell = &mut self.cells[pixel_index(x as u32, y as u32, self.width)];
        for (acc, v) in cell.iter_mut().zip(value.to_array()) {
            *acc = acc.saturating_add(to_fixed(v));
        }
    }

    /// Sum another worker's splats into this buffer.
    pub fn merge(&mut self, other: &SplatBuffer) {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        for (acc, cell) in self.cells.iter_mut().zip(&other.cells) {
            for c in 0..3 {
                acc[c] = acc[c].saturating_add(cell[c]);
            }
        }
    }

    /// Accumulated radiance at pixel (x, y).
    pub fn get(&self, x: u32, y: u32) -> Color {
        let cell = self.cells[pixel_index(x, y, self.width)];
        Color::new(
            from_fixed(cell[0]),
            from_fixed(cell[1]),
            from_fixed(cell[2]),
        )
    }

    /// Convert to a linear image, multiplying every pixel by `scale`.
    pub fn to_image(&self, scale: f32) -> ImageBuffer {
        let mut image = ImageBuffer::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                image.set(x, y, self.get(x, y) * scale);
            }
        }
        image
    }
}

#[inline]
fn to_fixed(v: f32) -> i64 {
    // Float-to-int casts saturate
    (v * SPLAT_SCALE).round() as i64
}

#[inline]
fn from_fixed(v: i64) -> f32 {
    (v as f64 / SPLAT_SCALE as f64) as f32
}
