//! Fixed-size pixel buffers
//!
//! A `PixelBuffer` is the unit the buffer pool hands out and the renderer
//! writes into. Buffers are not `Clone`: a buffer is owned by exactly one of
//! the pool, a tile, or an in-flight render task at any time.

use image::{Rgba, RgbaImage};
use std::fmt;

/// Neutral color buffers are wiped to before reuse
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Memory layout of a pixel buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel, R G B A
    Rgba8888,

    /// 2 bytes per pixel, little-endian 5-6-5
    Rgb565,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgba8888 => 4,
            PixelFormat::Rgb565 => 2,
        }
    }
}

/// Resolution class of a pooled buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferClass {
    /// Full-resolution tile buffer
    Full,

    /// Low-resolution buffer used while a zoom gesture is active
    Thumbnail,
}

/// Identity of a pooled buffer, stable across recycles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Mutable rectangular pixel surface
pub struct PixelBuffer {
    id: BufferId,
    class: BufferClass,
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a buffer filled with [`WHITE`]
    pub fn new(
        id: BufferId,
        class: BufferClass,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        let mut buffer = Self {
            id,
            class,
            width,
            height,
            format,
            data: vec![0; len],
        };
        buffer.fill(WHITE);
        buffer
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn class(&self) -> BufferClass {
        self.class
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Raw bytes, row-major with no padding
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Overwrite every pixel with `color`
    pub fn fill(&mut self, color: Rgba<u8>) {
        let encoded = encode(self.format, color);
        let bpp = self.format.bytes_per_pixel();
        for chunk in self.data.chunks_exact_mut(bpp) {
            chunk.copy_from_slice(&encoded[..bpp]);
        }
    }

    /// Write one pixel; out of bounds writes are ignored
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        let encoded = encode(self.format, color);
        self.data[offset..offset + bpp].copy_from_slice(&encoded[..bpp]);
    }

    /// Read one pixel back as RGBA
    ///
    /// # Panics
    /// Panics if (`x`, `y`) lies outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        assert!(
            x < self.width && y < self.height,
            "pixel ({x}, {y}) out of bounds for {}x{} buffer",
            self.width,
            self.height
        );
        let bpp = self.format.bytes_per_pixel();
        let offset = (y as usize * self.width as usize + x as usize) * bpp;
        decode(self.format, &self.data[offset..offset + bpp])
    }

    /// Check if every pixel equals `color`
    pub fn is_filled_with(&self, color: Rgba<u8>) -> bool {
        let encoded = encode(self.format, color);
        let bpp = self.format.bytes_per_pixel();
        self.data
            .chunks_exact(bpp)
            .all(|chunk| chunk == &encoded[..bpp])
    }

    /// Copy the top-left `width` x `height` corner into an RGBA image
    ///
    /// The copied area is clipped to the buffer size.
    pub fn to_rgba_image(&self, width: u32, height: u32) -> RgbaImage {
        let width = width.min(self.width);
        let height = height.min(self.height);
        RgbaImage::from_fn(width, height, |x, y| self.pixel(x, y))
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("id", &self.id)
            .field("class", &self.class)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

fn encode(format: PixelFormat, color: Rgba<u8>) -> [u8; 4] {
    let [r, g, b, a] = color.0;
    match format {
        PixelFormat::Rgba8888 => [r, g, b, a],
        PixelFormat::Rgb565 => {
            let packed = ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3);
            let [lo, hi] = packed.to_le_bytes();
            [lo, hi, 0, 0]
        }
    }
}

fn decode(format: PixelFormat, bytes: &[u8]) -> Rgba<u8> {
    match format {
        PixelFormat::Rgba8888 => Rgba([bytes[0], bytes[1], bytes[2], bytes[3]]),
        PixelFormat::Rgb565 => {
            let packed = u16::from_le_bytes([bytes[0], bytes[1]]);
            let r5 = ((packed >> 11) & 0x1f) as u8;
            let g6 = ((packed >> 5) & 0x3f) as u8;
            let b5 = (packed & 0x1f) as u8;
            Rgba([
                (r5 << 3) | (r5 >> 2),
                (g6 << 2) | (g6 >> 4),
                (b5 << 3) | (b5 >> 2),
                255,
            ])
        }
    }
}
