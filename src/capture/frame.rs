//! Frame data structures for camera content

use std::time::Instant;

/// Pixel layout of a frame buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGBA, row-major
    #[default]
    Rgba8,
    /// 8-bit BGRA, row-major (common for platform camera APIs)
    Bgra8,
    /// Single-channel 8-bit luminance
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel for this layout
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A captured camera frame
#[derive(Debug, Clone)]
pub struct Frame {
    /// Ordinal index within the camera's stream
    pub index: u64,
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel layout of `data`
    pub format: PixelFormat,
    /// Timestamp when frame was captured
    pub timestamp: Instant,
}

impl Frame {
    /// Create a new frame
    pub fn new(index: u64, data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            index,
            data,
            width,
            height,
            format,
            timestamp: Instant::now(),
        }
    }

    /// An empty placeholder frame, used by sources that carry no pixels
    pub fn blank(index: u64) -> Self {
        Self::new(index, Vec::new(), 0, 0, PixelFormat::Gray8)
    }

    /// Get frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the buffer length matches the declared dimensions
    pub fn is_consistent(&self) -> bool {
        let expected = self.width as usize * self.height as usize * self.format.bytes_per_pixel();
        self.data.len() == expected
    }
}
