// Stride-aware BGRA8 pixel containers.
//
// Capture backends hand out rows padded to a driver-chosen stride, so every
// vertical traversal in this crate goes through `stride`, never `width * 4`.
// PixelBuffer owns its bytes; PixelView borrows a window into someone else's
// (typically the backend's locked zone buffer) without copying.

use std::path::Path;

use anyhow::{bail, Result};
use image::{ExtendedColorType, ImageFormat};

/// Bytes per BGRA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Logical sub-rectangle of a frame, in pixels.
///
/// Produced by black-bar detection and applied to views without copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRegion {
    /// Region covering an entire frame.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// True when the region has no area. Degenerate regions mean the frame
    /// should be skipped, not processed.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the region covers the whole `width` x `height` frame.
    pub fn is_full(&self, width: u32, height: u32) -> bool {
        self.x == 0 && self.y == 0 && self.width == width && self.height == height
    }
}

/// Owned BGRA8 frame buffer.
///
/// Invariant: `data.len() >= height * stride` and `stride >= width * 4`.
/// Rows may carry padding past `width * 4`; its contents are unspecified.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zeroed, tightly packed buffer (`stride == width * 4`).
    pub fn new(width: u32, height: u32) -> Self {
        let stride = width as usize * BYTES_PER_PIXEL;
        Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        }
    }

    /// Take ownership of existing bytes, validating the stride invariant.
    pub fn from_vec(data: Vec<u8>, width: u32, height: u32, stride: usize) -> Result<Self> {
        if stride < width as usize * BYTES_PER_PIXEL {
            bail!(
                "stride {} too small for width {} ({} bytes per row required)",
                stride,
                width,
                width as usize * BYTES_PER_PIXEL
            );
        }
        if data.len() < stride * height as usize {
            bail!(
                "buffer of {} bytes too small for {}x{} at stride {}",
                data.len(),
                width,
                height,
                stride
            );
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Total bytes covered by the frame, including row padding.
    pub fn byte_len(&self) -> usize {
        self.stride * self.height as usize
    }

    /// Visible bytes of row `y` (padding excluded).
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// Raw bytes including padding. Length is `byte_len()` or more.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reuse the allocation for new dimensions, growing only when needed.
    /// Contents afterwards are unspecified.
    pub fn reset(&mut self, width: u32, height: u32, stride: usize) {
        debug_assert!(stride >= width as usize * BYTES_PER_PIXEL);
        let needed = stride * height as usize;
        if self.data.len() < needed {
            self.data.resize(needed, 0);
        }
        self.width = width;
        self.height = height;
        self.stride = stride;
    }

    /// Copy every visible row from `src`, preserving `src`'s stride layout.
    pub fn copy_from(&mut self, src: &PixelView<'_>) {
        self.reset(src.width(), src.height(), src.stride());
        for y in 0..src.height() {
            self.row_mut(y).copy_from_slice(src.row(y));
        }
    }

    pub fn as_view(&self) -> PixelView<'_> {
        PixelView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.stride,
        }
    }
}

/// Borrowed BGRA8 frame window.
///
/// The slice may be a backend's zone buffer; the view is only valid while
/// that buffer stays locked. No bytes are copied when narrowing.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> PixelView<'a> {
    /// Wrap raw bytes, validating the stride invariant. The final row only
    /// needs its visible `width * 4` bytes present, not full padding.
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: usize) -> Result<Self> {
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            bail!("stride {} too small for width {}", stride, width);
        }
        let needed = if height == 0 {
            0
        } else {
            (height as usize - 1) * stride + row_bytes
        };
        if data.len() < needed {
            bail!(
                "buffer of {} bytes too small for {}x{} at stride {}",
                data.len(),
                width,
                height,
                stride
            );
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Visible bytes of row `y` (padding excluded).
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// BGRA bytes of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let off = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]
    }

    /// Narrow to `region` without copying. The result shares this view's
    /// stride, so row walking stays correct.
    pub fn region(&self, region: CropRegion) -> Result<PixelView<'a>> {
        if region.x + region.width > self.width || region.y + region.height > self.height {
            bail!(
                "region {}x{}+{}+{} outside {}x{} frame",
                region.width,
                region.height,
                region.x,
                region.y,
                self.width,
                self.height
            );
        }
        let offset = region.y as usize * self.stride + region.x as usize * BYTES_PER_PIXEL;
        PixelView::new(&self.data[offset..], region.width, region.height, self.stride)
    }

    /// Copy visible rows into a tightly packed vec (padding stripped).
    pub fn to_packed(&self) -> Vec<u8> {
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(row_bytes * self.height as usize);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    /// Save the frame to a file for inspection.
    ///
    /// Format is determined by file extension: `.png`, `.bmp` and `.tiff`
    /// are lossless, `.jpg`/`.jpeg` is lossy.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        save_bgra8(path.as_ref(), self)
    }
}

/// Bytes per RGBA16F pixel.
pub const BYTES_PER_HDR_PIXEL: usize = 8;

/// Borrowed linear RGBA16F frame window, as delivered by the alternate
/// higher-privilege capture path. Channel order is R,G,B,A as half floats.
#[derive(Debug, Clone, Copy)]
pub struct HdrPixelView<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> HdrPixelView<'a> {
    pub fn new(data: &'a [u8], width: u32, height: u32, stride: usize) -> Result<Self> {
        let row_bytes = width as usize * BYTES_PER_HDR_PIXEL;
        if stride < row_bytes {
            bail!("stride {} too small for width {}", stride, width);
        }
        let needed = if height == 0 {
            0
        } else {
            (height as usize - 1) * stride + row_bytes
        };
        if data.len() < needed {
            bail!(
                "buffer of {} bytes too small for {}x{} half-float frame at stride {}",
                data.len(),
                width,
                height,
                stride
            );
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Visible bytes of row `y` (padding excluded).
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * BYTES_PER_HDR_PIXEL]
    }
}

/// Save a BGRA8 view through the `image` crate, picking the format from
/// the file extension. Debug aid for inspecting intermediate frames.
fn save_bgra8(path: &Path, view: &PixelView<'_>) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let format = match ext.as_str() {
        "png" => ImageFormat::Png,
        "bmp" => ImageFormat::Bmp,
        "jpg" | "jpeg" => ImageFormat::Jpeg,
        "tiff" | "tif" => ImageFormat::Tiff,
        _ => bail!("save: unsupported extension '.{ext}'"),
    };

    // Swizzle to RGBA, dropping row padding along the way.
    let mut rgba = view.to_packed();
    for pixel in rgba.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }

    if format == ImageFormat::Jpeg {
        // JPEG has no alpha channel.
        let rgb: Vec<u8> = rgba
            .chunks_exact(4)
            .flat_map(|px| &px[..3])
            .copied()
            .collect();
        image::save_buffer_with_format(
            path,
            &rgb,
            view.width(),
            view.height(),
            ExtendedColorType::Rgb8,
            format,
        )?;
    } else {
        image::save_buffer_with_format(
            path,
            &rgba,
            view.width(),
            view.height(),
            ExtendedColorType::Rgba8,
            format,
        )?;
    }
    Ok(())
}
