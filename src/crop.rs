// Black-bar detection.
//
// Letterboxed content wastes the capture zone on dark borders. Each enabled
// edge is scanned inward while the row/column mean luma stays at or below
// the threshold. The result is a zero-copy crop region; a fully dark frame
// collapses to an empty region, which callers treat as "skip this frame".

use serde::{Deserialize, Serialize};

use crate::buffer::{CropRegion, PixelView};
use crate::color::rec601_luma;

/// Per-edge detection flags plus the darkness threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackBarOptions {
    pub top: bool,
    pub bottom: bool,
    pub left: bool,
    pub right: bool,
    /// Mean-luma ceiling for a row/column to count as part of a bar.
    pub threshold: u8,
}

impl Default for BlackBarOptions {
    fn default() -> Self {
        Self {
            top: false,
            bottom: false,
            left: false,
            right: false,
            threshold: 30,
        }
    }
}

impl BlackBarOptions {
    pub fn any_enabled(&self) -> bool {
        self.top || self.bottom || self.left || self.right
    }
}

/// Scan the enabled edges of `view` inward and return the surviving region.
///
/// Column scans run only over the rows that survived the vertical pass, so
/// a letterbox bar never hides a pillarbox bar behind it.
pub fn detect(view: &PixelView<'_>, options: &BlackBarOptions) -> CropRegion {
    if view.width() == 0 || view.height() == 0 {
        return CropRegion::full(view.width(), view.height());
    }

    let mut top = 0u32;
    let mut bottom = view.height();
    let mut left = 0u32;
    let mut right = view.width();
    let threshold = options.threshold as u32;

    if options.top {
        while top < bottom && row_mean_luma(view, top) <= threshold {
            top += 1;
        }
    }
    if options.bottom {
        while bottom > top && row_mean_luma(view, bottom - 1) <= threshold {
            bottom -= 1;
        }
    }
    if top == bottom {
        return CropRegion {
            x: 0,
            y: top,
            width: 0,
            height: 0,
        };
    }
    if options.left {
        while left < right && column_mean_luma(view, left, top, bottom) <= threshold {
            left += 1;
        }
    }
    if options.right {
        while right > left && column_mean_luma(view, right - 1, top, bottom) <= threshold {
            right -= 1;
        }
    }

    CropRegion {
        x: left,
        y: top,
        width: right - left,
        height: bottom - top,
    }
}

fn row_mean_luma(view: &PixelView<'_>, y: u32) -> u32 {
    let mut sum = 0u64;
    for px in view.row(y).chunks_exact(4) {
        sum += rec601_luma(px[2], px[1], px[0]) as u64;
    }
    (sum / view.width() as u64) as u32
}

fn column_mean_luma(view: &PixelView<'_>, x: u32, top: u32, bottom: u32) -> u32 {
    let mut sum = 0u64;
    for y in top..bottom {
        let [b, g, r, _] = view.pixel(x, y);
        sum += rec601_luma(r, g, b) as u64;
    }
    (sum / (bottom - top) as u64) as u32
}
