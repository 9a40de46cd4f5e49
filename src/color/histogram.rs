// Sampled luma histogram over BGRA8 frames.
//
// Auto exposure only needs a coarse brightness distribution, so frames are
// sampled on a grid (~80x60 points) instead of per pixel. Luma uses the
// Rec.601 integer approximation shared with the saturation and crop passes.

use crate::buffer::PixelView;

/// Target number of sample columns for the default grid.
const SAMPLE_COLS: u32 = 80;
/// Target number of sample rows for the default grid.
const SAMPLE_ROWS: u32 = 60;

/// Rec.601 integer luma: `(R*77 + G*150 + B*29) >> 8`.
#[inline]
pub fn rec601_luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 77 + g as u32 * 150 + b as u32 * 29) >> 8) as u8
}

/// Luma distribution of a sampled frame region.
#[derive(Debug, Clone)]
pub struct LumaHistogram {
    bins: [u32; 256],
    total: u32,
}

impl Default for LumaHistogram {
    fn default() -> Self {
        Self {
            bins: [0; 256],
            total: 0,
        }
    }
}

impl LumaHistogram {
    /// Sample `view` on the default grid.
    pub fn sample(view: &PixelView<'_>) -> Self {
        let step_x = (view.width() / SAMPLE_COLS).max(1);
        let step_y = (view.height() / SAMPLE_ROWS).max(1);
        Self::sample_every(view, step_x, step_y)
    }

    /// Sample `view` at the given pixel steps. Steps below 1 are treated as 1.
    pub fn sample_every(view: &PixelView<'_>, step_x: u32, step_y: u32) -> Self {
        let step_x = step_x.max(1) as usize;
        let step_y = step_y.max(1);

        let mut hist = Self::default();
        let mut y = 0;
        while y < view.height() {
            let row = view.row(y);
            for px in row.chunks_exact(4).step_by(step_x) {
                hist.add(rec601_luma(px[2], px[1], px[0]));
            }
            y += step_y;
        }
        hist
    }

    /// Record one luma sample. Exposed so callers can build distributions
    /// from other sources.
    pub fn add(&mut self, luma: u8) {
        self.bins[luma as usize] += 1;
        self.total += 1;
    }

    pub fn total_samples(&self) -> u32 {
        self.total
    }

    pub fn count(&self, luma: u8) -> u32 {
        self.bins[luma as usize]
    }

    /// Smallest luma whose cumulative count reaches `ceil(total * p)`,
    /// or 255 when the target is never reached. `p` is in `[0, 1]`.
    pub fn percentile(&self, p: f64) -> u8 {
        let target = (self.total as f64 * p).ceil() as u32;
        let mut cumulative = 0u32;
        for (luma, &count) in self.bins.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                return luma as u8;
            }
        }
        255
    }
}
