// Temporal smoothing.
//
// Scene cuts and noisy captures make LEDs flicker. An exponential moving
// average over successive frames damps that: each output byte is a blend of
// the current frame and the previous output, weighted by a factor derived
// from the user-facing smoothing level.

use crate::buffer::{PixelBuffer, PixelView};

/// Map a smoothing level (0..=10) to an EMA blend factor.
///
/// Level 0 disables smoothing (factor 1.0). Higher levels weigh history
/// more; the curve is quadratic so mid levels stay responsive. The factor
/// is floored at 0.01 so the output always tracks the input eventually.
pub fn smoothing_factor(level: u32) -> f64 {
    if level == 0 {
        return 1.0;
    }
    let level = level.min(10);
    let factor = ((10 - level) as f64 / 10.0).powi(2);
    factor.max(0.01)
}

/// EMA state across frames. Holds the previous output between ticks.
#[derive(Debug, Default)]
pub struct TemporalSmoother {
    state: Option<PixelBuffer>,
}

impl TemporalSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blend `current` into the running average and return the result.
    ///
    /// A factor at or above 1.0, a first frame, or a dimension change all
    /// reset the state to a plain copy of `current`.
    pub fn smooth(&mut self, current: &PixelView<'_>, factor: f64) -> &PixelBuffer {
        let state = self.state.get_or_insert_with(|| PixelBuffer::new(0, 0));
        if factor >= 1.0 || state.width() != current.width() || state.height() != current.height()
        {
            state.copy_from(current);
            return state;
        }

        let f = factor as f32;
        for y in 0..current.height() {
            let prev = state.row_mut(y);
            let cur = current.row(y);
            for (p, c) in prev.iter_mut().zip(cur) {
                *p = (*c as f32 * f + *p as f32 * (1.0 - f) + 0.5) as u8;
            }
        }
        state
    }

    /// The last smoothed frame, if any.
    pub fn current(&self) -> Option<PixelView<'_>> {
        self.state.as_ref().map(PixelBuffer::as_view)
    }

    pub fn reset(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, value: u8) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height);
        buf.bytes_mut().fill(value);
        buf
    }

    #[test]
    fn factor_curve_matches_levels() {
        assert_eq!(smoothing_factor(0), 1.0);
        assert!((smoothing_factor(1) - 0.81).abs() < 1e-9);
        assert!((smoothing_factor(6) - 0.16).abs() < 1e-9);
        assert_eq!(smoothing_factor(10), 0.01);
        assert_eq!(smoothing_factor(99), 0.01, "levels past 10 saturate");
    }

    #[test]
    fn first_frame_is_copied_verbatim() {
        let frame = solid(3, 3, 170);
        let mut smoother = TemporalSmoother::new();
        let out = smoother.smooth(&frame.as_view(), 0.16);
        assert_eq!(out.bytes(), frame.bytes());
    }

    #[test]
    fn factor_one_replaces_history() {
        let mut smoother = TemporalSmoother::new();
        smoother.smooth(&solid(2, 2, 0).as_view(), 1.0);
        let next = solid(2, 2, 255);
        let out = smoother.smooth(&next.as_view(), 1.0);
        assert_eq!(out.bytes(), next.bytes());
    }

    #[test]
    fn steady_input_converges() {
        let target = solid(2, 2, 200);
        let mut smoother = TemporalSmoother::new();
        smoother.smooth(&solid(2, 2, 0).as_view(), 1.0);

        for _ in 0..10 {
            smoother.smooth(&target.as_view(), 0.5);
        }
        let out = smoother
            .current()
            .expect("smoother should hold state after smoothing");
        assert_eq!(out.pixel(0, 0), [200, 200, 200, 200]);

        // Shallower factors settle within one step of the target.
        smoother.reset();
        smoother.smooth(&solid(2, 2, 0).as_view(), 1.0);
        for _ in 0..30 {
            smoother.smooth(&target.as_view(), 0.25);
        }
        let settled = smoother
            .current()
            .expect("smoother should hold state after smoothing");
        let value = settled.pixel(0, 0)[0] as i32;
        assert!((value - 200).abs() <= 1, "settled at {value}");
    }

    #[test]
    fn blend_weighs_current_against_history() {
        let mut smoother = TemporalSmoother::new();
        smoother.smooth(&solid(1, 1, 100).as_view(), 1.0);
        let out = smoother.smooth(&solid(1, 1, 200).as_view(), 0.25);
        // 200 * 0.25 + 100 * 0.75 + 0.5 rounds to 125.
        assert_eq!(out.bytes(), &[125, 125, 125, 125]);
    }

    #[test]
    fn dimension_change_resets_state() {
        let mut smoother = TemporalSmoother::new();
        smoother.smooth(&solid(4, 4, 10).as_view(), 0.16);
        let resized = solid(2, 2, 250);
        let out = smoother.smooth(&resized.as_view(), 0.16);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.bytes(), resized.bytes());
    }

    #[test]
    fn padded_input_rows_blend_by_visible_bytes() {
        let width = 2u32;
        let height = 2u32;
        let stride = 12usize;
        let mut data = vec![0xEE; stride * height as usize];
        for y in 0..height as usize {
            for x in 0..width as usize * 4 {
                data[y * stride + x] = 40;
            }
        }
        let padded = PixelView::new(&data, width, height, stride)
            .expect("padded view should validate");

        let mut smoother = TemporalSmoother::new();
        smoother.smooth(&solid(2, 2, 0).as_view(), 1.0);
        let out = smoother.smooth(&padded, 0.5);
        for y in 0..height {
            assert_eq!(out.row(y), &[20, 20, 20, 20, 20, 20, 20, 20][..]);
        }
    }
}
