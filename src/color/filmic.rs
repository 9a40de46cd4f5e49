// Filmic tone curve and LUT construction.
//
// The curve is the single-expression ACES fit: a rational polynomial with a
// dark toe and a highlight shoulder. Output is clamped twice, first to the
// unit range and then to the configured black/white levels, so crushed
// shadows and clipped highlights land exactly on the configured floor and
// ceiling.

/// ACES-fit rational curve evaluated at `x * exposure`.
///
/// Input and output are normalized to `[0, 1]`. A zero denominator yields 0.
#[inline]
pub fn filmic_response(x: f64, exposure: f64) -> f64 {
    let v = x * exposure;
    let num = v * (2.51 * v + 0.03);
    let den = v * (2.43 * v + 0.59) + 0.14;
    if den == 0.0 {
        return 0.0;
    }
    (num / den).clamp(0.0, 1.0)
}

/// Filmic stage parameters: exposure in percent plus output levels.
///
/// `NEUTRAL` leaves levels untouched but still applies the curve's
/// toe/shoulder shaping; the curve is not an identity mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToneCurve {
    /// Exposure percent, valid range 1..=400.
    pub exposure: i32,
    /// Output floor, 0..=255.
    pub black_point: u8,
    /// Output ceiling, must stay above the black point.
    pub white_point: u8,
}

impl ToneCurve {
    pub const NEUTRAL: Self = Self {
        exposure: 100,
        black_point: 0,
        white_point: 255,
    };

    pub fn new(exposure: i32, black_point: u8, white_point: u8) -> Self {
        Self {
            exposure,
            black_point,
            white_point,
        }
    }

    /// Clamp parameters into their valid ranges. A white point at or below
    /// the black point is forced one step above it.
    pub fn sanitized(self) -> Self {
        let black_point = self.black_point;
        let white_point = if self.white_point <= black_point {
            black_point.saturating_add(1)
        } else {
            self.white_point
        };
        Self {
            exposure: self.exposure.clamp(1, 400),
            black_point,
            white_point,
        }
    }

    /// Evaluate the curve for one normalized input, levels applied.
    pub fn evaluate(&self, x: f64) -> f64 {
        let curve = self.sanitized();
        let y = filmic_response(x, curve.exposure as f64 / 100.0);
        y.clamp(
            curve.black_point as f64 / 255.0,
            curve.white_point as f64 / 255.0,
        )
    }

    /// Tabulate the curve for all 256 input bytes.
    pub fn build_lut(&self) -> [u8; 256] {
        let curve = self.sanitized();
        let mut lut = [0u8; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            let y = curve.evaluate(i as f64 / 255.0);
            *entry = (y * 255.0 + 0.5).min(255.0) as u8;
        }
        lut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_lut_is_deterministic() {
        let curve = ToneCurve::new(140, 20, 200);
        assert_eq!(curve.build_lut(), curve.build_lut());
    }

    #[test]
    fn neutral_curve_is_monotonic_with_anchored_ends() {
        let lut = ToneCurve::NEUTRAL.build_lut();

        assert_eq!(lut[0], 0);
        for i in 1..256 {
            assert!(
                lut[i] >= lut[i - 1],
                "lut must be non-decreasing at {}: {} < {}",
                i,
                lut[i],
                lut[i - 1]
            );
        }
        // The shoulder compresses highlights but full white stays near the
        // ceiling rather than collapsing.
        assert!(lut[255] > 200, "white input mapped to {}", lut[255]);
        // Not an identity: the toe lifts midtones.
        assert!((0..256).any(|i| lut[i] != i as u8));
    }

    #[test]
    fn levels_clamp_lut_output() {
        let lut = ToneCurve::new(100, 40, 180).build_lut();
        assert!(lut.iter().all(|&v| (40..=180).contains(&v)));
        assert_eq!(lut[0], 40);
    }

    #[test]
    fn sanitize_forces_white_above_black() {
        let curve = ToneCurve::new(5000, 120, 90).sanitized();
        assert_eq!(curve.exposure, 400);
        assert_eq!(curve.black_point, 120);
        assert_eq!(curve.white_point, 121);

        // Black point at the top saturates instead of wrapping.
        let pinned = ToneCurve::new(100, 255, 10).sanitized();
        assert_eq!(pinned.white_point, 255);
        let lut = pinned.build_lut();
        assert!(lut.iter().all(|&v| v == 255));
    }

    #[test]
    fn exposure_raises_output() {
        let dim = ToneCurve::new(50, 0, 255).build_lut();
        let bright = ToneCurve::new(200, 0, 255).build_lut();
        assert!(bright[128] > dim[128]);
    }
}
