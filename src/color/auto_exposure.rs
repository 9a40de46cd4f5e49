// Auto-exposure solver.
//
// Picks the exposure percent that lands a bright-but-not-clipped highlight
// percentile just under the output ceiling, so highlights roll off through
// the filmic shoulder instead of clipping. Binary search over the exposure
// multiplier; the curve is monotonic in exposure for a fixed input, so
// bisection converges.

use super::filmic::{filmic_response, ToneCurve};
use super::histogram::LumaHistogram;

/// Exposure multiplier search range, matching the 1..=400 percent clamp.
const MULTIPLIER_LO: f64 = 0.25;
const MULTIPLIER_HI: f64 = 4.0;
const BISECT_ITERATIONS: u32 = 10;

/// Highlight reference percentile.
const HIGHLIGHT_PERCENTILE: f64 = 0.995;
/// Fallback when the highlight percentile is saturated (a fully clipped
/// highlight region gives a useless reference).
const CLIPPED_FALLBACK_PERCENTILE: f64 = 0.95;

/// Solve the exposure percent for `curve`'s output levels.
///
/// Returns a value in 1..=400, or 100 (neutral) for an empty histogram.
pub fn solve(histogram: &LumaHistogram, curve: ToneCurve) -> i32 {
    if histogram.total_samples() == 0 {
        return 100;
    }
    let reference = reference_luma(histogram);
    // Aim just below the ceiling so highlights roll off rather than clip.
    let desired = (curve.white_point as f64 / 255.0 - 0.01).clamp(0.10, 0.96);
    let multiplier = bisect(reference, desired, curve);
    ((multiplier * 100.0).round() as i32).clamp(1, 400)
}

/// Solve, then scale by the user's exposure percent and re-clamp. Lets a
/// configured exposure act as a bias on top of the automatic result.
pub fn solve_biased(histogram: &LumaHistogram, curve: ToneCurve, bias_percent: i32) -> i32 {
    let solved = solve(histogram, curve);
    let biased = (solved as f64 * bias_percent as f64 / 100.0).round() as i32;
    biased.clamp(1, 400)
}

/// Variant for plain grading without level adjustment: fixed 0.96 target,
/// neutral levels, result clamped to 25..=400.
pub fn solve_plain(histogram: &LumaHistogram) -> i32 {
    if histogram.total_samples() == 0 {
        return 100;
    }
    let reference = reference_luma(histogram);
    let multiplier = bisect(reference, 0.96, ToneCurve::NEUTRAL);
    ((multiplier * 100.0).round() as i32).clamp(25, 400)
}

fn reference_luma(histogram: &LumaHistogram) -> u8 {
    let p995 = histogram.percentile(HIGHLIGHT_PERCENTILE);
    let reference = if p995 >= 254 {
        histogram.percentile(CLIPPED_FALLBACK_PERCENTILE)
    } else {
        p995
    };
    reference.max(1)
}

fn bisect(reference: u8, desired: f64, curve: ToneCurve) -> f64 {
    let curve = curve.sanitized();
    let min_out = curve.black_point as f64 / 255.0;
    let max_out = curve.white_point as f64 / 255.0;
    let x = reference as f64 / 255.0;

    let mut lo = MULTIPLIER_LO;
    let mut hi = MULTIPLIER_HI;
    for _ in 0..BISECT_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        let y = filmic_response(x, mid).clamp(min_out, max_out);
        if y < desired {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) * 0.5
}
