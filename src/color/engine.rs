// LUT-based color grading over BGRA8 frames.
//
// Every tonal stage (brightness offset, contrast scale around the midpoint,
// exposure + filmic with level clamps) collapses into one 256-entry LUT
// applied per channel. Saturation runs after the LUT, blending each channel
// toward the luma of the already-adjusted pixel. The LUT is memoized on its
// parameter tuple; the output buffer is reused across frames.

use crate::buffer::{PixelBuffer, PixelView};

use super::auto_exposure;
use super::filmic::ToneCurve;
use super::histogram::{rec601_luma, LumaHistogram};

/// How the effective exposure is chosen when a tone curve is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoExposureMode {
    #[default]
    Off,
    /// Fixed 0.96 target with neutral levels; the configured exposure is
    /// ignored while active.
    Plain,
    /// Target derived from the white point; the configured exposure biases
    /// the solved result.
    Biased,
}

/// Parameter set for one grading pass. Stages at their neutral values are
/// no-ops; `tone: None` disables the filmic stage entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorParams {
    /// Offset stage, -100..=100. 0 disables.
    pub brightness: i32,
    /// Scale around the midpoint, 50..=200 percent. 100 disables.
    pub contrast: i32,
    /// Exposure + filmic + level clamp stage.
    pub tone: Option<ToneCurve>,
    /// Post-LUT saturation percent. 100 disables, 0 is grayscale.
    pub saturation: i32,
    pub auto_exposure: AutoExposureMode,
}

impl ColorParams {
    pub fn neutral() -> Self {
        Self {
            brightness: 0,
            contrast: 100,
            tone: None,
            saturation: 100,
            auto_exposure: AutoExposureMode::Off,
        }
    }

    /// Levels-only dynamic-range compensation: filmic with black/white
    /// clamps plus saturation, no brightness/contrast stages.
    pub fn compensation(tone: ToneCurve, saturation: i32, auto: bool) -> Self {
        Self {
            brightness: 0,
            contrast: 100,
            tone: Some(tone),
            saturation,
            auto_exposure: if auto {
                AutoExposureMode::Biased
            } else {
                AutoExposureMode::Off
            },
        }
    }

    /// Full grading: brightness offset, contrast scale, exposure + filmic
    /// with neutral levels, saturation.
    pub fn grading(brightness: i32, contrast: i32, exposure: i32, saturation: i32, auto: bool) -> Self {
        Self {
            brightness,
            contrast,
            tone: Some(ToneCurve::new(exposure, 0, 255)),
            saturation,
            auto_exposure: if auto {
                AutoExposureMode::Plain
            } else {
                AutoExposureMode::Off
            },
        }
    }

    /// True when every stage sits at its neutral value and the pass would
    /// reproduce the input.
    pub fn is_neutral(&self) -> bool {
        self.brightness == 0 && self.contrast == 100 && self.tone.is_none() && self.saturation == 100
    }
}

/// Memoization key: the parameters the LUT content actually depends on.
/// Saturation is applied outside the LUT and deliberately excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LutKey {
    brightness: i32,
    contrast: i32,
    tone: Option<ToneCurve>,
}

/// Grading pass with cached LUT and output buffer.
pub struct ColorAdjustmentEngine {
    lut: [u8; 256],
    lut_key: Option<LutKey>,
    lut_rebuilds: u64,
    output: Option<PixelBuffer>,
}

impl Default for ColorAdjustmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorAdjustmentEngine {
    pub fn new() -> Self {
        Self {
            lut: [0; 256],
            lut_key: None,
            lut_rebuilds: 0,
            output: None,
        }
    }

    /// Grade `src` into the cached output buffer and return a view of it.
    ///
    /// When an auto-exposure mode is active the effective exposure is solved
    /// from the frame's own histogram before the LUT check, so content
    /// changes rebuild the LUT while static scenes reuse it.
    pub fn apply(&mut self, src: &PixelView<'_>, params: &ColorParams) -> PixelView<'_> {
        let mut effective = *params;
        if let Some(tone) = effective.tone.as_mut() {
            match effective.auto_exposure {
                AutoExposureMode::Off => {}
                AutoExposureMode::Plain => {
                    let hist = LumaHistogram::sample(src);
                    tone.exposure = auto_exposure::solve_plain(&hist);
                }
                AutoExposureMode::Biased => {
                    let hist = LumaHistogram::sample(src);
                    tone.exposure = auto_exposure::solve_biased(&hist, *tone, tone.exposure);
                }
            }
        }
        self.ensure_lut(&effective);

        let output = self.output.get_or_insert_with(|| PixelBuffer::new(0, 0));
        output.reset(src.width(), src.height(), src.stride());

        let lut = &self.lut;
        let sat = effective.saturation.clamp(0, 400);
        for y in 0..src.height() {
            let src_row = src.row(y);
            let dst_row = output.row_mut(y);
            let pairs = src_row.chunks_exact(4).zip(dst_row.chunks_exact_mut(4));
            if sat == 100 {
                for (s, d) in pairs {
                    d[0] = lut[s[0] as usize];
                    d[1] = lut[s[1] as usize];
                    d[2] = lut[s[2] as usize];
                    d[3] = s[3];
                }
            } else {
                for (s, d) in pairs {
                    let b = lut[s[0] as usize];
                    let g = lut[s[1] as usize];
                    let r = lut[s[2] as usize];
                    // Luma of the adjusted pixel, not the source pixel.
                    let l = rec601_luma(r, g, b) as i32;
                    d[0] = (l + ((b as i32 - l) * sat) / 100).clamp(0, 255) as u8;
                    d[1] = (l + ((g as i32 - l) * sat) / 100).clamp(0, 255) as u8;
                    d[2] = (l + ((r as i32 - l) * sat) / 100).clamp(0, 255) as u8;
                    d[3] = s[3];
                }
            }
        }
        output.as_view()
    }

    /// View of the last graded frame, if any.
    pub fn output(&self) -> Option<PixelView<'_>> {
        self.output.as_ref().map(|b| b.as_view())
    }

    /// Number of LUT rebuilds since construction. Static parameters keep
    /// this flat across frames.
    pub fn lut_rebuilds(&self) -> u64 {
        self.lut_rebuilds
    }

    /// Drop cached state so a later re-enable starts fresh.
    pub fn clear(&mut self) {
        self.lut_key = None;
        self.output = None;
    }

    fn ensure_lut(&mut self, params: &ColorParams) {
        let key = LutKey {
            brightness: params.brightness.clamp(-100, 100),
            contrast: params.contrast.clamp(50, 200),
            tone: params.tone.map(ToneCurve::sanitized),
        };
        if self.lut_key == Some(key) {
            return;
        }
        self.lut = build_lut(&key);
        self.lut_key = Some(key);
        self.lut_rebuilds += 1;
    }
}

/// Compose all tonal stages into a single byte mapping.
fn build_lut(key: &LutKey) -> [u8; 256] {
    let offset = key.brightness as f64 / 100.0;
    let scale = key.contrast as f64 / 100.0;

    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        let mut v = i as f64 / 255.0;
        v += offset;
        v = (v - 0.5) * scale + 0.5;
        v = v.clamp(0.0, 1.0);
        let y = match &key.tone {
            Some(curve) => curve.evaluate(v),
            None => v,
        };
        *entry = (y * 255.0 + 0.5).min(255.0) as u8;
    }
    lut
}
