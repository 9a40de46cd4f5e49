// Capture settings.
//
// The external property layer persists these as plain data: serde fills
// missing fields from the original defaults, and `normalized()` clamps every
// range at the point of use so a hand-edited profile can never push the
// engine out of range.

use serde::{Deserialize, Serialize};

use crate::color::{ColorParams, ToneCurve};
use crate::crop::BlackBarOptions;

/// Which display to capture and which part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSource {
    /// Stored display name; falls back to the first display when absent
    /// or no longer present.
    pub display_name: Option<String>,
    pub vendor_id: Option<u32>,
    pub device_id: Option<u32>,
    /// Capture the whole display, ignoring the region fields.
    pub full_screen: bool,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Default for CaptureSource {
    fn default() -> Self {
        Self {
            display_name: None,
            vendor_id: None,
            device_id: None,
            full_screen: true,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    }
}

/// Dynamic-range compensation settings for HDR displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HdrSettings {
    pub enabled: bool,
    /// Solve exposure from the frame histogram; `exposure` then acts as a
    /// bias on the solved value.
    pub auto_exposure: bool,
    pub exposure: i32,
    pub black_point: u8,
    pub white_point: u8,
    pub saturation: i32,
}

impl Default for HdrSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            auto_exposure: true,
            exposure: 110,
            black_point: 0,
            white_point: 255,
            saturation: 110,
        }
    }
}

/// The full capture/processing configuration surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub source: CaptureSource,
    /// Halving steps applied by the backend; 6 gives roughly 30x17 zones
    /// out of 1080p.
    pub downscale_level: u32,
    pub black_bars: BlackBarOptions,

    pub brightness: i32,
    pub contrast: i32,
    pub exposure: i32,
    pub saturation: i32,
    pub auto_exposure: bool,

    pub smoothing_level: u32,
    /// Frames to reuse the previous output before processing a new one;
    /// 0 processes every frame.
    pub frame_skip: u32,

    pub hdr: HdrSettings,
    pub target_fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            source: CaptureSource::default(),
            downscale_level: 6,
            black_bars: BlackBarOptions::default(),
            brightness: 0,
            contrast: 100,
            exposure: 100,
            saturation: 100,
            auto_exposure: false,
            smoothing_level: 6,
            frame_skip: 0,
            hdr: HdrSettings::default(),
            target_fps: 60,
        }
    }
}

impl CaptureSettings {
    /// A copy with every value clamped to its supported range.
    pub fn normalized(&self) -> Self {
        let mut settings = self.clone();
        settings.brightness = settings.brightness.clamp(-100, 100);
        settings.contrast = settings.contrast.clamp(50, 200);
        settings.exposure = settings.exposure.clamp(25, 400);
        settings.saturation = settings.saturation.clamp(0, 200);
        settings.smoothing_level = settings.smoothing_level.min(10);
        settings.hdr.exposure = settings.hdr.exposure.clamp(1, 400);
        settings.hdr.saturation = settings.hdr.saturation.clamp(0, 400);
        settings.target_fps = settings.target_fps.clamp(20, 60);
        settings
    }

    /// The color pass this configuration asks for, `None` when every stage
    /// is neutral and the pass can be skipped.
    pub fn color_params(&self) -> Option<ColorParams> {
        let settings = self.normalized();
        if settings.hdr.enabled {
            let tone = ToneCurve::new(
                settings.hdr.exposure,
                settings.hdr.black_point,
                settings.hdr.white_point,
            );
            return Some(ColorParams::compensation(
                tone,
                settings.hdr.saturation,
                settings.hdr.auto_exposure,
            ));
        }

        let grades = settings.brightness != 0
            || settings.contrast != 100
            || settings.exposure != 100
            || settings.saturation != 100
            || settings.auto_exposure;
        if grades {
            return Some(ColorParams::grading(
                settings.brightness,
                settings.contrast,
                settings.exposure,
                settings.saturation,
                settings.auto_exposure,
            ));
        }
        None
    }
}
