// Pixel-processing stages: histogram statistics, filmic tone curve,
// auto exposure, LUT grading, and HDR tone mapping.

pub mod auto_exposure;
pub mod engine;
pub mod filmic;
pub mod hdr;
pub mod histogram;

pub use engine::{AutoExposureMode, ColorAdjustmentEngine, ColorParams};
pub use filmic::{filmic_response, ToneCurve};
pub use histogram::{rec601_luma, LumaHistogram};
