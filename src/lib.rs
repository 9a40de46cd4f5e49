//! # ambicapture
//!
//! Screen capture pipeline and pixel engine for ambient LED lighting.
//!
//! Captures a display region at a paced frame rate, strips letterbox bars,
//! runs filmic tone mapping and color grading through a cached LUT, and
//! smooths the result over time so LED output does not flicker. Capture
//! backends plug in behind traits; the built-in no-op backend keeps every
//! stage runnable on headless or Wayland systems.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ambicapture::capture::{backend_or_noop, CaptureService};
//! use ambicapture::config::CaptureSettings;
//! use ambicapture::pipeline::AmbientPipeline;
//!
//! let backend = backend_or_noop(|| anyhow::bail!("no platform backend built in"));
//! let service = Arc::new(CaptureService::new(backend));
//! let mut pipeline = AmbientPipeline::new(service);
//!
//! let settings = CaptureSettings::default();
//! pipeline.attach(&settings).unwrap();
//! loop {
//!     pipeline.tick(&settings);
//!     if let Some(frame) = pipeline.current_frame() {
//!         // feed the rows to the LED sink
//!         for y in 0..frame.height() {
//!             let _rgb_source = frame.row(y);
//!         }
//!     }
//! }
//! ```

pub mod buffer;
pub mod capture;
pub mod color;
pub mod config;
pub mod crop;
pub mod pipeline;
pub mod smooth;
