// Frame orchestration: zone capture → black-bar crop → color grading →
// temporal smoothing → output buffer.
//
// One tick per render frame. The zone lock is held only while the raw frame
// is copied into the pipeline's staging buffer; every processing stage runs
// on the copy. Frame skipping gates the color and smoothing stages, not the
// raw copy, and a settings or dimension change forces processing so stale
// caches are never shown. When an HDR frame source is attached it replaces
// the zone path entirely and feeds tone-mapped BGRA8 into the same chain.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::buffer::{CropRegion, PixelBuffer, PixelView};
use crate::capture::backend::{DisplayInfo, HdrFrameSource, ZoneHandle, ZoneRequest};
use crate::capture::scheduler::CaptureScheduler;
use crate::capture::CaptureService;
use crate::color::hdr::tone_map_into;
use crate::color::{ColorAdjustmentEngine, ColorParams};
use crate::config::{CaptureSettings, CaptureSource};
use crate::crop;
use crate::smooth::{smoothing_factor, TemporalSmoother};

/// Builds the optional HDR source for a display; `Err` falls back to the
/// zone path.
pub type HdrProbe = Box<dyn Fn(&DisplayInfo) -> Result<Box<dyn HdrFrameSource>> + Send>;

/// What a tick did with the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    /// The output was recomputed from this tick's capture.
    Processed,
    /// The previous output stands, e.g. a skipped frame or a failed capture.
    Reused,
    /// Nothing to show yet.
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputStage {
    Raw(CropRegion),
    Color,
    Smoothed,
}

struct ZoneState {
    scheduler: Arc<CaptureScheduler>,
    handle: ZoneHandle,
}

/// Capture-to-LED pipeline for one configured source.
///
/// # Examples
/// ```no_run
/// # use std::sync::Arc;
/// # use ambicapture::capture::{backend_or_noop, CaptureService};
/// # use ambicapture::config::CaptureSettings;
/// # use ambicapture::pipeline::AmbientPipeline;
/// let backend = backend_or_noop(|| anyhow::bail!("no platform backend built in"));
/// let service = Arc::new(CaptureService::new(backend));
/// let mut pipeline = AmbientPipeline::new(service);
/// let settings = CaptureSettings::default();
/// pipeline.attach(&settings).unwrap();
/// pipeline.tick(&settings);
/// if let Some(frame) = pipeline.current_frame() {
///     println!("{}x{}", frame.width(), frame.height());
/// }
/// ```
pub struct AmbientPipeline {
    service: Arc<CaptureService>,
    hdr_probe: Option<HdrProbe>,

    zone: Option<ZoneState>,
    hdr: Option<Box<dyn HdrFrameSource>>,
    display: Option<DisplayInfo>,

    engine: ColorAdjustmentEngine,
    smoother: TemporalSmoother,
    /// Raw frame copy, written under the zone lock and read afterwards.
    staging: PixelBuffer,
    have_frame: bool,

    frame_counter: u32,
    last_color_params: Option<Option<ColorParams>>,
    last_dims: Option<(u32, u32)>,
    last_output: Option<OutputStage>,
}

impl AmbientPipeline {
    pub fn new(service: Arc<CaptureService>) -> Self {
        Self {
            service,
            hdr_probe: None,
            zone: None,
            hdr: None,
            display: None,
            engine: ColorAdjustmentEngine::new(),
            smoother: TemporalSmoother::new(),
            staging: PixelBuffer::new(0, 0),
            have_frame: false,
            frame_counter: 0,
            last_color_params: None,
            last_dims: None,
            last_output: None,
        }
    }

    /// Install the probe that builds an HDR source per display. When the
    /// probe succeeds during `attach`, the HDR source replaces the zone.
    pub fn set_hdr_probe(&mut self, probe: HdrProbe) {
        self.hdr_probe = Some(probe);
    }

    /// Select the configured display, register the capture zone, and probe
    /// for HDR capture.
    ///
    /// A source that names a display which is not present leaves the
    /// pipeline detached; that is not an error, ticks just report `Skipped`.
    pub fn attach(&mut self, settings: &CaptureSettings) -> Result<()> {
        self.detach();
        let settings = settings.normalized();

        let displays = self.service.displays()?;
        let Some(display_info) = select_display(&displays, &settings.source) else {
            debug!("no display matches the configured source; staying detached");
            return Ok(());
        };
        let display_info = display_info.clone();

        let request = zone_request(&display_info, &settings.source, settings.downscale_level);
        let scheduler = self.service.scheduler_for(&display_info)?;
        scheduler.set_target_fps(settings.target_fps);
        if let Some(handle) = scheduler.register_zone(request)? {
            self.zone = Some(ZoneState { scheduler, handle });
        }

        if let Some(probe) = &self.hdr_probe {
            match probe(&display_info) {
                Ok(source) => {
                    info!("HDR capture active on {}", display_info.name);
                    // The HDR source replaces the zone path.
                    self.drop_zone();
                    self.hdr = Some(source);
                }
                Err(err) => {
                    debug!("HDR capture unavailable on {}: {err:#}", display_info.name);
                }
            }
        }

        self.display = Some(display_info);
        Ok(())
    }

    /// Release the zone and HDR source and clear every cache, so a
    /// re-attach never serves stale data.
    pub fn detach(&mut self) {
        self.drop_zone();
        self.hdr = None;
        self.display = None;
        self.engine.clear();
        self.smoother.reset();
        self.staging = PixelBuffer::new(0, 0);
        self.have_frame = false;
        self.frame_counter = 0;
        self.last_color_params = None;
        self.last_dims = None;
        self.last_output = None;
    }

    /// Detach and attach again, e.g. after a display topology change.
    /// Failure leaves the pipeline detached and is logged, not propagated.
    pub fn restart(&mut self, settings: &CaptureSettings) {
        info!("restarting capture pipeline");
        self.detach();
        if let Err(err) = self.attach(settings) {
            warn!("pipeline restart failed, capture stays detached: {err:#}");
        }
    }

    /// Run one render tick: copy the newest frame and update the output
    /// through crop, color, and smoothing as the settings ask.
    pub fn tick(&mut self, settings: &CaptureSettings) -> TickStatus {
        let settings = settings.normalized();

        self.frame_counter += 1;
        let mut should_process = self.frame_counter > settings.frame_skip;
        if should_process {
            self.frame_counter = 0;
        }

        // A settings change mid-skip must not keep showing stale output.
        let params = settings.color_params();
        if self.last_color_params != Some(params) {
            should_process = true;
        }
        self.last_color_params = Some(params);

        if let Some(zone) = &self.zone {
            if zone.scheduler.target_fps() != settings.target_fps {
                zone.scheduler.set_target_fps(settings.target_fps);
            }
        }

        if !self.capture_staging() {
            return self.reuse_or_skip();
        }

        // The HDR source delivers the full frame; bars only exist on the
        // zone path.
        let region = if self.hdr.is_none() && settings.black_bars.any_enabled() {
            crop::detect(&self.staging.as_view(), &settings.black_bars)
        } else {
            CropRegion::full(self.staging.width(), self.staging.height())
        };
        if region.is_empty() {
            return self.reuse_or_skip();
        }

        if self.last_dims != Some((region.width, region.height)) {
            should_process = true;
        }
        self.last_dims = Some((region.width, region.height));

        let factor = smoothing_factor(settings.smoothing_level);
        let uses_smoothing = factor < 1.0;

        if should_process {
            let view = match self.staging.as_view().region(region) {
                Ok(view) => view,
                Err(err) => {
                    warn!("crop region out of bounds: {err:#}");
                    return self.reuse_or_skip();
                }
            };
            let stage = match &params {
                Some(params) => self.engine.apply(&view, params),
                None => view,
            };
            if uses_smoothing {
                self.smoother.smooth(&stage, factor);
                self.last_output = Some(OutputStage::Smoothed);
            } else if params.is_some() {
                self.last_output = Some(OutputStage::Color);
            } else {
                self.last_output = Some(OutputStage::Raw(region));
            }
            return TickStatus::Processed;
        }

        // Skipped frame: stages keep their caches, but a raw-only chain
        // still shows the fresh copy.
        if uses_smoothing && self.smoother.current().is_some() {
            self.last_output = Some(OutputStage::Smoothed);
            TickStatus::Reused
        } else if params.is_some() && self.engine.output().is_some() {
            self.last_output = Some(OutputStage::Color);
            TickStatus::Reused
        } else {
            self.last_output = Some(OutputStage::Raw(region));
            TickStatus::Processed
        }
    }

    /// The buffer a render sink should draw, at its true stride.
    pub fn current_frame(&self) -> Option<PixelView<'_>> {
        match self.last_output? {
            OutputStage::Smoothed => self.smoother.current(),
            OutputStage::Color => self.engine.output(),
            OutputStage::Raw(region) => {
                if !self.have_frame {
                    return None;
                }
                self.staging.as_view().region(region).ok()
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.zone.is_some() || self.hdr.is_some()
    }

    /// Whether the HDR source replaced the zone path.
    pub fn is_using_hdr(&self) -> bool {
        self.hdr.is_some()
    }

    pub fn display(&self) -> Option<&DisplayInfo> {
        self.display.as_ref()
    }

    /// Times the color LUT was rebuilt, for cache diagnostics.
    pub fn lut_rebuilds(&self) -> u64 {
        self.engine.lut_rebuilds()
    }

    fn reuse_or_skip(&self) -> TickStatus {
        if self.last_output.is_some() {
            TickStatus::Reused
        } else {
            TickStatus::Skipped
        }
    }

    /// Copy the newest frame into `staging`. Returns false when no frame is
    /// available this tick.
    fn capture_staging(&mut self) -> bool {
        if let Some(hdr) = self.hdr.as_mut() {
            if let Err(err) = hdr.capture_frame() {
                debug!("HDR capture failed: {err}");
                return false;
            }
            let staging = &mut self.staging;
            let result = hdr.with_frame(&mut |frame| {
                // Exposure is applied later by the color pass.
                tone_map_into(&frame, 100, staging);
            });
            return match result {
                Ok(()) => {
                    self.have_frame = true;
                    true
                }
                Err(err) => {
                    debug!("HDR frame read failed: {err}");
                    false
                }
            };
        }

        let Some(zone) = &self.zone else {
            return false;
        };
        let staging = &mut self.staging;
        let result = zone.scheduler.with_zone_frame(zone.handle, |frame| {
            staging.copy_from(&frame);
        });
        match result {
            Ok(()) => {
                // Ask for the next frame while this one is processed.
                zone.scheduler.request_update();
                self.have_frame = true;
                true
            }
            Err(err) => {
                debug!("zone frame read failed: {err}");
                false
            }
        }
    }

    fn drop_zone(&mut self) {
        if let Some(zone) = self.zone.take() {
            if let Err(err) = zone.scheduler.unregister_zone(zone.handle) {
                warn!("failed to unregister capture zone: {err:#}");
            }
        }
    }
}

impl Drop for AmbientPipeline {
    fn drop(&mut self) {
        self.drop_zone();
    }
}

/// Pick the display the source names, or the first one while the source is
/// still unset. A named display that is absent yields `None`.
fn select_display<'a>(displays: &'a [DisplayInfo], source: &CaptureSource) -> Option<&'a DisplayInfo> {
    let defaulting = source.display_name.is_none()
        || source.vendor_id.is_none()
        || source.device_id.is_none();
    if defaulting {
        return displays.first();
    }
    displays.iter().find(|display| {
        source.vendor_id == Some(display.vendor_id)
            && source.device_id == Some(display.device_id)
            && source
                .display_name
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(&display.name))
    })
}

/// Clamp the configured region into the display and build the registration
/// request. Full-screen or degenerate regions cover the whole display.
fn zone_request(display: &DisplayInfo, source: &CaptureSource, downscale_level: u32) -> ZoneRequest {
    if source.full_screen || source.width == 0 || source.height == 0 {
        return ZoneRequest {
            x: 0,
            y: 0,
            width: display.width,
            height: display.height,
            downscale_level,
        };
    }

    let width = source.width.min(display.width);
    let height = source.height.min(display.height);
    let x = source.x.clamp(0, (display.width - width) as i32);
    let y = source.y.clamp(0, (display.height - height) as i32);
    ZoneRequest {
        x,
        y,
        width,
        height,
        downscale_level,
    }
}
