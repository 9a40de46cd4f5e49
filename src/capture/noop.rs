// No-op capture backend.
//
// Stands in when no real backend is available (unsupported session type or
// failed initialization). Enumerations are empty, zone registration is
// accepted but yields no handle, and capture always reports failure, so
// consumers keep their last output and ticks degrade to skips instead of
// errors.

use crate::buffer::PixelView;

use super::backend::{
    AdapterInfo, CaptureBackend, CaptureError, CaptureResult, DisplayCapture, DisplayInfo,
    ZoneHandle, ZoneRequest, ZoneUpdate,
};

#[derive(Debug, Default)]
pub struct NoopBackend;

impl NoopBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for NoopBackend {
    fn name(&self) -> &str {
        "noop"
    }

    fn adapters(&self) -> CaptureResult<Vec<AdapterInfo>> {
        Ok(Vec::new())
    }

    fn displays(&self, _adapter: &AdapterInfo) -> CaptureResult<Vec<DisplayInfo>> {
        Ok(Vec::new())
    }

    fn open(&self, _display: &DisplayInfo) -> CaptureResult<Box<dyn DisplayCapture>> {
        Ok(Box::new(NoopCapture))
    }
}

#[derive(Debug, Default)]
pub struct NoopCapture;

impl DisplayCapture for NoopCapture {
    fn register_zone(&mut self, _request: ZoneRequest) -> CaptureResult<Option<ZoneHandle>> {
        Ok(None)
    }

    fn unregister_zone(&mut self, _handle: ZoneHandle) -> bool {
        false
    }

    fn update_zone(&mut self, _handle: ZoneHandle, _update: ZoneUpdate) -> CaptureResult<()> {
        Ok(())
    }

    fn capture_frame(&mut self) -> CaptureResult<()> {
        Err(CaptureError::Unavailable("no capture backend".into()))
    }

    fn with_zone_frame(
        &mut self,
        _handle: ZoneHandle,
        _consumer: &mut dyn FnMut(PixelView<'_>),
    ) -> CaptureResult<()> {
        Err(CaptureError::UnknownZone)
    }
}
