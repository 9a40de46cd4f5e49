// Capture backend abstraction.
//
// A backend enumerates graphics adapters and their displays and opens one
// capture session per display. Zone registration, frame capture, and locked
// frame access go through `DisplayCapture`; the alternate higher-privilege
// HDR path delivers linear RGBA16F frames through `HdrFrameSource`. The
// scheduler and pipeline only ever see these traits, never a concrete
// implementation.

use thiserror::Error;

use crate::buffer::{HdrPixelView, PixelView};

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Why a capture operation failed.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture backend unavailable: {0}")]
    Unavailable(String),

    #[error("no new frame ready")]
    FrameNotReady,

    #[error("failed to acquire frame within timeout")]
    Timeout,

    #[error("capture access lost: {0}")]
    AccessLost(String),

    #[error("capture zone is not registered")]
    UnknownZone,

    #[error("invalid capture request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(String),
}

impl CaptureError {
    /// Whether the capture loop should back off and retry instead of
    /// treating the session as broken.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::FrameNotReady | Self::Timeout | Self::AccessLost(_)
        )
    }
}

/// Opaque identifier for a registered capture zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZoneHandle(u64);

impl ZoneHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Screen-space rectangle plus downscale level for a zone registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRequest {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Halving steps applied by the backend; 0 keeps native resolution.
    pub downscale_level: u32,
}

/// Partial update to an existing zone. `None` fields keep their value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneUpdate {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub downscale_level: Option<u32>,
}

/// Graphics adapter as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub index: usize,
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
}

/// Display attached to an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayInfo {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub vendor_id: u32,
    pub device_id: u32,
}

/// Entry point implemented once per capture technology.
pub trait CaptureBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn adapters(&self) -> CaptureResult<Vec<AdapterInfo>>;

    fn displays(&self, adapter: &AdapterInfo) -> CaptureResult<Vec<DisplayInfo>>;

    fn open(&self, display: &DisplayInfo) -> CaptureResult<Box<dyn DisplayCapture>>;
}

/// One capture session on one display.
///
/// A `register_zone` returning `Ok(None)` means the backend accepted the
/// request but cannot serve it (the no-op fallback does this); callers must
/// treat that as "no zone" rather than an error.
pub trait DisplayCapture: Send {
    fn register_zone(&mut self, request: ZoneRequest) -> CaptureResult<Option<ZoneHandle>>;

    /// Returns true when the handle was registered.
    fn unregister_zone(&mut self, handle: ZoneHandle) -> bool;

    fn update_zone(&mut self, handle: ZoneHandle, update: ZoneUpdate) -> CaptureResult<()>;

    /// Acquire the next frame into the backend's zone buffers.
    fn capture_frame(&mut self) -> CaptureResult<()>;

    /// Hint that a consumer wants a fresh frame soon.
    fn request_update(&mut self) {}

    /// Run `consumer` against the zone's current frame.
    ///
    /// The view is only valid inside the call; the backend may hold an
    /// internal lock for its duration, so consumers should copy out and
    /// return quickly.
    fn with_zone_frame(
        &mut self,
        handle: ZoneHandle,
        consumer: &mut dyn FnMut(PixelView<'_>),
    ) -> CaptureResult<()>;
}

/// Alternate capture path delivering linear scRGB RGBA16F frames.
pub trait HdrFrameSource: Send {
    fn capture_frame(&mut self) -> CaptureResult<()>;

    /// Run `consumer` against the current FP16 frame. Same validity rules
    /// as `DisplayCapture::with_zone_frame`.
    fn with_frame(&mut self, consumer: &mut dyn FnMut(HdrPixelView<'_>)) -> CaptureResult<()>;

    fn dimensions(&self) -> (u32, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        assert!(CaptureError::FrameNotReady.is_transient());
        assert!(CaptureError::Timeout.is_transient());
        assert!(CaptureError::AccessLost("device reset".into()).is_transient());

        assert!(!CaptureError::Unavailable("no backend".into()).is_transient());
        assert!(!CaptureError::UnknownZone.is_transient());
        assert!(!CaptureError::InvalidRequest("zero area".into()).is_transient());
        assert!(!CaptureError::Other("poisoned lock".into()).is_transient());
    }

    #[test]
    fn error_messages_name_the_failure() {
        let err = CaptureError::Unavailable("wayland session".into());
        assert_eq!(
            err.to_string(),
            "capture backend unavailable: wayland session"
        );
        assert_eq!(
            CaptureError::Timeout.to_string(),
            "failed to acquire frame within timeout"
        );
    }

    #[test]
    fn zone_update_defaults_change_nothing() {
        let update = ZoneUpdate::default();
        assert!(update.x.is_none());
        assert!(update.y.is_none());
        assert!(update.width.is_none());
        assert!(update.height.is_none());
        assert!(update.downscale_level.is_none());
    }
}
