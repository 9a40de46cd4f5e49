// Capture engine module.
//
// The backend traits isolate platform capture technology; the scheduler
// drives one capture loop per display session; the policy layer picks a
// backend (or the no-op fallback) at startup. CaptureService at the root
// hands out shared schedulers so several consumers on the same display
// reuse one session and one loop thread.

pub mod backend;
pub mod noop;
pub mod policy;
pub mod scheduler;

pub use backend::{
    AdapterInfo, CaptureBackend, CaptureError, CaptureResult, DisplayCapture, DisplayInfo,
    HdrFrameSource, ZoneHandle, ZoneRequest, ZoneUpdate,
};
pub use noop::NoopBackend;
pub use policy::{backend_or_noop, is_wayland_session};
pub use scheduler::{CaptureScheduler, CaptureUpdate, SchedulerState};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};

/// Shared registry of capture sessions, one per display.
pub struct CaptureService {
    backend: Box<dyn CaptureBackend>,
    sessions: Mutex<HashMap<String, Arc<CaptureScheduler>>>,
}

impl CaptureService {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// All displays across all adapters, in enumeration order.
    pub fn displays(&self) -> Result<Vec<DisplayInfo>> {
        let mut displays = Vec::new();
        let adapters = self
            .backend
            .adapters()
            .context("failed to enumerate graphics adapters")?;
        for adapter in adapters {
            let mut found = self
                .backend
                .displays(&adapter)
                .with_context(|| format!("failed to enumerate displays on {}", adapter.name))?;
            displays.append(&mut found);
        }
        Ok(displays)
    }

    /// The scheduler for `display`, opening a new session on first use.
    pub fn scheduler_for(&self, display: &DisplayInfo) -> Result<Arc<CaptureScheduler>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow!("capture session registry poisoned"))?;
        if let Some(existing) = sessions.get(&display.name) {
            return Ok(Arc::clone(existing));
        }

        let capture = self
            .backend
            .open(display)
            .with_context(|| format!("failed to open capture session on {}", display.name))?;
        let scheduler = Arc::new(CaptureScheduler::new(capture));
        sessions.insert(display.name.clone(), Arc::clone(&scheduler));
        Ok(scheduler)
    }

    /// Forget all cached sessions, e.g. after a display topology change.
    ///
    /// Consumers holding a scheduler keep it alive until they detach; new
    /// lookups open fresh sessions.
    pub fn reset(&self) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelView;

    struct TwoDisplayBackend;

    fn display(name: &str) -> DisplayInfo {
        DisplayInfo {
            name: name.to_string(),
            width: 1920,
            height: 1080,
            vendor_id: 0x10de,
            device_id: 0x2204,
        }
    }

    impl CaptureBackend for TwoDisplayBackend {
        fn name(&self) -> &str {
            "two-display"
        }

        fn adapters(&self) -> CaptureResult<Vec<AdapterInfo>> {
            Ok(vec![AdapterInfo {
                index: 0,
                name: "adapter0".into(),
                vendor_id: 0x10de,
                device_id: 0x2204,
            }])
        }

        fn displays(&self, _adapter: &AdapterInfo) -> CaptureResult<Vec<DisplayInfo>> {
            Ok(vec![display("DP-1"), display("DP-2")])
        }

        fn open(&self, _display: &DisplayInfo) -> CaptureResult<Box<dyn DisplayCapture>> {
            Ok(Box::new(IdleCapture))
        }
    }

    struct IdleCapture;

    impl DisplayCapture for IdleCapture {
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
            Ok(())
        }

        fn with_zone_frame(
            &mut self,
            _handle: ZoneHandle,
            _consumer: &mut dyn FnMut(PixelView<'_>),
        ) -> CaptureResult<()> {
            Err(CaptureError::UnknownZone)
        }
    }

    #[test]
    fn displays_flatten_across_adapters() {
        let service = CaptureService::new(Box::new(TwoDisplayBackend));
        let displays = service.displays().expect("enumeration should succeed");
        assert_eq!(displays.len(), 2);
        assert_eq!(displays[0].name, "DP-1");
        assert_eq!(displays[1].name, "DP-2");
    }

    #[test]
    fn schedulers_are_shared_per_display() {
        let service = CaptureService::new(Box::new(TwoDisplayBackend));
        let first = service
            .scheduler_for(&display("DP-1"))
            .expect("open should succeed");
        let again = service
            .scheduler_for(&display("DP-1"))
            .expect("lookup should succeed");
        assert!(Arc::ptr_eq(&first, &again));

        let other = service
            .scheduler_for(&display("DP-2"))
            .expect("open should succeed");
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn reset_forgets_cached_sessions() {
        let service = CaptureService::new(Box::new(TwoDisplayBackend));
        let before = service
            .scheduler_for(&display("DP-1"))
            .expect("open should succeed");
        service.reset();
        let after = service
            .scheduler_for(&display("DP-1"))
            .expect("reopen should succeed");
        assert!(!Arc::ptr_eq(&before, &after));
    }
}
