// Backend selection policy.
//
// Capture availability depends on the session: X11-style capture does not
// work under Wayland, and any backend can fail to initialize. Selection
// never fails; when a real backend cannot be built the no-op backend takes
// its place and the pipeline runs with capture disabled.

use std::env;

use tracing::{info, warn};

use super::backend::CaptureBackend;
use super::noop::NoopBackend;

/// Whether the current session runs under Wayland.
pub fn is_wayland_session() -> bool {
    wayland_from_env(
        env::var("XDG_SESSION_TYPE").ok().as_deref(),
        env::var("WAYLAND_DISPLAY").ok().as_deref(),
    )
}

fn wayland_from_env(session_type: Option<&str>, wayland_display: Option<&str>) -> bool {
    session_type.is_some_and(|v| v.eq_ignore_ascii_case("wayland"))
        || wayland_display.is_some_and(|v| !v.is_empty())
}

/// Build a capture backend, substituting the no-op backend when the session
/// cannot support one or `factory` fails.
pub fn backend_or_noop<F>(factory: F) -> Box<dyn CaptureBackend>
where
    F: FnOnce() -> anyhow::Result<Box<dyn CaptureBackend>>,
{
    select_backend(is_wayland_session(), factory)
}

fn select_backend<F>(wayland: bool, factory: F) -> Box<dyn CaptureBackend>
where
    F: FnOnce() -> anyhow::Result<Box<dyn CaptureBackend>>,
{
    if wayland {
        info!("Wayland session detected; capture runs with the no-op backend");
        return Box::new(NoopBackend::new());
    }
    match factory() {
        Ok(backend) => {
            info!("capture backend ready: {}", backend.name());
            backend
        }
        Err(err) => {
            warn!("capture backend initialization failed: {err:#}; using no-op fallback");
            Box::new(NoopBackend::new())
        }
    }
}
