// Capture scheduling.
//
// One loop thread per display session, running only while zones are
// registered: the first registration spawns it, the last unregistration
// stops and joins it. On success the loop sleeps the remainder of the target
// frame time; on failure it backs off a fixed 16 ms and retries. Every
// iteration publishes a CaptureUpdate to subscribers.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use crate::buffer::PixelView;

use super::backend::{
    CaptureError, CaptureResult, DisplayCapture, ZoneHandle, ZoneRequest, ZoneUpdate,
};

const MIN_TARGET_FPS: u32 = 20;
const MAX_TARGET_FPS: u32 = 60;
const DEFAULT_TARGET_FPS: u32 = 60;

const FAILURE_BACKOFF: Duration = Duration::from_millis(16);
const MIN_SLEEP: Duration = Duration::from_millis(1);
const FPS_WINDOW: Duration = Duration::from_millis(500);
const FPS_DISPLAY_CAP: f64 = 999.9;

/// Whether the loop thread is currently alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// One loop iteration's outcome, published to subscribers.
#[derive(Debug, Clone, Copy)]
pub struct CaptureUpdate {
    pub success: bool,
    pub at: Instant,
}

struct Session {
    capture: Box<dyn DisplayCapture>,
    zone_count: u32,
    worker: Option<Worker>,
}

/// Loop thread plus its stop flag; both are fresh per spawn.
struct Worker {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

struct Shared {
    session: Mutex<Session>,
    running: AtomicBool,
    fps_bits: AtomicU64,
    target_fps: AtomicU32,
    subscribers: Mutex<Vec<SyncSender<CaptureUpdate>>>,
}

impl Shared {
    fn new(capture: Box<dyn DisplayCapture>) -> Self {
        Self {
            session: Mutex::new(Session {
                capture,
                zone_count: 0,
                worker: None,
            }),
            running: AtomicBool::new(false),
            fps_bits: AtomicU64::new(0f64.to_bits()),
            target_fps: AtomicU32::new(DEFAULT_TARGET_FPS),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    fn notify(&self, update: CaptureUpdate) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|tx| match tx.try_send(update) {
                Ok(()) => true,
                // A full buffer means a slow but live consumer.
                Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
        }
    }
}

/// Drives one `DisplayCapture` from a dedicated thread.
///
/// All methods take `&self`; the session mutex serializes zone bookkeeping
/// and loop captures against each other. Teardown joins the thread without
/// holding that mutex, so a capture in flight can finish.
pub struct CaptureScheduler {
    shared: Arc<Shared>,
}

impl CaptureScheduler {
    pub fn new(capture: Box<dyn DisplayCapture>) -> Self {
        Self {
            shared: Arc::new(Shared::new(capture)),
        }
    }

    /// Register a zone, starting the loop thread on the first live handle.
    ///
    /// A backend may accept the request without granting a handle (the no-op
    /// backend always does); that leaves the scheduler idle.
    pub fn register_zone(&self, request: ZoneRequest) -> Result<Option<ZoneHandle>> {
        let mut session = self.lock_session()?;
        let handle = session
            .capture
            .register_zone(request)
            .context("failed to register capture zone")?;

        if let Some(granted) = handle {
            session.zone_count += 1;
            if session.zone_count == 1 {
                if let Err(err) = self.start_worker(&mut session) {
                    session.capture.unregister_zone(granted);
                    session.zone_count -= 1;
                    return Err(err);
                }
            }
            debug!("capture zone {} registered", granted.id());
        }
        Ok(handle)
    }

    /// Unregister a zone, stopping the loop thread when none remain.
    pub fn unregister_zone(&self, handle: ZoneHandle) -> Result<bool> {
        let mut session = self.lock_session()?;
        let removed = session.capture.unregister_zone(handle);
        if removed && session.zone_count > 0 {
            session.zone_count -= 1;
            debug!("capture zone {} unregistered", handle.id());
            if session.zone_count == 0 {
                let worker = session.worker.take();
                // Join without the session lock so the loop can finish its
                // current capture.
                drop(session);
                if let Some(worker) = worker {
                    worker.stop.store(true, Ordering::Release);
                    let _ = worker.handle.join();
                }
                self.shared.running.store(false, Ordering::Release);
                self.shared
                    .fps_bits
                    .store(0f64.to_bits(), Ordering::Relaxed);
            }
        }
        Ok(removed)
    }

    pub fn update_zone(&self, handle: ZoneHandle, update: ZoneUpdate) -> Result<()> {
        let mut session = self.lock_session()?;
        session
            .capture
            .update_zone(handle, update)
            .context("failed to update capture zone")
    }

    /// Run `consumer` against the zone's current frame under the session
    /// lock. Consumers should copy out and return quickly.
    pub fn with_zone_frame<F>(&self, handle: ZoneHandle, mut consumer: F) -> CaptureResult<()>
    where
        F: FnMut(PixelView<'_>),
    {
        let mut session = self
            .shared
            .session
            .lock()
            .map_err(|_| CaptureError::Other("capture session lock poisoned".into()))?;
        session.capture.with_zone_frame(handle, &mut consumer)
    }

    /// Ask the backend for a fresh frame soon. Best effort.
    pub fn request_update(&self) {
        if let Ok(mut session) = self.shared.session.lock() {
            session.capture.request_update();
        }
    }

    /// Receive one `CaptureUpdate` per loop iteration over a bounded
    /// channel. The loop never blocks on a slow subscriber; a disconnected
    /// one is pruned.
    pub fn subscribe(&self, capacity: usize) -> Receiver<CaptureUpdate> {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        if let Ok(mut subscribers) = self.shared.subscribers.lock() {
            subscribers.push(tx);
        }
        rx
    }

    pub fn state(&self) -> SchedulerState {
        if self.shared.running.load(Ordering::Acquire) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn zone_count(&self) -> u32 {
        self.lock_session().map(|s| s.zone_count).unwrap_or(0)
    }

    /// Rolling FPS estimate from the loop thread, 0.0 while idle.
    pub fn current_fps(&self) -> f64 {
        f64::from_bits(self.shared.fps_bits.load(Ordering::Relaxed))
    }

    pub fn target_fps(&self) -> u32 {
        self.shared.target_fps.load(Ordering::Relaxed)
    }

    pub fn set_target_fps(&self, fps: u32) {
        let clamped = fps.clamp(MIN_TARGET_FPS, MAX_TARGET_FPS);
        self.shared.target_fps.store(clamped, Ordering::Relaxed);
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, Session>> {
        self.shared
            .session
            .lock()
            .map_err(|_| anyhow!("capture session lock poisoned"))
    }

    fn start_worker(&self, session: &mut Session) -> Result<()> {
        let stop = Arc::new(AtomicBool::new(false));
        let shared = Arc::clone(&self.shared);
        let loop_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("ambicapture-capture".to_string())
            .spawn(move || capture_loop(shared, loop_stop))
            .context("failed to spawn capture thread")?;
        session.worker = Some(Worker { stop, handle });
        self.shared.running.store(true, Ordering::Release);
        Ok(())
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        let worker = self
            .shared
            .session
            .lock()
            .ok()
            .and_then(|mut session| session.worker.take());
        if let Some(worker) = worker {
            worker.stop.store(true, Ordering::Release);
            let _ = worker.handle.join();
        }
        self.shared.running.store(false, Ordering::Release);
    }
}

fn capture_loop(shared: Arc<Shared>, stop: Arc<AtomicBool>) {
    info!("capture loop started");
    let mut window_start = Instant::now();
    let mut successes: u32 = 0;

    loop {
        if stop.load(Ordering::Acquire) {
            break;
        }

        let iteration_start = Instant::now();
        let result = match shared.session.lock() {
            Ok(mut session) => session.capture.capture_frame(),
            Err(_) => {
                warn!("capture session lock poisoned; capture loop exiting");
                break;
            }
        };
        let capture_time = iteration_start.elapsed();

        let success = result.is_ok();
        shared.notify(CaptureUpdate {
            success,
            at: Instant::now(),
        });

        match result {
            Ok(()) => {
                successes += 1;
                let elapsed = window_start.elapsed();
                if elapsed >= FPS_WINDOW {
                    let fps = fps_estimate(successes, elapsed);
                    shared.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
                    window_start = Instant::now();
                    successes = 0;
                }

                let target = shared.target_fps.load(Ordering::Relaxed);
                thread::sleep(success_sleep(target_frame_time(target), capture_time));
            }
            Err(err) => {
                if err.is_transient() {
                    debug!("capture failed, retrying: {err}");
                } else {
                    warn!("capture failed: {err}");
                }
                thread::sleep(FAILURE_BACKOFF);
            }
        }
    }
    info!("capture loop stopped");
}

fn target_frame_time(target_fps: u32) -> Duration {
    let fps = target_fps.clamp(MIN_TARGET_FPS, MAX_TARGET_FPS);
    Duration::from_secs_f64(1.0 / fps as f64)
}

fn success_sleep(frame_time: Duration, capture_time: Duration) -> Duration {
    frame_time.saturating_sub(capture_time).max(MIN_SLEEP)
}

fn fps_estimate(successes: u32, elapsed: Duration) -> f64 {
    if elapsed.is_zero() {
        return 0.0;
    }
    (successes as f64 / elapsed.as_secs_f64()).min(FPS_DISPLAY_CAP)
}
