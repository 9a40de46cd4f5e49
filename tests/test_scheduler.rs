// Integration test: capture loop lifecycle through the service

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use ambicapture::buffer::PixelView;
use ambicapture::capture::{
    AdapterInfo, CaptureBackend, CaptureError, CaptureResult, CaptureService, DisplayCapture,
    DisplayInfo, SchedulerState, ZoneHandle, ZoneRequest, ZoneUpdate,
};

struct CountingBackend {
    captures: Arc<AtomicU32>,
    last_update: Arc<Mutex<Option<ZoneUpdate>>>,
}

impl CaptureBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn adapters(&self) -> CaptureResult<Vec<AdapterInfo>> {
        Ok(vec![AdapterInfo {
            index: 0,
            name: "Fake GPU".into(),
            vendor_id: 0x1002,
            device_id: 0x73bf,
        }])
    }

    fn displays(&self, _adapter: &AdapterInfo) -> CaptureResult<Vec<DisplayInfo>> {
        Ok(vec![DisplayInfo {
            name: "DP-1".into(),
            width: 8,
            height: 8,
            vendor_id: 0x1002,
            device_id: 0x73bf,
        }])
    }

    fn open(&self, _display: &DisplayInfo) -> CaptureResult<Box<dyn DisplayCapture>> {
        Ok(Box::new(CountingCapture {
            captures: Arc::clone(&self.captures),
            last_update: Arc::clone(&self.last_update),
            frame: vec![128; 2 * 2 * 4],
            zones: HashSet::new(),
            next_id: 1,
        }))
    }
}

struct CountingCapture {
    captures: Arc<AtomicU32>,
    last_update: Arc<Mutex<Option<ZoneUpdate>>>,
    frame: Vec<u8>,
    zones: HashSet<u64>,
    next_id: u64,
}

impl DisplayCapture for CountingCapture {
    fn register_zone(&mut self, _request: ZoneRequest) -> CaptureResult<Option<ZoneHandle>> {
        let handle = ZoneHandle::new(self.next_id);
        self.next_id += 1;
        self.zones.insert(handle.id());
        Ok(Some(handle))
    }

    fn unregister_zone(&mut self, handle: ZoneHandle) -> bool {
        self.zones.remove(&handle.id())
    }

    fn update_zone(&mut self, handle: ZoneHandle, update: ZoneUpdate) -> CaptureResult<()> {
        if !self.zones.contains(&handle.id()) {
            return Err(CaptureError::UnknownZone);
        }
        *self.last_update.lock().unwrap() = Some(update);
        Ok(())
    }

    fn capture_frame(&mut self) -> CaptureResult<()> {
        self.captures.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn with_zone_frame(
        &mut self,
        handle: ZoneHandle,
        consumer: &mut dyn FnMut(PixelView<'_>),
    ) -> CaptureResult<()> {
        if !self.zones.contains(&handle.id()) {
            return Err(CaptureError::UnknownZone);
        }
        let view = PixelView::new(&self.frame, 2, 2, 8)
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        consumer(view);
        Ok(())
    }
}

struct Fixture {
    service: CaptureService,
    captures: Arc<AtomicU32>,
    last_update: Arc<Mutex<Option<ZoneUpdate>>>,
}

fn fixture() -> Fixture {
    let captures = Arc::new(AtomicU32::new(0));
    let last_update = Arc::new(Mutex::new(None));
    let service = CaptureService::new(Box::new(CountingBackend {
        captures: Arc::clone(&captures),
        last_update: Arc::clone(&last_update),
    }));
    Fixture {
        service,
        captures,
        last_update,
    }
}

fn request() -> ZoneRequest {
    ZoneRequest {
        x: 0,
        y: 0,
        width: 4,
        height: 4,
        downscale_level: 0,
    }
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    done()
}

#[test]
fn loop_runs_only_while_zones_are_registered() {
    let fx = fixture();
    let display = fx.service.displays().unwrap().remove(0);
    let scheduler = fx.service.scheduler_for(&display).unwrap();
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    let handle = scheduler
        .register_zone(request())
        .unwrap()
        .expect("backend grants a handle");
    assert_eq!(scheduler.state(), SchedulerState::Running);

    let captures = Arc::clone(&fx.captures);
    assert!(
        wait_until(Duration::from_secs(2), || captures
            .load(Ordering::Relaxed)
            > 0),
        "loop never captured"
    );

    assert!(scheduler.unregister_zone(handle).unwrap());
    assert_eq!(scheduler.state(), SchedulerState::Idle);

    // Unregistering joined the thread, so the count must not move anymore.
    let settled = fx.captures.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(fx.captures.load(Ordering::Relaxed), settled);
}

#[test]
fn subscribers_see_loop_iterations() {
    let fx = fixture();
    let display = fx.service.displays().unwrap().remove(0);
    let scheduler = fx.service.scheduler_for(&display).unwrap();

    let rx = scheduler.subscribe(32);
    let handle = scheduler
        .register_zone(request())
        .unwrap()
        .expect("backend grants a handle");

    let first = rx
        .recv_timeout(Duration::from_secs(2))
        .expect("an update from the running loop");
    assert!(first.success);
    assert!(first.at.elapsed() < Duration::from_secs(2));

    assert!(scheduler.unregister_zone(handle).unwrap());
}

#[test]
fn zone_updates_reach_the_backend() {
    let fx = fixture();
    let display = fx.service.displays().unwrap().remove(0);
    let scheduler = fx.service.scheduler_for(&display).unwrap();

    let handle = scheduler
        .register_zone(request())
        .unwrap()
        .expect("backend grants a handle");

    let update = ZoneUpdate {
        width: Some(2),
        height: Some(2),
        ..Default::default()
    };
    scheduler.update_zone(handle, update).unwrap();

    let seen = fx.last_update.lock().unwrap().expect("backend saw the update");
    assert_eq!(seen.width, Some(2));
    assert_eq!(seen.height, Some(2));
    assert_eq!(seen.x, None);

    assert!(scheduler.unregister_zone(handle).unwrap());
}

#[test]
fn fps_estimate_appears_after_the_first_window() {
    let fx = fixture();
    let display = fx.service.displays().unwrap().remove(0);
    let scheduler = fx.service.scheduler_for(&display).unwrap();
    assert_eq!(scheduler.current_fps(), 0.0);

    let handle = scheduler
        .register_zone(request())
        .unwrap()
        .expect("backend grants a handle");

    // The estimate refreshes every half second of loop time.
    let sched = Arc::clone(&scheduler);
    assert!(
        wait_until(Duration::from_secs(3), move || sched.current_fps() > 0.0),
        "no FPS estimate published"
    );

    assert!(scheduler.unregister_zone(handle).unwrap());
}

#[test]
fn service_reset_builds_a_fresh_session() {
    let fx = fixture();
    let display = fx.service.displays().unwrap().remove(0);

    let first = fx.service.scheduler_for(&display).unwrap();
    let again = fx.service.scheduler_for(&display).unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    fx.service.reset();
    let fresh = fx.service.scheduler_for(&display).unwrap();
    assert!(!Arc::ptr_eq(&first, &fresh));
}
