// Scheduler pacing: watch the capture loop hold a target frame rate
//
// Registers one zone on a synthetic backend, subscribes to loop updates,
// and steps the target rate down while printing how many iterations the
// loop actually ran per second. The estimate column is the loop's own
// figure, refreshed from a half-second window.
//
// Usage: cargo run --example scheduler_fps

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use ambicapture::buffer::PixelView;
use ambicapture::capture::{
    AdapterInfo, CaptureBackend, CaptureError, CaptureResult, CaptureService, DisplayCapture,
    DisplayInfo, ZoneHandle, ZoneRequest, ZoneUpdate,
};

struct SyntheticBackend;

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn adapters(&self) -> CaptureResult<Vec<AdapterInfo>> {
        Ok(vec![AdapterInfo {
            index: 0,
            name: "Synthetic GPU".into(),
            vendor_id: 0x10de,
            device_id: 0x2204,
        }])
    }

    fn displays(&self, _adapter: &AdapterInfo) -> CaptureResult<Vec<DisplayInfo>> {
        Ok(vec![DisplayInfo {
            name: "SYN-1".into(),
            width: 1920,
            height: 1080,
            vendor_id: 0x10de,
            device_id: 0x2204,
        }])
    }

    fn open(&self, _display: &DisplayInfo) -> CaptureResult<Box<dyn DisplayCapture>> {
        Ok(Box::new(SyntheticCapture {
            frame: vec![128; 2 * 2 * 4],
            zones: HashSet::new(),
            next_id: 1,
        }))
    }
}

struct SyntheticCapture {
    frame: Vec<u8>,
    zones: HashSet<u64>,
    next_id: u64,
}

impl DisplayCapture for SyntheticCapture {
    fn register_zone(&mut self, _request: ZoneRequest) -> CaptureResult<Option<ZoneHandle>> {
        let handle = ZoneHandle::new(self.next_id);
        self.next_id += 1;
        self.zones.insert(handle.id());
        Ok(Some(handle))
    }

    fn unregister_zone(&mut self, handle: ZoneHandle) -> bool {
        self.zones.remove(&handle.id())
    }

    fn update_zone(&mut self, _handle: ZoneHandle, _update: ZoneUpdate) -> CaptureResult<()> {
        Ok(())
    }

    fn capture_frame(&mut self) -> CaptureResult<()> {
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

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let service = Arc::new(CaptureService::new(Box::new(SyntheticBackend)));
    let display = service.displays().expect("enumerate displays").remove(0);
    let scheduler = service.scheduler_for(&display).expect("open session");

    let updates = scheduler.subscribe(256);
    let handle = scheduler
        .register_zone(ZoneRequest {
            x: 0,
            y: 0,
            width: display.width,
            height: display.height,
            downscale_level: 6,
        })
        .expect("register zone")
        .expect("backend grants a handle");

    println!("target | iterations/s | loop estimate");
    for target in [60u32, 30, 20] {
        scheduler.set_target_fps(target);
        // Two samples per target so the second shows the settled rate.
        for _ in 0..2 {
            thread::sleep(Duration::from_secs(1));
            let mut iterations = 0;
            while updates.try_recv().is_ok() {
                iterations += 1;
            }
            println!(
                "{:>6} | {:>12} | {:>13.1}",
                target,
                iterations,
                scheduler.current_fps()
            );
        }
    }

    scheduler
        .unregister_zone(handle)
        .expect("unregister zone");
    println!("loop stopped, state: {:?}", scheduler.state());
}
