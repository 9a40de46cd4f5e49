// Pipeline walkthrough: every processing stage over a synthetic source
//
// Scenarios:
// 1. Neutral settings: the frame passes through untouched
// 2. Letterboxed frame: black bars are cropped away
// 3. Saturation grading: the color pass runs through the cached LUT
// 4. Temporal smoothing: output converges toward a scene change
// 5. Frame skip: cached output is reused between processing ticks
//
// Usage: cargo run --example pipeline_walkthrough

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

use ambicapture::buffer::PixelView;
use ambicapture::capture::{
    AdapterInfo, CaptureBackend, CaptureError, CaptureResult, CaptureService, DisplayCapture,
    DisplayInfo, ZoneHandle, ZoneRequest, ZoneUpdate,
};
use ambicapture::config::CaptureSettings;
use ambicapture::pipeline::{AmbientPipeline, TickStatus};

// ---------------------------------------------------------------------------
// Synthetic capture backend
// ---------------------------------------------------------------------------

/// Frame the backend serves, swappable between ticks.
#[derive(Clone)]
struct Script(Arc<Mutex<(u32, u32, Vec<u8>)>>);

impl Script {
    fn solid(width: u32, height: u32, bgra: [u8; 4]) -> Self {
        let script = Self(Arc::new(Mutex::new((0, 0, Vec::new()))));
        script.set_rows(width, &vec![bgra; height as usize]);
        script
    }

    fn set_solid(&self, width: u32, height: u32, bgra: [u8; 4]) {
        self.set_rows(width, &vec![bgra; height as usize]);
    }

    fn set_rows(&self, width: u32, rows: &[[u8; 4]]) {
        let mut pixels = Vec::with_capacity(rows.len() * width as usize * 4);
        for row in rows {
            for _ in 0..width {
                pixels.extend_from_slice(row);
            }
        }
        *self.0.lock().unwrap() = (width, rows.len() as u32, pixels);
    }
}

struct SyntheticBackend {
    script: Script,
}

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
            script: self.script.clone(),
            zones: HashSet::new(),
            next_id: 1,
        }))
    }
}

struct SyntheticCapture {
    script: Script,
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
        let state = self.script.0.lock().unwrap();
        let view = PixelView::new(&state.2, state.0, state.1, state.0 as usize * 4)
            .map_err(|e| CaptureError::Other(e.to_string()))?;
        consumer(view);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scenario helpers
// ---------------------------------------------------------------------------

fn attached_pipeline(script: &Script, settings: &CaptureSettings) -> AmbientPipeline {
    let service = Arc::new(CaptureService::new(Box::new(SyntheticBackend {
        script: script.clone(),
    })));
    let mut pipeline = AmbientPipeline::new(service);
    pipeline.attach(settings).expect("attach synthetic backend");
    pipeline
}

fn first_pixel(frame: &PixelView<'_>) -> [u8; 4] {
    let row = frame.row(0);
    [row[0], row[1], row[2], row[3]]
}

fn scenario_neutral() {
    println!("--- neutral pass-through ---");
    let script = Script::solid(4, 3, [10, 40, 90, 255]);
    let settings = CaptureSettings {
        smoothing_level: 0,
        ..Default::default()
    };
    let mut pipeline = attached_pipeline(&script, &settings);

    let status = pipeline.tick(&settings);
    let frame = pipeline.current_frame().expect("output");
    println!(
        "tick: {:?}, output {}x{}, first pixel (BGRA) {:?}",
        status,
        frame.width(),
        frame.height(),
        first_pixel(&frame)
    );
    println!();
}

fn scenario_letterbox() {
    println!("--- black-bar crop ---");
    let script = Script::solid(4, 6, [0, 0, 0, 255]);
    script.set_rows(
        4,
        &[
            [0, 0, 0, 255],
            [0, 0, 0, 255],
            [10, 200, 60, 255],
            [10, 200, 60, 255],
            [10, 200, 60, 255],
            [10, 200, 60, 255],
        ],
    );
    let mut settings = CaptureSettings {
        smoothing_level: 0,
        ..Default::default()
    };
    settings.black_bars.top = true;
    settings.black_bars.bottom = true;
    let mut pipeline = attached_pipeline(&script, &settings);

    pipeline.tick(&settings);
    let frame = pipeline.current_frame().expect("output");
    println!(
        "source 4x6 with two bar rows, output {}x{}",
        frame.width(),
        frame.height()
    );
    println!();
}

fn scenario_saturation() {
    println!("--- saturation grading ---");
    let script = Script::solid(3, 3, [40, 80, 160, 255]);
    let settings = CaptureSettings {
        saturation: 180,
        smoothing_level: 0,
        ..Default::default()
    };
    let mut pipeline = attached_pipeline(&script, &settings);

    pipeline.tick(&settings);
    let frame = pipeline.current_frame().expect("output");
    println!(
        "input (BGRA) [40, 80, 160, 255], output {:?}, LUTs built: {}",
        first_pixel(&frame),
        pipeline.lut_rebuilds()
    );
    pipeline.tick(&settings);
    println!(
        "second tick reuses the cache, LUTs built: {}",
        pipeline.lut_rebuilds()
    );
    println!();
}

fn scenario_smoothing() {
    println!("--- temporal smoothing ---");
    let script = Script::solid(2, 2, [50, 50, 50, 255]);
    let settings = CaptureSettings {
        smoothing_level: 2,
        ..Default::default()
    };
    let mut pipeline = attached_pipeline(&script, &settings);

    pipeline.tick(&settings);
    println!("scene at 50, then a cut to 200:");
    script.set_solid(2, 2, [200, 200, 200, 255]);
    for i in 1..=5 {
        pipeline.tick(&settings);
        let frame = pipeline.current_frame().expect("output");
        println!("  tick {}: blue channel {}", i, first_pixel(&frame)[0]);
    }
    println!();
}

fn scenario_frame_skip() {
    println!("--- frame skip ---");
    let script = Script::solid(2, 2, [80, 80, 80, 255]);
    let settings = CaptureSettings {
        saturation: 120,
        smoothing_level: 0,
        frame_skip: 3,
        ..Default::default()
    };
    let mut pipeline = attached_pipeline(&script, &settings);

    let statuses: Vec<TickStatus> = (0..6).map(|_| pipeline.tick(&settings)).collect();
    println!("tick statuses with frame_skip = 3: {statuses:?}");
    println!();
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    scenario_neutral();
    scenario_letterbox();
    scenario_saturation();
    scenario_smoothing();
    scenario_frame_skip();
}
