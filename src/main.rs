use std::{
    error::Error,
    path::PathBuf,
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use anim_viewer::{ControlEvent, FrameHandoff, Viewer};
use crossbeam_queue::SegQueue;
use glam::Vec2;
use log::{error, info};

/// Stands in for the UI: circles the blend query and grows the flock halfway through.
fn spawn_controller(
    controls: Arc<SegQueue<ControlEvent>>,
    handoff: Arc<FrameHandoff>,
    frames: u64,
    done: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut resized = false;
        let mut last_frame = u64::MAX;
        while !done.load(Ordering::Acquire) {
            let frame = handoff.latest_index();
            if frame != last_frame {
                last_frame = frame;
                let angle = frame as f32 / frames.max(1) as f32 * std::f32::consts::TAU;
                controls.push(ControlEvent::BlendQuery(
                    Vec2::new(angle.cos(), angle.sin()) * 0.5,
                ));
                if !resized && frame >= frames / 2 {
                    let boids = handoff.load().latest.boid_transforms.len();
                    if boids > 0 {
                        controls.push(ControlEvent::ResizeFlock(boids * 2));
                    }
                    resized = true;
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
    })
}

fn run(config_path: PathBuf) -> Result<(), Box<dyn Error>> {
    let controls = Arc::new(SegQueue::new());
    let handoff = Arc::new(FrameHandoff::default());
    let (mut viewer, config) = Viewer::from_config(&config_path, controls.clone(), handoff.clone())?;

    let done = Arc::new(AtomicBool::new(false));
    let controller = spawn_controller(controls, handoff.clone(), config.frames, done.clone());
    let result = viewer.run(config.frames, config.tick_rate, config.realtime);
    done.store(true, Ordering::Release);
    if controller.join().is_err() {
        error!("controller thread panicked");
    }
    let summary = result?;

    let last = handoff.load();
    info!(
        "ran {} frames in {:.2?}: {} bones, {} boids",
        summary.frames, summary.elapsed, summary.bone_count, summary.boid_count
    );
    if let Some(blend) = last.latest.blend {
        info!(
            "final blend: tracks {:?} weights {:?}",
            blend.track_ids, blend.weights
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("assets/viewer.json"));

    if let Err(err) = run(config_path) {
        error!("{}", err);
        process::exit(1);
    }
}
