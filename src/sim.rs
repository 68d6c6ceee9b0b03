use std::{
    path::Path,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_queue::SegQueue;
use glam::Vec2;
use log::{debug, info, warn};

use crate::{
    animation::{Animator, InterframeWeights, Model},
    blend_space::BlendSpace,
    config::{self, BlendSpaceConfig, FlockBackendKind, ViewerConfig},
    error::{ConfigError, GpuError, ViewerError},
    flock::Flock,
    render::{
        pose_sink::{CpuPoseSink, Fanout, PoseSink},
        GpuContext, GpuPoseSink,
    },
    resource_system,
    frame_handoff::{FrameHandoff, FrameSnapshot},
};

/// State changes requested by whoever drives the viewer. Applied between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    SetSpeed(f32),
    SelectTrack(usize),
    HighlightBone(Option<usize>),
    BlendQuery(Vec2),
    ResizeFlock(usize),
    Exit,
}

/// Per-tick inputs handed down to every update.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub delta_time: f32,
    pub frame_index: u64,
}

pub enum Playback {
    Single(Animator),
    Blend {
        space: BlendSpace,
        query: Vec2,
        interframe: InterframeWeights,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub frames: u64,
    pub elapsed: Duration,
    pub bone_count: usize,
    pub boid_count: usize,
}

const SPIN: Duration = Duration::from_micros(200);

pub struct Viewer {
    model: Model,
    playback: Playback,
    flock: Option<Flock>,
    cpu_sink: CpuPoseSink,
    gpu_sink: Option<GpuPoseSink>,
    controls: Arc<SegQueue<ControlEvent>>,
    handoff: Arc<FrameHandoff>,
    frame_index: u64,
}

impl Viewer {
    pub fn new(
        model: Model,
        blend_space: Option<BlendSpace>,
        flock: Option<Flock>,
        gpu_sink: Option<GpuPoseSink>,
        controls: Arc<SegQueue<ControlEvent>>,
        handoff: Arc<FrameHandoff>,
    ) -> Self {
        let playback = match blend_space {
            Some(space) => Playback::Blend {
                query: space.position(),
                space,
                interframe: InterframeWeights::START,
            },
            None => Playback::Single(Animator::new(model.tracks.len())),
        };
        Self {
            model,
            playback,
            flock,
            cpu_sink: CpuPoseSink::default(),
            gpu_sink,
            controls,
            handoff,
            frame_index: 0,
        }
    }

    /// Loads every document referenced by the viewer config and builds the scene.
    ///
    /// A missing GPU is not fatal: poses stay on the CPU and the flock steps on the worker pool.
    pub fn from_config(
        config_path: &Path,
        controls: Arc<SegQueue<ControlEvent>>,
        handoff: Arc<FrameHandoff>,
    ) -> Result<(Self, ViewerConfig), ViewerError> {
        let viewer_config: ViewerConfig = config::load_json(config_path)?;
        viewer_config.validate()?;

        let model =
            resource_system::load_model(&config::sibling_path(config_path, &viewer_config.model))?;

        let blend_space = match &viewer_config.blend_space {
            Some(relative) => {
                let path = config::sibling_path(config_path, relative);
                if model.tracks.is_empty() {
                    log::error!("{}: model has no clips to blend", path.display());
                    return Err(ConfigError::NoClipsToBlend(path).into());
                }
                let blend_config: BlendSpaceConfig = config::load_json(&path)?;
                Some(BlendSpace::from_config(&blend_config, model.tracks.len())?)
            }
            None => None,
        };

        let wants_gpu = viewer_config.gpu
            || viewer_config
                .flock
                .as_ref()
                .is_some_and(|flock| flock.backend == FlockBackendKind::Gpu);
        let gpu = if wants_gpu {
            match GpuContext::headless() {
                Ok(context) => Some(Arc::new(context)),
                Err(err) => {
                    warn!("gpu unavailable, continuing on the cpu: {}", err);
                    None
                }
            }
        } else {
            None
        };

        let flock = viewer_config
            .flock
            .as_ref()
            .map(|flock_config| Flock::new(flock_config, gpu.clone()));

        let gpu_sink = match gpu {
            Some(context) if viewer_config.gpu => {
                let mut sink = GpuPoseSink::new(context, &model);
                sink.set_highlight_bone(model.selection.highlight_bone);
                Some(sink)
            }
            _ => None,
        };

        let viewer = Self::new(model, blend_space, flock, gpu_sink, controls, handoff);
        Ok((viewer, viewer_config))
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn flock(&self) -> Option<&Flock> {
        self.flock.as_ref()
    }

    pub fn gpu_sink(&self) -> Option<&GpuPoseSink> {
        self.gpu_sink.as_ref()
    }

    pub fn bones(&self) -> &[glam::Mat4] {
        self.cpu_sink.bones()
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Returns false once an `Exit` event was seen. Events after it stay queued.
    fn drain_controls(&mut self) -> bool {
        while let Some(event) = self.controls.pop() {
            debug!("control: {:?}", event);
            match event {
                ControlEvent::Exit => return false,
                ControlEvent::SetSpeed(speed) if speed.is_finite() && speed >= 0.0 => {
                    self.model.selection.speed = speed;
                }
                ControlEvent::SetSpeed(speed) => warn!("ignoring speed {}", speed),
                ControlEvent::SelectTrack(track) => match &self.playback {
                    Playback::Single(_) if track < self.model.tracks.len() => {
                        self.model.selection.play_track = track;
                    }
                    Playback::Single(_) => warn!(
                        "ignoring track {}, only {} clips loaded",
                        track,
                        self.model.tracks.len()
                    ),
                    Playback::Blend { .. } => {
                        warn!("ignoring track selection while a blend space drives the model")
                    }
                },
                ControlEvent::HighlightBone(Some(bone)) if bone >= self.model.skeleton.len() => {
                    warn!(
                        "ignoring highlight of bone {}, skeleton has {}",
                        bone,
                        self.model.skeleton.len()
                    );
                }
                ControlEvent::HighlightBone(bone) => {
                    self.model.selection.highlight_bone = bone;
                    if let Some(sink) = &mut self.gpu_sink {
                        sink.set_highlight_bone(bone);
                    }
                }
                ControlEvent::BlendQuery(position) => match &mut self.playback {
                    Playback::Blend { query, .. } if position.is_finite() => *query = position,
                    Playback::Blend { .. } => warn!("ignoring blend query {}", position),
                    Playback::Single(_) => debug!("no blend space, query {} dropped", position),
                },
                ControlEvent::ResizeFlock(population) => match &mut self.flock {
                    Some(flock) => flock.resize(population),
                    None => warn!("no flock configured, resize to {} dropped", population),
                },
            }
        }
        true
    }

    /// Applies pending control events, steps playback and the flock, and publishes the frame.
    ///
    /// Returns `Ok(false)` when asked to exit.
    pub fn tick(&mut self, context: &FrameContext) -> Result<bool, GpuError> {
        if !self.drain_controls() {
            return Ok(false);
        }
        self.frame_index = context.frame_index;

        let mut sinks: Vec<&mut dyn PoseSink> = Vec::with_capacity(2);
        sinks.push(&mut self.cpu_sink);
        if let Some(gpu_sink) = &mut self.gpu_sink {
            sinks.push(gpu_sink);
        }
        let mut sink = Fanout(sinks);

        let blend = match &mut self.playback {
            Playback::Single(animator) => {
                let bones = animator.update(&self.model, context.delta_time);
                sink.publish(&bones);
                None
            }
            Playback::Blend {
                space,
                query,
                interframe,
            } => {
                interframe.accumulate(context.delta_time, space.frame_rate(&self.model));
                space.update(&self.model, *query, interframe, &mut sink);
                Some(*space.resolved())
            }
        };

        let boid_transforms = match &mut self.flock {
            Some(flock) => {
                flock.update(context.delta_time)?;
                flock.affine_transforms()
            }
            None => Vec::new(),
        };

        let published = self.handoff.publish(FrameSnapshot {
            frame_index: context.frame_index,
            delta_time: context.delta_time,
            model_transform: self.model.instance_transform(),
            bone_transforms: self.cpu_sink.bones().to_vec(),
            highlight_bone: self.model.selection.highlight_bone,
            blend,
            boid_transforms,
        });
        if !published {
            warn!("frame {} is older than the published frame", context.frame_index);
        }
        Ok(true)
    }

    /// Runs up to `frames` ticks of `1 / tick_rate` seconds each.
    ///
    /// With `realtime` set, ticks are paced to the wall clock: sleep most of the gap and spin the rest.
    pub fn run(
        &mut self,
        frames: u64,
        tick_rate: f32,
        realtime: bool,
    ) -> Result<RunSummary, GpuError> {
        let delta_time = 1.0 / tick_rate;
        let tick = Duration::from_secs_f32(delta_time);
        let start = Instant::now();
        let mut next = start + tick;
        let mut ran = 0;

        while ran < frames {
            let context = FrameContext {
                delta_time,
                frame_index: self.frame_index.wrapping_add(1),
            };
            if !self.tick(&context)? {
                info!("exit requested after {} frames", ran);
                break;
            }
            ran += 1;

            if realtime {
                next += tick;
                if let Some(remain) = next.checked_duration_since(Instant::now()) {
                    if remain > SPIN {
                        thread::sleep(remain - SPIN);
                    }
                    while Instant::now() < next {
                        std::hint::spin_loop();
                    }
                } else {
                    // fell behind, resync
                    next = Instant::now() + tick;
                }
            }
        }

        Ok(RunSummary {
            frames: ran,
            elapsed: start.elapsed(),
            bone_count: self.cpu_sink.bones().len(),
            boid_count: self.flock.as_ref().map_or(0, Flock::len),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        animation::{AnimationSelection, Bone, Channel, Mesh, Skeleton, Track},
        config::{BlendSpaceNode, FlockConfig},
    };
    use glam::Vec3;

    fn model() -> Model {
        let clip = |name: &str, x: f32| {
            let mut channel = Channel::rest(4);
            channel.positions.fill(Vec3::new(x, 0.0, 0.0));
            Track {
                name: name.into(),
                duration: 4,
                frame_per_second: 30.0,
                channels: vec![channel, Channel::rest(4)],
            }
        };
        Model {
            skeleton: Skeleton::from_bones(vec![
                Bone::new("root".into(), None, vec![1]),
                Bone::new("tip".into(), Some(0), vec![]),
            ]),
            tracks: vec![clip("a", 1.0), clip("b", 2.0), clip("c", 3.0)],
            mesh: Mesh::default(),
            selection: AnimationSelection::default(),
            scale: 1.0,
        }
    }

    fn viewer(blend_space: Option<BlendSpace>, flock: Option<Flock>) -> Viewer {
        Viewer::new(
            model(),
            blend_space,
            flock,
            None,
            Arc::new(SegQueue::new()),
            Arc::new(FrameHandoff::default()),
        )
    }

    fn context(frame_index: u64) -> FrameContext {
        FrameContext {
            delta_time: 1.0 / 60.0,
            frame_index,
        }
    }

    #[test]
    fn single_track_publishes_a_snapshot() {
        let mut viewer = viewer(None, None);
        assert!(viewer.tick(&context(1)).unwrap());
        let frames = viewer.handoff.load();
        assert_eq!(frames.latest.frame_index, 1);
        assert_eq!(frames.latest.bone_transforms.len(), 2);
        assert!(frames.latest.blend.is_none());
        assert_eq!(
            frames.latest.bone_transforms[0].w_axis.truncate(),
            Vec3::new(1.0, 0.0, 0.0)
        );
    }

    #[test]
    fn invalid_events_are_ignored() {
        let mut viewer = viewer(None, None);
        viewer.controls.push(ControlEvent::SelectTrack(7));
        viewer.controls.push(ControlEvent::HighlightBone(Some(9)));
        viewer.controls.push(ControlEvent::SetSpeed(f32::NAN));
        viewer.controls.push(ControlEvent::ResizeFlock(3));
        viewer.tick(&context(1)).unwrap();
        assert_eq!(viewer.model.selection.play_track, 0);
        assert_eq!(viewer.model.selection.highlight_bone, None);
        assert_eq!(viewer.model.selection.speed, 1.0);
    }

    #[test]
    fn track_selection_switches_the_pose() {
        let mut viewer = viewer(None, None);
        viewer.controls.push(ControlEvent::SelectTrack(2));
        viewer.controls.push(ControlEvent::HighlightBone(Some(1)));
        viewer.tick(&context(1)).unwrap();
        assert_eq!(viewer.bones()[0].w_axis.truncate(), Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(viewer.handoff.load().latest.highlight_bone, Some(1));
    }

    #[test]
    fn blend_query_moves_the_selection() {
        let config = BlendSpaceConfig {
            node: vec![
                BlendSpaceNode { x: 0.0, y: 0.0, anim_id: 0 },
                BlendSpaceNode { x: 1.0, y: 0.0, anim_id: 1 },
                BlendSpaceNode { x: 0.0, y: 1.0, anim_id: 2 },
            ],
        };
        let space = BlendSpace::from_config(&config, 3).unwrap();
        let mut viewer = viewer(Some(space), None);
        viewer
            .controls
            .push(ControlEvent::BlendQuery(Vec2::new(1.0 / 3.0, 1.0 / 3.0)));
        viewer.tick(&context(1)).unwrap();

        let blend = viewer.handoff.load().latest.blend.unwrap();
        for w in blend.weights {
            assert!((w - 1.0 / 3.0).abs() < 1e-4);
        }
        let x = viewer.bones()[0].w_axis.x;
        assert!((x - 2.0).abs() < 1e-3);
    }

    #[test]
    fn flock_resize_and_exit() {
        let flock = Flock::new(
            &FlockConfig {
                population: 4,
                workers: 2,
                ..Default::default()
            },
            None,
        );
        let mut viewer = viewer(None, Some(flock));
        viewer.controls.push(ControlEvent::ResizeFlock(9));
        viewer.tick(&context(1)).unwrap();
        assert_eq!(viewer.handoff.load().latest.boid_transforms.len(), 9);

        viewer.controls.push(ControlEvent::Exit);
        let summary = viewer.run(10, 60.0, false).unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.boid_count, 9);
    }

    #[test]
    fn replayed_tick_keeps_the_newer_frame() {
        let mut viewer = viewer(None, None);
        assert!(viewer.tick(&context(2)).unwrap());
        assert!(viewer.tick(&context(1)).unwrap());
        let frames = viewer.handoff.load();
        assert_eq!(frames.latest.frame_index, 2);
        assert_eq!(frames.previous.frame_index, 0);
        assert!((frames.latest.delta_time - 1.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn run_counts_frames() {
        let mut viewer = viewer(None, None);
        let summary = viewer.run(5, 120.0, false).unwrap();
        assert_eq!(summary.frames, 5);
        assert_eq!(viewer.frame_index(), 5);
        assert_eq!(summary.bone_count, 2);
    }
}
