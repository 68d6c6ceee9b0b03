use std::{fs, path::PathBuf, sync::Arc};

use anim_viewer::{
    blend_space::BlendSpace,
    config::{self, BlendSpaceConfig},
    resource_system, ConfigError, ControlEvent, FrameHandoff, Viewer, ViewerError,
};
use crossbeam_queue::SegQueue;
use glam::Vec2;

fn asset(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("assets")
        .join(name)
}

#[test]
fn sample_model_imports() {
    let model = resource_system::load_model(&asset("model.json")).unwrap();

    let names: Vec<&str> = model.skeleton.bones().iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, ["Hips", "Spine", "LegL", "LegR", "Head"]);
    assert_eq!(model.skeleton.bone(4).parent, Some(1));

    let clips: Vec<&str> = model.tracks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(clips, ["Idle", "Walk", "Run", "Strafe"]);
    for track in &model.tracks {
        assert_eq!(track.duration, 9);
        assert_eq!(track.frame_per_second, 24.0);
        assert_eq!(track.channels.len(), model.skeleton.len());
    }

    assert_eq!(model.mesh.vertices.len(), 20);
    assert_eq!(model.mesh.indices.len(), 30);
    for vertex in 0..model.mesh.vertices.len() {
        let sum: f32 = model.mesh.influences(vertex).iter().map(|w| w.weight).sum();
        assert!((sum - 1.0).abs() < 1e-3);
    }
    assert_eq!(model.mesh.influences(4).len(), 2);
    assert!(model.skeleton.bones().iter().all(|b| b.has_bind_pose()));
}

#[test]
fn sample_blend_space_covers_the_diamond() {
    let model = resource_system::load_model(&asset("model.json")).unwrap();
    let blend_config: BlendSpaceConfig = config::load_json(&asset("blendspace.json")).unwrap();
    let space = BlendSpace::from_config(&blend_config, model.tracks.len()).unwrap();

    assert_eq!(space.nodes().len(), 5);
    assert_eq!(space.triangles().len(), 4);
    let area: f64 = space.triangles().iter().map(|t| t.area()).sum();
    assert!((area - 2.0).abs() < 1e-9);
}

#[test]
fn viewer_runs_headless() {
    let controls = Arc::new(SegQueue::new());
    let handoff = Arc::new(FrameHandoff::default());
    let (mut viewer, config) =
        Viewer::from_config(&asset("viewer.json"), controls.clone(), handoff.clone()).unwrap();
    assert!(!config.gpu);

    controls.push(ControlEvent::BlendQuery(Vec2::new(0.25, 0.25)));
    let summary = viewer.run(12, config.tick_rate, false).unwrap();
    assert_eq!(summary.frames, 12);
    assert_eq!(summary.bone_count, 5);
    assert_eq!(summary.boid_count, 64);

    let snapshot = handoff.load().latest.clone();
    assert_eq!(snapshot.frame_index, 12);
    let blend = snapshot.blend.unwrap();
    let mut tracks = blend.track_ids;
    tracks.sort();
    assert_eq!(tracks, [0, 1, 2]);
    assert!((blend.weights.iter().sum::<f32>() - 1.0).abs() < 1e-4);

    let hips = snapshot.bone_transforms[0].w_axis;
    assert!((hips.y - 1.0).abs() < 0.1);

    controls.push(ControlEvent::ResizeFlock(16));
    controls.push(ControlEvent::Exit);
    let summary = viewer.run(12, config.tick_rate, false).unwrap();
    assert_eq!(summary.frames, 0);
    assert_eq!(viewer.flock().map(|f| f.len()), Some(16));
}

#[test]
fn blend_space_without_clips_is_rejected() {
    let dir = std::env::temp_dir().join(format!("anim-viewer-no-clips-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let model = serde_json::json!({
        "model_path": asset("scene.json"),
        "import_animation": false,
    });
    fs::write(dir.join("model.json"), model.to_string()).unwrap();
    let viewer = serde_json::json!({
        "model": "model.json",
        "blend_space": asset("blendspace.json"),
    });
    fs::write(dir.join("viewer.json"), viewer.to_string()).unwrap();

    let result = Viewer::from_config(
        &dir.join("viewer.json"),
        Arc::new(SegQueue::new()),
        Arc::new(FrameHandoff::default()),
    );
    fs::remove_dir_all(&dir).unwrap();
    match result {
        Err(ViewerError::Config(ConfigError::NoClipsToBlend(path))) => {
            assert_eq!(path, asset("blendspace.json"));
        }
        Err(err) => panic!("unexpected error: {}", err),
        Ok(_) => panic!("viewer built without clips"),
    }
}
