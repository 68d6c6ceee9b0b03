pub mod file_formats;
pub mod import;

use std::path::Path;

use log::info;

use crate::{
    animation::Model,
    config::{self, ModelConfig},
    error::ConfigError,
};

use file_formats::scenefile::Scene;

/// Reads a model config and the scene it points at, then builds the model.
pub fn load_model(config_path: &Path) -> Result<Model, ConfigError> {
    let model_config: ModelConfig = config::load_json(config_path)?;
    model_config.validate()?;
    let scene_path = config::sibling_path(config_path, &model_config.model_path);
    let scene: Scene = config::load_json(&scene_path)?;
    let model = import::build_model(&scene, &model_config)?;

    if model_config.import_animation && model.selection.play_track >= model.tracks.len() {
        return Err(ConfigError::PlayTrackOutOfRange {
            track: model.selection.play_track,
            track_count: model.tracks.len(),
        });
    }
    info!(
        "loaded {}: {} bones, {} clips [{}]",
        scene_path.display(),
        model.skeleton.len(),
        model.tracks.len(),
        model
            .tracks
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(model)
}
