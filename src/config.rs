use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::ConfigError;

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves `relative` against the directory holding `config_path`.
pub fn sibling_path(config_path: &Path, relative: &Path) -> PathBuf {
    match config_path.parent() {
        Some(dir) if relative.is_relative() => dir.join(relative),
        _ => relative.to_path_buf(),
    }
}

fn check(field: &'static str, value: f32, valid: bool) -> Result<(), ConfigError> {
    if value.is_finite() && valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue { field, value })
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ModelConfig {
    /// Baked scene file, relative to this config.
    pub model_path: PathBuf,
    #[serde(default = "default_true")]
    pub import_animation: bool,
    #[serde(default = "default_one")]
    pub scale: f32,
    #[serde(default)]
    pub skeleton_root: String,
    #[serde(default)]
    pub play_anim_track: usize,
    #[serde(default = "default_one")]
    pub speed: f32,
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("scale", self.scale, self.scale > 0.0)?;
        check("speed", self.speed, self.speed >= 0.0)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlendSpaceNode {
    pub x: f32,
    pub y: f32,
    pub anim_id: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BlendSpaceConfig {
    pub node: Vec<BlendSpaceNode>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlockBackendKind {
    #[default]
    Cpu,
    Gpu,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FlockConfig {
    pub population: usize,
    pub min_distance: f32,
    pub visual_range: f32,
    pub avoid_factor: f32,
    pub center_factor: f32,
    pub align_factor: f32,
    pub wander_factor: f32,
    pub turn_factor: f32,
    pub domain_half_extent: f32,
    /// 0 picks one worker per available core.
    pub workers: usize,
    pub backend: FlockBackendKind,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            population: 10,
            min_distance: 0.3,
            visual_range: 0.6,
            avoid_factor: 0.05,
            center_factor: 0.01,
            align_factor: 0.01,
            wander_factor: 0.01,
            turn_factor: 0.05,
            domain_half_extent: 1.0,
            workers: 0,
            backend: FlockBackendKind::Cpu,
        }
    }
}

impl FlockConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("min_distance", self.min_distance),
            ("visual_range", self.visual_range),
            ("avoid_factor", self.avoid_factor),
            ("center_factor", self.center_factor),
            ("align_factor", self.align_factor),
            ("wander_factor", self.wander_factor),
            ("turn_factor", self.turn_factor),
        ] {
            check(field, value, value >= 0.0)?;
        }
        check(
            "domain_half_extent",
            self.domain_half_extent,
            self.domain_half_extent > 0.0,
        )
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ViewerConfig {
    pub model: PathBuf,
    #[serde(default)]
    pub blend_space: Option<PathBuf>,
    #[serde(default)]
    pub flock: Option<FlockConfig>,
    #[serde(default = "ViewerConfig::default_frames")]
    pub frames: u64,
    #[serde(default = "ViewerConfig::default_tick_rate")]
    pub tick_rate: f32,
    /// Publish poses to GPU textures when an adapter is available.
    #[serde(default)]
    pub gpu: bool,
    /// Pace ticks to wall-clock time instead of running as fast as possible.
    #[serde(default)]
    pub realtime: bool,
}

impl ViewerConfig {
    fn default_frames() -> u64 {
        600
    }

    fn default_tick_rate() -> f32 {
        60.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check("tick_rate", self.tick_rate, self.tick_rate > 0.0)?;
        if let Some(flock) = &self.flock {
            flock.validate()?;
        }
        Ok(())
    }
}
