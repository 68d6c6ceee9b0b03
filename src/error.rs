use std::{io, path::PathBuf};

use thiserror::Error;

/// Structural problems in imported scene data. All of these stop initialisation.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("skeleton root '{0}' not found in the scene hierarchy")]
    MissingSkeletonRoot(String),

    #[error("bone '{bone}' referenced by {referenced_by} does not exist")]
    UnknownBone { bone: String, referenced_by: String },

    #[error("bone hierarchy is not a tree: '{0}' is reachable twice")]
    CyclicHierarchy(String),

    #[error("duplicate node name '{0}' in scene hierarchy")]
    DuplicateNode(String),

    #[error("channel '{bone}' in clip '{clip}' has mismatched key counts (rotation {rotations}, position {positions}, scale {scales})")]
    ChannelKeyMismatch {
        clip: String,
        bone: String,
        rotations: usize,
        positions: usize,
        scales: usize,
    },

    #[error("channel '{bone}' in clip '{clip}' has no keys")]
    EmptyChannel { clip: String, bone: String },

    #[error("mesh {mesh} references vertex {vertex} but only has {vertex_count} vertices")]
    VertexOutOfRange {
        mesh: usize,
        vertex: u32,
        vertex_count: usize,
    },
}

/// Failures while loading or validating configuration documents.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("blend space node {node} targets clip {anim_id} but the model only has {track_count} clips")]
    UnknownClip {
        node: usize,
        anim_id: usize,
        track_count: usize,
    },

    #[error("blend space has no nodes")]
    EmptyBlendSpace,

    #[error("play_anim_track {track} is out of range ({track_count} clips loaded)")]
    PlayTrackOutOfRange { track: usize, track_count: usize },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: f32 },

    #[error("blend space {0} needs animation clips but the model has none")]
    NoClipsToBlend(PathBuf),

    #[error(transparent)]
    Import(#[from] ImportError),
}

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("no suitable graphics adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to map readback buffer: {0}")]
    BufferMap(#[from] wgpu::BufferAsyncError),

    #[error("device poll failed: {0}")]
    Poll(#[from] wgpu::PollError),

    #[error("readback channel closed before the map callback fired")]
    ReadbackDropped,
}

/// Anything that can stop the viewer, at start-up or mid-run.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}
