pub mod flock_compute;
pub mod pose_sink;
pub mod pose_textures;
pub mod wgpu_context;

pub use pose_sink::{CpuPoseSink, PoseSink};
pub use pose_textures::GpuPoseSink;
pub use wgpu_context::GpuContext;
