pub mod animation;
pub mod blend_space;
pub mod config;
pub mod error;
pub mod flock;
pub mod frame_handoff;
pub mod job_system;
pub mod render;
pub mod resource_system;
pub mod sim;

pub use error::{ConfigError, GpuError, ImportError, ViewerError};
pub use frame_handoff::{FrameHandoff, FrameSnapshot, PublishedFrames};
pub use sim::{ControlEvent, FrameContext, RunSummary, Viewer};
