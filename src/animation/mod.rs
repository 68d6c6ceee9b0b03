pub mod animator;
pub mod model;
pub mod playhead;
pub mod pose;
pub mod skeleton;
pub mod track;

pub use animator::Animator;
pub use model::{AnimationSelection, BoneWeight, Mesh, Model, Vertex};
pub use playhead::{InterframeWeights, Playhead};
pub use pose::BlendSelection;
pub use skeleton::{Bone, BoneId, Skeleton};
pub use track::{Channel, Track, Trs};
