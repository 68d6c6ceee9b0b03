use glam::Mat4;

/// Destination for evaluated bone transforms. Implementations must make the data visible to
/// the next draw before `publish` returns.
pub trait PoseSink {
    fn publish(&mut self, bone_transforms: &[Mat4]);
}

/// Keeps the last published pose in memory. Used headless and in tests.
#[derive(Default)]
pub struct CpuPoseSink {
    bones: Vec<Mat4>,
    publish_count: u64,
}

impl CpuPoseSink {
    pub fn bones(&self) -> &[Mat4] {
        &self.bones
    }

    pub fn publish_count(&self) -> u64 {
        self.publish_count
    }
}

impl PoseSink for CpuPoseSink {
    fn publish(&mut self, bone_transforms: &[Mat4]) {
        self.bones.clear();
        self.bones.extend_from_slice(bone_transforms);
        self.publish_count += 1;
    }
}

/// Forwards every pose to each sink in order.
pub struct Fanout<'a>(pub Vec<&'a mut dyn PoseSink>);

impl PoseSink for Fanout<'_> {
    fn publish(&mut self, bone_transforms: &[Mat4]) {
        for sink in &mut self.0 {
            sink.publish(bone_transforms);
        }
    }
}
