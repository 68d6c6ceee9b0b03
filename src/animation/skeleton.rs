use std::collections::HashMap;

use glam::Mat4;

pub type BoneId = usize;

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    /// None for the skeleton root.
    pub parent: Option<BoneId>,
    pub children: Vec<BoneId>,
    bind_pose_offset: Option<Mat4>,
}

impl Bone {
    pub fn new(name: String, parent: Option<BoneId>, children: Vec<BoneId>) -> Self {
        Self {
            name,
            parent,
            children,
            bind_pose_offset: None,
        }
    }

    /// Mesh space -> bone space. Bones that drive no vertices keep the identity.
    pub fn bind_pose_offset(&self) -> Mat4 {
        self.bind_pose_offset.unwrap_or(Mat4::IDENTITY)
    }

    pub fn has_bind_pose(&self) -> bool {
        self.bind_pose_offset.is_some()
    }
}

#[derive(Debug, PartialEq)]
pub enum BindPoseAssignment {
    Assigned,
    Unchanged,
    /// A different offset was already recorded; the first one is kept.
    Conflict,
}

/// Bones stored flat in breadth-first order, so a parent always precedes its children.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    name_to_id: HashMap<String, BoneId>,
}

impl Skeleton {
    /// `bones` must already be in parent-before-child order.
    pub fn from_bones(bones: Vec<Bone>) -> Self {
        let name_to_id = bones
            .iter()
            .enumerate()
            .map(|(idx, bone)| (bone.name.clone(), idx))
            .collect();
        debug_assert!(bones
            .iter()
            .enumerate()
            .all(|(idx, bone)| bone.parent.map_or(true, |parent| parent < idx)));
        Self { bones, name_to_id }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone(&self, id: BoneId) -> &Bone {
        &self.bones[id]
    }

    pub fn bone_id(&self, name: &str) -> Option<BoneId> {
        self.name_to_id.get(name).copied()
    }

    /// Walks from `bone` up to the root, `bone` first.
    pub fn ancestry(&self, bone: BoneId) -> impl Iterator<Item = BoneId> + '_ {
        std::iter::successors(Some(bone), move |id| self.bones[*id].parent)
    }

    pub fn set_bind_pose(&mut self, bone: BoneId, offset: Mat4) -> BindPoseAssignment {
        let slot = &mut self.bones[bone].bind_pose_offset;
        match slot {
            None => {
                *slot = Some(offset);
                BindPoseAssignment::Assigned
            }
            Some(existing) if *existing == offset => BindPoseAssignment::Unchanged,
            Some(_) => BindPoseAssignment::Conflict,
        }
    }

    pub fn bind_pose_offsets(&self) -> Vec<Mat4> {
        self.bones.iter().map(Bone::bind_pose_offset).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn chain() -> Skeleton {
        Skeleton::from_bones(vec![
            Bone::new("hips".into(), None, vec![1]),
            Bone::new("spine".into(), Some(0), vec![2]),
            Bone::new("head".into(), Some(1), vec![]),
        ])
    }

    #[test]
    fn ancestry_walks_to_root() {
        let skeleton = chain();
        let path: Vec<_> = skeleton.ancestry(2).collect();
        assert_eq!(path, vec![2, 1, 0]);
        assert_eq!(skeleton.bone_id("spine"), Some(1));
        assert_eq!(skeleton.bone_id("tail"), None);
    }

    #[test]
    fn first_bind_pose_wins() {
        let mut skeleton = chain();
        let a = Mat4::from_translation(Vec3::X);
        let b = Mat4::from_translation(Vec3::Y);
        assert_eq!(skeleton.set_bind_pose(1, a), BindPoseAssignment::Assigned);
        assert_eq!(skeleton.set_bind_pose(1, a), BindPoseAssignment::Unchanged);
        assert_eq!(skeleton.set_bind_pose(1, b), BindPoseAssignment::Conflict);
        assert_eq!(skeleton.bone(1).bind_pose_offset(), a);
        assert_eq!(skeleton.bone(0).bind_pose_offset(), Mat4::IDENTITY);
    }
}
