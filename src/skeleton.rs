use std::sync::Arc;

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::animation::Animation;
use crate::error::SkeletonError;
use crate::quaternion::Quaternion;

pub const MAX_BONES: usize = 50;

/// Rotation plus translation, applied as `rotation * v + translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoneTransform {
    pub rotation: Mat3,
    pub translation: Vec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BoneTransform {
    pub const IDENTITY: Self = Self {
        rotation: Mat3::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn new(rotation: Mat3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Applies `child` inside this transform's frame.
    pub fn then(&self, child: &BoneTransform) -> BoneTransform {
        BoneTransform {
            rotation: self.rotation * child.rotation,
            translation: self.rotation * child.translation + self.translation,
        }
    }

    /// Inverse of a rigid transform. Only valid for orthonormal rotations.
    pub fn rigid_inverse(&self) -> BoneTransform {
        let rotation = self.rotation.transpose();
        BoneTransform {
            rotation,
            translation: rotation * -self.translation,
        }
    }

    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }
}

/// One joint of a skeleton, stored in a flat array and addressed by index.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonBone {
    pub id: u8,
    /// Index of the parent bone, `None` for a root.
    pub parent: Option<usize>,
    /// Translation relative to the parent.
    pub local_pos: Vec3,
    /// Rotation relative to the parent.
    pub local_rotation: Quaternion,
    /// Set whenever `local_rotation` changes; cleared once per frame.
    pub is_dirty: bool,
    local_matrix: BoneTransform,
    world_matrix: BoneTransform,
    bind_pose: BoneTransform,
    bind_pose_inverse: BoneTransform,
    has_done_bind_pose: bool,
}

impl SkeletonBone {
    pub fn new(id: u8, parent: Option<usize>, local_pos: Vec3, local_rotation: Quaternion) -> Self {
        Self {
            id,
            parent,
            local_pos,
            local_rotation,
            is_dirty: true,
            local_matrix: BoneTransform::IDENTITY,
            world_matrix: BoneTransform::IDENTITY,
            bind_pose: BoneTransform::IDENTITY,
            bind_pose_inverse: BoneTransform::IDENTITY,
            has_done_bind_pose: false,
        }
    }

    pub fn local_matrix(&self) -> &BoneTransform {
        &self.local_matrix
    }

    pub fn world_matrix(&self) -> &BoneTransform {
        &self.world_matrix
    }

    pub fn bind_pose(&self) -> &BoneTransform {
        &self.bind_pose
    }

    pub fn bind_pose_inverse(&self) -> &BoneTransform {
        &self.bind_pose_inverse
    }

    pub fn has_done_bind_pose(&self) -> bool {
        self.has_done_bind_pose
    }

    /// Replaces the local rotation and flags the bone for re-evaluation.
    pub fn set_local_rotation(&mut self, rotation: Quaternion) {
        self.local_rotation = rotation;
        self.is_dirty = true;
    }

    /// Transform taking a bind-pose vertex to its current position.
    pub fn skinning_offset(&self) -> BoneTransform {
        self.world_matrix.then(&self.bind_pose_inverse)
    }
}

/// Bone hierarchy owned by a single mesh.
///
/// Parents always precede their children in storage, so a single forward
/// pass over the bones resolves every world matrix.
#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    bones: Vec<SkeletonBone>,
    pub(crate) animation: Option<Arc<Animation>>,
    pub(crate) current_frame: u32,
    pub(crate) fresh_animation: bool,
}

impl Skeleton {
    pub fn new(bones: Vec<SkeletonBone>) -> Result<Self, SkeletonError> {
        if bones.len() > MAX_BONES {
            return Err(SkeletonError::TooManyBones {
                count: bones.len(),
                max: MAX_BONES,
            });
        }
        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent >= index {
                    return Err(SkeletonError::ParentAfterChild {
                        bone: index,
                        parent,
                    });
                }
            }
        }
        Ok(Self {
            bones,
            animation: None,
            current_frame: 0,
            fresh_animation: false,
        })
    }

    pub fn num_bones(&self) -> usize {
        self.bones.len()
    }

    pub fn bones(&self) -> &[SkeletonBone] {
        &self.bones
    }

    pub fn bone(&self, index: usize) -> Option<&SkeletonBone> {
        self.bones.get(index)
    }

    /// Mutable access to a bone. Parent links are fixed at construction.
    pub fn bone_mut(&mut self, index: usize) -> Option<BoneMut<'_>> {
        self.bones.get_mut(index).map(BoneMut)
    }

    pub fn animation(&self) -> Option<&Arc<Animation>> {
        self.animation.as_ref()
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Recomputes local and world matrices for every dirty bone and every
    /// descendant of one, capturing each bone's bind pose the first time it
    /// is evaluated.
    pub fn update_bone_matrices(&mut self) {
        for index in 0..self.bones.len() {
            let (resolved, rest) = self.bones.split_at_mut(index);
            let bone = &mut rest[0];
            let parent = bone.parent.and_then(|parent| resolved.get(parent));
            let parent_dirty = parent.map_or(false, |parent| parent.is_dirty);

            if !bone.is_dirty && !parent_dirty {
                continue;
            }

            bone.local_rotation.normalize();
            bone.local_matrix =
                BoneTransform::new(bone.local_rotation.to_rotation_matrix(), bone.local_pos);

            match parent {
                None => bone.world_matrix = bone.local_matrix,
                Some(parent) => {
                    if parent.is_dirty {
                        bone.is_dirty = true;
                    }
                    bone.world_matrix = parent.world_matrix.then(&bone.local_matrix);
                }
            }

            if !bone.has_done_bind_pose {
                bone.bind_pose = bone.world_matrix;
                bone.bind_pose_inverse = bone.bind_pose.rigid_inverse();
                bone.has_done_bind_pose = true;
            }
        }
    }

    /// Clears every dirty flag. Call once per frame after skinning.
    pub fn mark_bones_clean(&mut self) {
        for bone in &mut self.bones {
            bone.is_dirty = false;
        }
    }

    /// Rigidly skins `local` vertices into `skinned`, one bone per vertex.
    ///
    /// Vertices whose bone is clean keep last frame's result. Vertices bound to
    /// a missing bone are left untouched.
    pub fn skin_vertices(&self, local: &[Vec3], bone_for_vertex: &[u8], skinned: &mut [Vec3]) {
        for ((vertex, bone), out) in local.iter().zip(bone_for_vertex).zip(skinned.iter_mut()) {
            let offset = self
                .bones
                .get(usize::from(*bone))
                .filter(|bone| bone.is_dirty)
                .map(SkeletonBone::skinning_offset);
            if let Some(offset) = offset {
                *out = offset.apply(*vertex);
            }
        }
    }
}

/// Mutable view of a bone that cannot rewire the hierarchy.
#[derive(Debug)]
pub struct BoneMut<'a>(&'a mut SkeletonBone);

impl BoneMut<'_> {
    pub fn set_local_rotation(&mut self, rotation: Quaternion) {
        self.0.set_local_rotation(rotation);
    }

    pub fn set_local_pos(&mut self, local_pos: Vec3) {
        self.0.local_pos = local_pos;
        self.0.is_dirty = true;
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.0.is_dirty = dirty;
    }

    /// Writes the rotation without touching the dirty flag.
    pub fn overwrite_local_rotation(&mut self, rotation: Quaternion) {
        self.0.local_rotation = rotation;
    }
}
