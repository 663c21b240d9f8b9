use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, IndexMut};
use math_kin::Transform;
use nab_kin::timing::FSeconds;
use crate::{AnimSequence, BoneContainer, CompactBoneIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseError
{
    Unbound, // no bone container has been bound to the pose
    InvalidContainer,
    InvalidBoneIndex { index: CompactBoneIndex, num_bones: usize },
    BoneCountMismatch { expected: usize, actual: usize },
}
impl Display for PoseError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}
impl Error for PoseError { }

/// Local-space bone transforms, one per compact bone index of the bound [`BoneContainer`].
#[derive(Debug, Clone, Default)]
pub struct CompactPose<'b>
{
    bones: Vec<Transform>,
    bone_container: Option<&'b BoneContainer>,
}
impl<'b> CompactPose<'b>
{
    pub fn new(bone_container: &'b BoneContainer) -> Result<Self, PoseError>
    {
        let mut pose = Self::default();
        pose.set_bone_container(bone_container)?;
        Ok(pose)
    }

    // Rebind to a container. Existing transforms are discarded (reset to identity) until populated
    pub fn set_bone_container(&mut self, bone_container: &'b BoneContainer) -> Result<(), PoseError>
    {
        if !bone_container.is_valid()
        {
            return Err(PoseError::InvalidContainer);
        }
        self.bone_container = Some(bone_container);
        self.bones.clear();
        self.bones.resize(bone_container.num_bones(), Transform::IDENTITY);
        Ok(())
    }

    #[inline]
    pub fn bone_container(&self) -> Result<&'b BoneContainer, PoseError>
    {
        self.bone_container.ok_or(PoseError::Unbound)
    }

    #[inline] #[must_use]
    pub fn is_valid(&self) -> bool
    {
        self.bone_container.is_some_and(|c| c.is_valid())
    }

    #[inline] #[must_use] pub fn num_bones(&self) -> usize { self.bones.len() }
    #[inline] #[must_use] pub fn bones(&self) -> &[Transform] { &self.bones }

    #[inline] #[must_use]
    pub fn is_valid_index(&self, index: CompactBoneIndex) -> bool { index.get() < self.bones.len() }

    #[inline]
    fn check_index(&self, index: CompactBoneIndex) -> Result<usize, PoseError>
    {
        match self.is_valid_index(index)
        {
            true => Ok(index.get()),
            false => Err(PoseError::InvalidBoneIndex { index, num_bones: self.bones.len() }),
        }
    }

    pub fn get(&self, index: CompactBoneIndex) -> Result<&Transform, PoseError>
    {
        let i = self.check_index(index)?;
        Ok(&self.bones[i])
    }
    pub fn get_mut(&mut self, index: CompactBoneIndex) -> Result<&mut Transform, PoseError>
    {
        let i = self.check_index(index)?;
        Ok(&mut self.bones[i])
    }

    pub fn parent_bone_index(&self, index: CompactBoneIndex) -> Result<Option<CompactBoneIndex>, PoseError>
    {
        self.check_index(index)?;
        Ok(self.bone_container()?.parent_bone_index(index))
    }

    pub fn ref_pose(&self, index: CompactBoneIndex) -> Result<&'b Transform, PoseError>
    {
        self.check_index(index)?;
        Ok(self.bone_container()?.ref_pose_transform(index))
    }

    // Iterate bone indices, parents before children
    #[inline]
    pub fn bone_indices(&self) -> impl DoubleEndedIterator<Item = CompactBoneIndex> + use<>
    {
        (0..self.bones.len()).map(CompactBoneIndex::new)
    }

    pub fn reset_to_ref_pose(&mut self) -> Result<(), PoseError>
    {
        let container = self.bone_container()?;
        self.reset_to_ref_pose_from(container)
    }

    // Reset to the reference pose of a specific container, which must match this pose's bone count
    pub fn reset_to_ref_pose_from(&mut self, bone_container: &BoneContainer) -> Result<(), PoseError>
    {
        let ref_pose = bone_container.ref_pose();
        if ref_pose.len() != self.bones.len()
        {
            return Err(PoseError::BoneCountMismatch { expected: self.bones.len(), actual: ref_pose.len() });
        }
        self.bones.copy_from_slice(ref_pose);
        Ok(())
    }

    pub fn reset_to_identity(&mut self)
    {
        self.bones.fill(Transform::IDENTITY);
    }

    #[must_use]
    pub fn is_normalized(&self) -> bool
    {
        self.bones.iter().all(Transform::is_rotation_normalized)
    }

    #[must_use]
    pub fn contains_nan(&self) -> bool
    {
        self.bones.iter().any(Transform::contains_nan)
    }

    pub fn normalize_rotations(&mut self)
    {
        self.bones.iter_mut().for_each(Transform::normalize_rotation);
    }

    // Copy bones and container from `src`
    pub fn init_from(&mut self, src: &CompactPose<'b>) -> Result<(), PoseError>
    {
        self.set_bone_container(src.bone_container()?)?;
        self.bones.copy_from_slice(&src.bones);
        Ok(())
    }

    pub fn copy_bones_from(&mut self, src: &CompactPose<'b>)
    {
        self.bones.clone_from(&src.bones);
        self.bone_container = src.bone_container;
    }

    // Take the transforms out of `src`, leaving it empty and unbound
    pub fn move_bones_from(&mut self, src: &mut CompactPose<'b>)
    {
        self.bones = std::mem::take(&mut src.bones);
        self.bone_container = src.bone_container.take();
    }

    // Take the transforms out of this pose, leaving it empty and unbound
    #[must_use]
    pub fn move_bones_to(&mut self) -> Vec<Transform>
    {
        self.bone_container = None;
        std::mem::take(&mut self.bones)
    }

    // Adopt an externally built transform array; it must match the current bone count
    pub fn move_bones_from_vec(&mut self, transforms: Vec<Transform>) -> Result<(), PoseError>
    {
        if transforms.len() != self.bones.len()
        {
            return Err(PoseError::BoneCountMismatch { expected: self.bones.len(), actual: transforms.len() });
        }
        self.bones = transforms;
        Ok(())
    }

    /// Sample `sequence` at `time` into every bone. Bones the sequence has no track for
    /// (or that the container pruned) keep the reference pose.
    pub fn populate_from_animation(&mut self, sequence: &AnimSequence, time: FSeconds) -> Result<(), PoseError>
    {
        puffin::profile_function!();

        let container = self.bone_container()?;
        self.reset_to_ref_pose_from(container)?;

        let frame = sequence.frame_position(time);
        for track in sequence.tracks()
        {
            let Some(bone) = container.compact_index(track.skeleton_bone as usize) else { continue; };
            let sampled = track.sample(frame, sequence.interpolation(), &self.bones[bone.get()]);
            self.bones[bone.get()] = sampled;
        }
        Ok(())
    }

    // Local-space blend of every bone towards `other`
    pub fn blend_with(&mut self, other: &CompactPose<'_>, alpha: f32) -> Result<(), PoseError>
    {
        if other.bones.len() != self.bones.len()
        {
            return Err(PoseError::BoneCountMismatch { expected: self.bones.len(), actual: other.bones.len() });
        }
        for (bone, target) in self.bones.iter_mut().zip(&other.bones)
        {
            bone.blend_with(target, alpha);
        }
        Ok(())
    }
}
impl Index<CompactBoneIndex> for CompactPose<'_>
{
    type Output = Transform;
    fn index(&self, index: CompactBoneIndex) -> &Self::Output { &self.bones[index.get()] }
}
impl IndexMut<CompactBoneIndex> for CompactPose<'_>
{
    fn index_mut(&mut self, index: CompactBoneIndex) -> &mut Self::Output { &mut self.bones[index.get()] }
}

#[cfg(test)]
mod tests
{
    use std::sync::Arc;
    use approx::assert_abs_diff_eq;
    use glam::{Quat, Vec3};
    use crate::{ReferenceSkeleton, SkeletonBone};
    use super::*;

    fn chain_container() -> BoneContainer
    {
        let bones = (0..3usize).map(|i| SkeletonBone
        {
            name: format!("bone_{i}"),
            parent: i.checked_sub(1),
            ref_pose: Transform::from_rotation_position(Quat::from_rotation_z(0.1 * i as f32), Vec3::new(0.0, 1.0, 0.0)),
        }).collect();
        BoneContainer::new_full(Arc::new(ReferenceSkeleton::new("chain", bones).unwrap()))
    }

    #[test]
    fn unbound()
    {
        let mut pose = CompactPose::default();
        assert!(!pose.is_valid());
        assert_eq!(pose.reset_to_ref_pose(), Err(PoseError::Unbound));
        assert_eq!(pose.num_bones(), 0);
    }

    #[test]
    fn ref_pose_and_identity()
    {
        let container = chain_container();
        let mut pose = CompactPose::new(&container).unwrap();
        assert_eq!(pose.num_bones(), 3);

        pose.reset_to_ref_pose().unwrap();
        assert_eq!(pose.bones(), container.ref_pose());

        pose.reset_to_identity();
        assert!(pose.bones().iter().all(|t| *t == Transform::IDENTITY));
        assert!(pose.is_normalized());
        assert!(!pose.contains_nan());
    }

    #[test]
    fn checked_indices()
    {
        let container = chain_container();
        let pose = CompactPose::new(&container).unwrap();
        let bad = CompactBoneIndex::new(3);
        assert_eq!(pose.get(bad), Err(PoseError::InvalidBoneIndex { index: bad, num_bones: 3 }));
        assert_eq!(pose.parent_bone_index(CompactBoneIndex::new(2)), Ok(Some(CompactBoneIndex::new(1))));
        assert_eq!(pose.parent_bone_index(CompactBoneIndex::ROOT), Ok(None));
    }

    #[test]
    fn validity_queries()
    {
        let container = chain_container();
        let mut pose = CompactPose::new(&container).unwrap();
        pose[CompactBoneIndex::new(1)].rotation = Quat::from_xyzw(0.0, 0.0, 0.0, 2.0);
        assert!(!pose.is_normalized());
        pose.normalize_rotations();
        assert!(pose.is_normalized());

        pose[CompactBoneIndex::new(2)].position.x = f32::NAN;
        assert!(pose.contains_nan());
    }

    #[test]
    fn moves()
    {
        let container = chain_container();
        let mut src = CompactPose::new(&container).unwrap();
        src.reset_to_ref_pose().unwrap();

        let mut dst = CompactPose::default();
        dst.move_bones_from(&mut src);
        assert!(!src.is_valid());
        assert_eq!(src.num_bones(), 0);
        assert!(dst.is_valid());
        assert_eq!(dst.bones(), container.ref_pose());

        let bones = dst.move_bones_to();
        assert_eq!(bones.len(), 3);
        assert!(!dst.is_valid());

        let mut other = CompactPose::new(&container).unwrap();
        assert_eq!(other.move_bones_from_vec(vec![Transform::IDENTITY; 2]), Err(PoseError::BoneCountMismatch { expected: 3, actual: 2 }));
        other.move_bones_from_vec(bones).unwrap();
        assert_eq!(other.bones(), container.ref_pose());

        let mut copy = CompactPose::default();
        copy.init_from(&other).unwrap();
        assert_eq!(copy.bones(), other.bones());

        let mut unbound = CompactPose::default();
        unbound.copy_bones_from(&other);
        assert!(unbound.is_valid());
        assert_eq!(unbound.bones(), other.bones());
    }

    #[test]
    fn blending()
    {
        let container = chain_container();
        let mut a = CompactPose::new(&container).unwrap();
        let mut b = CompactPose::new(&container).unwrap();
        b.reset_to_ref_pose().unwrap();
        for bone in b.bone_indices()
        {
            b[bone].position = Vec3::new(2.0, 0.0, 0.0);
        }
        a.blend_with(&b, 0.25).unwrap();
        assert_abs_diff_eq!(a[CompactBoneIndex::new(1)].position, Vec3::new(0.5, 0.0, 0.0));
        assert!(a.is_normalized());
    }
}
