use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use bitcode::{Decode, Encode};
use math_kin::Transform;
use nab_kin::hashing::hash_name;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use crate::CompactBoneIndex;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize)]
pub struct SkeletonId(pub u64);
impl SkeletonId
{
    #[inline] #[must_use]
    pub fn from_name(name: &str) -> Self { Self(hash_name(name)) }
}

#[derive(Debug, PartialEq)]
pub enum BoneContainerError
{
    EmptySkeleton,
    // parents must be stored before their children
    ParentOrder { bone: usize, parent: usize },
    MissingRoot,
    BoneOutOfRange { bone: usize, num_bones: usize },
    // reference poses must be finite with a normalized rotation
    InvalidRefPose { bone: usize },
}
impl Display for BoneContainerError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}
impl Error for BoneContainerError { }

#[derive(Debug, Clone)]
pub struct SkeletonBone
{
    pub name: String,
    pub parent: Option<usize>,
    pub ref_pose: Transform,
}

/// The full, shared bone hierarchy of a skeleton asset. Read-only once built.
#[derive(Debug)]
pub struct ReferenceSkeleton
{
    id: SkeletonId,
    name: String,
    bones: Box<[SkeletonBone]>,
}
impl ReferenceSkeleton
{
    pub fn new(name: impl Into<String>, bones: Vec<SkeletonBone>) -> Result<Self, BoneContainerError>
    {
        if bones.is_empty()
        {
            return Err(BoneContainerError::EmptySkeleton);
        }
        if bones[0].parent.is_some()
        {
            return Err(BoneContainerError::MissingRoot);
        }
        for (bone, info) in bones.iter().enumerate().skip(1)
        {
            match info.parent
            {
                Some(parent) if parent < bone => { },
                Some(parent) => return Err(BoneContainerError::ParentOrder { bone, parent }),
                None => return Err(BoneContainerError::MissingRoot), // only one root allowed
            }
        }
        if let Some(bone) = bones.iter().position(|b| b.ref_pose.contains_nan() || !b.ref_pose.is_rotation_normalized())
        {
            return Err(BoneContainerError::InvalidRefPose { bone });
        }

        let name = name.into();
        Ok(Self
        {
            id: SkeletonId::from_name(&name),
            name,
            bones: bones.into_boxed_slice(),
        })
    }

    #[inline] #[must_use] pub fn id(&self) -> SkeletonId { self.id }
    #[inline] #[must_use] pub fn name(&self) -> &str { &self.name }
    #[inline] #[must_use] pub fn num_bones(&self) -> usize { self.bones.len() }
    #[inline] #[must_use] pub fn bones(&self) -> &[SkeletonBone] { &self.bones }

    #[must_use]
    pub fn find_bone(&self, name: &str) -> Option<usize>
    {
        self.bones.iter().position(|b| b.name == name)
    }
}

/// Maps the compact bone set required for one mesh/LOD onto the skeleton hierarchy.
/// Shared read-only by every pose evaluated against it.
#[derive(Debug)]
pub struct BoneContainer
{
    skeleton: Arc<ReferenceSkeleton>,
    compact_to_skeleton: Box<[usize]>,
    skeleton_to_compact: Box<[Option<CompactBoneIndex>]>,
    parent_indices: Box<[Option<CompactBoneIndex>]>,
    ref_pose: Box<[Transform]>,
}
impl BoneContainer
{
    // Use every bone in the skeleton
    pub fn new_full(skeleton: Arc<ReferenceSkeleton>) -> Self
    {
        let num_bones = skeleton.num_bones();
        let all: SmallVec<[usize; 64]> = (0..num_bones).collect();
        Self::build(skeleton, &all)
    }

    // Use a subset of skeleton bones, e.g. for a lower LOD. Missing ancestors are added automatically
    pub fn new(skeleton: Arc<ReferenceSkeleton>, required_bones: &[usize]) -> Result<Self, BoneContainerError>
    {
        let num_bones = skeleton.num_bones();
        let mut required = vec![false; num_bones];
        for &bone in required_bones
        {
            if bone >= num_bones
            {
                return Err(BoneContainerError::BoneOutOfRange { bone, num_bones });
            }

            let mut walk = Some(bone);
            while let Some(b) = walk
            {
                if required[b] { break; }
                required[b] = true;
                walk = skeleton.bones[b].parent;
            }
        }
        required[0] = true;

        let bones: SmallVec<[usize; 64]> = required.iter().enumerate()
            .filter_map(|(i, r)| r.then_some(i))
            .collect();
        Ok(Self::build(skeleton, &bones))
    }

    fn build(skeleton: Arc<ReferenceSkeleton>, sorted_bones: &[usize]) -> Self
    {
        let mut skeleton_to_compact = vec![None; skeleton.num_bones()].into_boxed_slice();
        for (compact, &skel) in sorted_bones.iter().enumerate()
        {
            skeleton_to_compact[skel] = Some(CompactBoneIndex::new(compact));
        }

        let parent_indices = sorted_bones.iter()
            .map(|&skel| skeleton.bones[skel].parent.and_then(|p| skeleton_to_compact[p]))
            .collect();
        let ref_pose = sorted_bones.iter()
            .map(|&skel| skeleton.bones[skel].ref_pose)
            .collect();

        log::trace!("Built bone container for '{}' with {}/{} bones", skeleton.name(), sorted_bones.len(), skeleton.num_bones());

        Self
        {
            compact_to_skeleton: sorted_bones.into(),
            skeleton_to_compact,
            parent_indices,
            ref_pose,
            skeleton,
        }
    }

    #[inline] #[must_use]
    pub fn is_valid(&self) -> bool
    {
        !self.compact_to_skeleton.is_empty() && self.ref_pose.len() == self.compact_to_skeleton.len()
    }
    #[inline] #[must_use] pub fn num_bones(&self) -> usize { self.compact_to_skeleton.len() }
    #[inline] #[must_use] pub fn skeleton(&self) -> &Arc<ReferenceSkeleton> { &self.skeleton }
    #[inline] #[must_use] pub fn skeleton_id(&self) -> SkeletonId { self.skeleton.id() }

    #[inline] #[must_use]
    pub fn is_valid_index(&self, bone: CompactBoneIndex) -> bool { bone.get() < self.num_bones() }

    // None for the root
    #[inline] #[must_use]
    pub fn parent_bone_index(&self, bone: CompactBoneIndex) -> Option<CompactBoneIndex>
    {
        self.parent_indices[bone.get()]
    }

    #[inline] #[must_use]
    pub fn ref_pose_transform(&self, bone: CompactBoneIndex) -> &Transform
    {
        &self.ref_pose[bone.get()]
    }
    #[inline] #[must_use] pub fn ref_pose(&self) -> &[Transform] { &self.ref_pose }

    #[inline] #[must_use]
    pub fn skeleton_index(&self, bone: CompactBoneIndex) -> usize
    {
        self.compact_to_skeleton[bone.get()]
    }

    // None if the skeleton bone was pruned from this container
    #[inline] #[must_use]
    pub fn compact_index(&self, skeleton_bone: usize) -> Option<CompactBoneIndex>
    {
        self.skeleton_to_compact.get(skeleton_bone).copied().flatten()
    }

    #[must_use]
    pub fn find_bone(&self, name: &str) -> Option<CompactBoneIndex>
    {
        self.skeleton.find_bone(name).and_then(|skel| self.compact_index(skel))
    }
}

#[cfg(test)]
mod tests
{
    use glam::{Quat, Vec3};
    use super::*;

    fn bone(name: &str, parent: Option<usize>, y: f32) -> SkeletonBone
    {
        SkeletonBone { name: name.into(), parent, ref_pose: Transform::from_position(Vec3::new(0.0, y, 0.0)) }
    }

    fn biped() -> Arc<ReferenceSkeleton>
    {
        Arc::new(ReferenceSkeleton::new("biped", vec![
            bone("root", None, 0.0),
            bone("pelvis", Some(0), 1.0),
            bone("spine", Some(1), 0.5),
            bone("head", Some(2), 0.5),
            bone("thigh_l", Some(1), -0.1),
            bone("calf_l", Some(4), -0.5),
        ]).unwrap())
    }

    #[test]
    fn skeleton_validation()
    {
        assert_eq!(ReferenceSkeleton::new("empty", vec![]).unwrap_err(), BoneContainerError::EmptySkeleton);
        assert_eq!(
            ReferenceSkeleton::new("bad", vec![bone("root", None, 0.0), bone("a", Some(2), 0.0), bone("b", Some(0), 0.0)]).unwrap_err(),
            BoneContainerError::ParentOrder { bone: 1, parent: 2 });
        assert_eq!(
            ReferenceSkeleton::new("two_roots", vec![bone("root", None, 0.0), bone("other", None, 0.0)]).unwrap_err(),
            BoneContainerError::MissingRoot);

        let mut unnormalized = bone("a", Some(0), 0.0);
        unnormalized.ref_pose.rotation = Quat::from_xyzw(0.0, 0.0, 0.0, 2.0);
        assert_eq!(
            ReferenceSkeleton::new("unnormalized", vec![bone("root", None, 0.0), unnormalized]).unwrap_err(),
            BoneContainerError::InvalidRefPose { bone: 1 });

        let mut infinite = bone("root", None, 0.0);
        infinite.ref_pose.scale.y = f32::INFINITY;
        assert_eq!(ReferenceSkeleton::new("infinite", vec![infinite]).unwrap_err(), BoneContainerError::InvalidRefPose { bone: 0 });
    }

    #[test]
    fn full_container()
    {
        let container = BoneContainer::new_full(biped());
        assert!(container.is_valid());
        assert_eq!(container.num_bones(), 6);
        assert_eq!(container.parent_bone_index(CompactBoneIndex::ROOT), None);
        assert_eq!(container.parent_bone_index(CompactBoneIndex::new(5)), Some(CompactBoneIndex::new(4)));
        assert_eq!(container.find_bone("head"), Some(CompactBoneIndex::new(3)));
        assert_eq!(container.skeleton_id(), SkeletonId::from_name("biped"));
    }

    #[test]
    fn parents_precede_children()
    {
        let container = BoneContainer::new(biped(), &[5, 3]).unwrap();
        for i in 1..container.num_bones()
        {
            let bone = CompactBoneIndex::new(i);
            let parent = container.parent_bone_index(bone).expect("non-root bones have parents");
            assert!(parent < bone);
        }
    }

    #[test]
    fn pruned_container()
    {
        // calf_l pulls in thigh_l, pelvis and root; spine and head are dropped
        let container = BoneContainer::new(biped(), &[5]).unwrap();
        assert_eq!(container.num_bones(), 4);
        assert_eq!(container.skeleton_index(CompactBoneIndex::new(2)), 4);
        assert_eq!(container.compact_index(2), None);
        assert_eq!(container.compact_index(5), Some(CompactBoneIndex::new(3)));
        assert_eq!(container.parent_bone_index(CompactBoneIndex::new(2)), Some(CompactBoneIndex::new(1)));
        assert_eq!(container.ref_pose_transform(CompactBoneIndex::new(3)).position, Vec3::new(0.0, -0.5, 0.0));
        assert_eq!(container.find_bone("spine"), None);

        assert_eq!(BoneContainer::new(biped(), &[9]).unwrap_err(), BoneContainerError::BoneOutOfRange { bone: 9, num_bones: 6 });
    }
}
