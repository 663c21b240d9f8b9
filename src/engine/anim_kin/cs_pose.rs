use math_kin::Transform;
use smallvec::SmallVec;
use crate::{BoneContainer, CompactBoneIndex, CompactPose, PoseError};

/// Weights below this are treated as zero, and weights above `1 - this` as full
pub const ZERO_ANIM_WEIGHT_THRESHOLD: f32 = 0.00001;

/// A component-space transform for a single bone, as produced by procedural controllers (IK etc)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform
{
    pub bone_index: CompactBoneIndex,
    pub transform: Transform,
}
impl BoneTransform
{
    #[inline] #[must_use]
    pub const fn new(bone_index: CompactBoneIndex, transform: Transform) -> Self { Self { bone_index, transform } }
}

/// Wraps a local-space pose and lazily promotes bones to component space (relative to the root),
/// memoizing each promoted bone. A bone in component space always has its parent in component space.
///
/// Misuse (converting the root, unsorted batches, out of range bones) is a contract violation and panics.
#[derive(Debug, Clone)]
pub struct CsPose<'b>
{
    pose: CompactPose<'b>,
    bone_container: &'b BoneContainer,
    component_space_flags: Vec<bool>,

    // scratch, kept to avoid reallocating each batch
    bone_mask: Vec<bool>,
    bones_to_convert: Vec<CompactBoneIndex>,
}
impl<'b> CsPose<'b>
{
    // Starts at the reference pose
    pub fn new(bone_container: &'b BoneContainer) -> Result<Self, PoseError>
    {
        let mut cs_pose = Self
        {
            pose: CompactPose::default(),
            bone_container,
            component_space_flags: Vec::new(),
            bone_mask: Vec::new(),
            bones_to_convert: Vec::new(),
        };
        cs_pose.init_pose(bone_container)?;
        Ok(cs_pose)
    }

    // Take ownership of a local-space pose
    pub fn from_pose(pose: CompactPose<'b>) -> Result<Self, PoseError>
    {
        let bone_container = pose.bone_container()?;
        let mut cs_pose = Self
        {
            pose,
            bone_container,
            component_space_flags: Vec::new(),
            bone_mask: Vec::new(),
            bones_to_convert: Vec::new(),
        };
        cs_pose.reset_flags();
        Ok(cs_pose)
    }

    pub fn init_pose(&mut self, bone_container: &'b BoneContainer) -> Result<(), PoseError>
    {
        self.pose.set_bone_container(bone_container)?;
        self.pose.reset_to_ref_pose()?;
        self.bone_container = bone_container;
        self.reset_flags();
        Ok(())
    }

    pub fn init_pose_from(&mut self, src: &CompactPose<'b>) -> Result<(), PoseError>
    {
        self.pose.init_from(src)?;
        self.bone_container = src.bone_container()?;
        self.reset_flags();
        Ok(())
    }

    fn reset_flags(&mut self)
    {
        self.component_space_flags.clear();
        self.component_space_flags.resize(self.pose.num_bones(), false);
        // a root's local transform is its component space transform
        if let Some(root) = self.component_space_flags.first_mut()
        {
            *root = true;
        }
    }

    // Bones are a mix of local and component space, see `is_component_space`
    #[inline] #[must_use] pub fn pose(&self) -> &CompactPose<'b> { &self.pose }
    #[inline] #[must_use] pub fn bone_container(&self) -> &'b BoneContainer { self.bone_container }
    #[inline] #[must_use] pub fn num_bones(&self) -> usize { self.pose.num_bones() }

    #[inline]
    fn check_index(&self, bone: CompactBoneIndex)
    {
        assert!(self.pose.is_valid_index(bone), "{bone:?} is out of range of a pose with {} bones", self.pose.num_bones());
    }

    #[inline] #[must_use]
    pub fn is_component_space(&self, bone: CompactBoneIndex) -> bool
    {
        self.check_index(bone);
        self.component_space_flags[bone.get()]
    }

    /// The transform of `bone` relative to its parent. Does not change the space of any bone
    #[must_use]
    pub fn get_local_space_transform(&self, bone: CompactBoneIndex) -> Transform
    {
        self.check_index(bone);
        if !self.component_space_flags[bone.get()]
        {
            return self.pose[bone];
        }

        match self.bone_container.parent_bone_index(bone)
        {
            Some(parent) => self.pose[bone].get_relative_transform(&self.peek_component_space_transform(parent)),
            None => self.pose[bone],
        }
    }

    // Compose the component space transform of `bone` without memoizing it
    fn peek_component_space_transform(&self, bone: CompactBoneIndex) -> Transform
    {
        let mut accumulated = self.pose[bone];
        let mut walk = bone;
        while !self.component_space_flags[walk.get()]
        {
            let Some(parent) = self.bone_container.parent_bone_index(walk) else { break; };
            accumulated = accumulated * self.pose[parent];
            walk = parent;
        }
        accumulated
    }

    /// The transform of `bone` relative to the root. Promotes `bone` and any of its
    /// local-space ancestors to component space.
    pub fn get_component_space_transform(&mut self, bone: CompactBoneIndex) -> &Transform
    {
        self.check_index(bone);
        if !self.component_space_flags[bone.get()]
        {
            self.calculate_component_space_transform(bone);
        }
        debug_assert!(!self.pose[bone].contains_nan());
        &self.pose[bone]
    }

    /// Overwrite `bone` with an authoritative component space transform.
    /// Its ancestors are promoted first; its descendants are left untouched.
    pub fn set_component_space_transform(&mut self, bone: CompactBoneIndex, transform: Transform)
    {
        self.check_index(bone);
        Self::assert_valid_target(&transform);
        if let Some(parent) = self.bone_container.parent_bone_index(bone)
        {
            if !self.component_space_flags[parent.get()]
            {
                self.calculate_component_space_transform(parent);
            }
        }

        self.pose[bone] = transform;
        self.component_space_flags[bone.get()] = true;
    }

    pub fn calculate_component_space_transform(&mut self, bone: CompactBoneIndex)
    {
        self.check_index(bone);
        assert!(!self.component_space_flags[bone.get()], "{bone:?} is already in component space");

        // collect the local-space chain up to the first component space ancestor (the root at the latest)
        let mut chain = SmallVec::<[(CompactBoneIndex, CompactBoneIndex); 16]>::new();
        let mut walk = bone;
        while !self.component_space_flags[walk.get()]
        {
            let parent = self.bone_container.parent_bone_index(walk)
                .unwrap_or_else(|| panic!("Root bone {walk:?} is not in component space, was the pose initialized?"));
            chain.push((walk, parent));
            walk = parent;
        }

        for &(child, parent) in chain.iter().rev()
        {
            if self.pose[child].contains_nan()
            {
                log::error!("Local transform of {child:?} contains NaN, resetting to identity");
                self.pose[child] = Transform::IDENTITY;
            }
            if self.pose[parent].contains_nan()
            {
                log::error!("Component space transform of {parent:?} contains NaN, resetting to identity");
                self.pose[parent] = Transform::IDENTITY;
            }

            let mut component = self.pose[child] * self.pose[parent];
            component.normalize_rotation();
            self.pose[child] = component;
            self.component_space_flags[child.get()] = true;
        }
    }

    /// Demote a component space bone back to local space. No-op if it is already local.
    pub fn convert_bone_to_local_space(&mut self, bone: CompactBoneIndex)
    {
        self.check_index(bone);
        assert!(!bone.is_root(), "The root bone cannot be converted to local space");

        if !self.component_space_flags[bone.get()]
        {
            return;
        }

        let Some(parent) = self.bone_container.parent_bone_index(bone) else { return; };
        assert!(self.component_space_flags[parent.get()], "Parent {parent:?} of {bone:?} is not in component space");

        let parent_transform = self.pose[parent];
        self.pose[bone].set_to_relative_transform(&parent_transform);
        self.component_space_flags[bone.get()] = false;
    }

    #[inline]
    fn assert_valid_target(transform: &Transform)
    {
        debug_assert!(!transform.contains_nan() && transform.is_rotation_normalized(),
            "Component space transforms must be finite with a normalized rotation: {transform:?}");
    }

    #[inline]
    fn assert_sorted(transforms: &[BoneTransform])
    {
        debug_assert!(
            transforms.windows(2).all(|w| w[0].bone_index <= w[1].bone_index),
            "Bone transforms must be sorted parents before children");
    }

    /// Set a batch of component space transforms (sorted parents before children).
    /// Component space descendants of the overwritten bones are first demoted to local space
    /// so that they follow their new ancestors instead of keeping the stale ones baked in.
    pub fn safe_set_cs_bone_transforms(&mut self, transforms: &[BoneTransform])
    {
        puffin::profile_function!();

        let Some(first) = transforms.first() else { return; };
        Self::assert_sorted(transforms);
        transforms.iter().for_each(|t| self.check_index(t.bone_index));

        let num_bones = self.pose.num_bones();
        self.bones_to_convert.clear();
        self.bone_mask.clear();
        self.bone_mask.resize(num_bones, false);

        for t in transforms
        {
            if self.component_space_flags[t.bone_index.get()] && !self.bone_mask[t.bone_index.get()]
            {
                self.bones_to_convert.push(t.bone_index);
                self.bone_mask[t.bone_index.get()] = true;
            }
        }

        // these are about to be overwritten, no need to convert them
        let first_child = self.bones_to_convert.len();

        for i in first.bone_index.get()..num_bones
        {
            let bone = CompactBoneIndex::new(i);
            let Some(parent) = self.bone_container.parent_bone_index(bone) else { continue; };
            if self.component_space_flags[i] && self.bone_mask[parent.get()] && !self.bone_mask[i]
            {
                self.bones_to_convert.push(bone);
                self.bone_mask[i] = true;
            }
        }

        // children first, the list is already in ascending order
        for i in (first_child..self.bones_to_convert.len()).rev()
        {
            let bone = self.bones_to_convert[i];
            self.convert_bone_to_local_space(bone);
        }

        for t in transforms
        {
            self.set_component_space_transform(t.bone_index, t.transform);
        }
    }

    /// Blend a batch of component space transforms (sorted parents before children) into the pose by `alpha`.
    /// Blending happens in local space; the targets are made relative to their effective parent,
    /// which is the parent's target if it is also in the batch, or else the parent's current component space transform.
    pub fn local_blend_cs_bone_transforms(&mut self, transforms: &[BoneTransform], alpha: f32)
    {
        puffin::profile_function!();

        if alpha < ZERO_ANIM_WEIGHT_THRESHOLD
        {
            return;
        }

        Self::assert_sorted(transforms);
        transforms.iter().for_each(|t| Self::assert_valid_target(&t.transform));

        if alpha >= 1.0 - ZERO_ANIM_WEIGHT_THRESHOLD
        {
            self.safe_set_cs_bone_transforms(transforms);
            return;
        }

        transforms.iter().for_each(|t| self.check_index(t.bone_index));

        let num_bones = self.pose.num_bones();
        self.bone_mask.clear();
        self.bone_mask.resize(num_bones, false);

        let mut local_transforms = SmallVec::<[BoneTransform; 8]>::with_capacity(transforms.len());
        for t in transforms
        {
            let local = match self.bone_container.parent_bone_index(t.bone_index)
            {
                Some(parent) =>
                {
                    // batches are expected to be small (a handful of controlled bones)
                    let parent_transform = match transforms.iter().find(|p| p.bone_index == parent)
                    {
                        Some(p) => p.transform,
                        None => *self.get_component_space_transform(parent),
                    };
                    t.transform.get_relative_transform(&parent_transform)
                },
                None => t.transform,
            };
            local_transforms.push(BoneTransform::new(t.bone_index, local));
            self.bone_mask[t.bone_index.get()] = true;
        }

        for i in 1..num_bones
        {
            if let Some(parent) = self.bone_container.parent_bone_index(CompactBoneIndex::new(i))
            {
                self.bone_mask[i] |= self.bone_mask[parent.get()];
            }
        }

        for i in (1..num_bones).rev()
        {
            if self.bone_mask[i]
            {
                self.convert_bone_to_local_space(CompactBoneIndex::new(i));
            }
        }

        for local in &local_transforms
        {
            debug_assert!(!self.component_space_flags[local.bone_index.get()] || local.bone_index.is_root());
            self.pose[local.bone_index].blend_with(&local.transform, alpha);
        }
    }

    /// A copy of the pose with every bone back in local space
    #[must_use]
    pub fn convert_to_local_poses(&self) -> CompactPose<'b>
    {
        puffin::profile_function!();

        let mut local_pose = self.pose.clone();
        for bone in self.pose.bone_indices().rev()
        {
            if bone.is_root() || !self.component_space_flags[bone.get()]
            {
                continue;
            }
            let Some(parent) = self.bone_container.parent_bone_index(bone) else { continue; };
            let parent_transform = local_pose[parent];
            local_pose[bone].set_to_relative_transform(&parent_transform);
            local_pose[bone].normalize_rotation();
        }
        local_pose
    }

    /// Promote every bone and return the component space transforms, e.g. for skinning
    #[must_use]
    pub fn component_space_transforms(&mut self) -> Vec<Transform>
    {
        for bone in self.pose.bone_indices()
        {
            if !self.component_space_flags[bone.get()]
            {
                self.calculate_component_space_transform(bone);
            }
        }
        self.pose.bones().to_vec()
    }

    #[must_use]
    pub fn contains_nan(&self) -> bool { self.pose.contains_nan() }
    #[must_use]
    pub fn is_normalized(&self) -> bool { self.pose.is_normalized() }
}
