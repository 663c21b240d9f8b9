use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;
use anim_kin::{AnimInterpolation, AnimSequence, BoneContainer, BoneTrack, BoneTransform, CompactBoneIndex, CompactPose, CsPose};
use approx::assert_abs_diff_eq;
use glam::{Quat, Vec3};
use math_kin::Transform;
use nab_kin::timing::FSeconds;
use crate::fixtures::*;

#[test]
fn parents_precede_children()
{
    for container in all_containers()
    {
        for i in 0..container.num_bones()
        {
            let bone = CompactBoneIndex::new(i);
            match container.parent_bone_index(bone)
            {
                Some(parent) => assert!(parent < bone, "{bone:?} has parent {parent:?} in '{}'", container.skeleton().name()),
                None => assert!(bone.is_root()),
            }
        }
    }
}

#[test]
fn root_starts_in_component_space()
{
    for container in all_containers()
    {
        let cs_pose = CsPose::new(&container).unwrap();
        assert!(cs_pose.is_component_space(CompactBoneIndex::ROOT));
        assert!((1..container.num_bones()).all(|i| !cs_pose.is_component_space(CompactBoneIndex::new(i))));
    }
}

#[test]
fn local_component_round_trip()
{
    for container in all_containers()
    {
        // deepest first, so each conversion sees its parent in component space
        let mut cs_pose = CsPose::new(&container).unwrap();
        let _ = cs_pose.component_space_transforms();
        for i in (1..container.num_bones()).rev()
        {
            cs_pose.convert_bone_to_local_space(CompactBoneIndex::new(i));
        }

        for (actual, expected) in cs_pose.pose().bones().iter().zip(container.ref_pose())
        {
            assert_abs_diff_eq!(actual.position, expected.position, epsilon = 1e-5);
            assert_abs_diff_eq!(actual.scale, expected.scale, epsilon = 1e-5);
            assert!(actual.equals(expected, 1e-5), "{actual:?} != {expected:?}");
        }

        // and bone by bone
        for i in 1..container.num_bones()
        {
            let bone = CompactBoneIndex::new(i);
            let mut cs_pose = CsPose::new(&container).unwrap();
            cs_pose.calculate_component_space_transform(bone);
            cs_pose.convert_bone_to_local_space(bone);
            assert!(cs_pose.pose()[bone].equals(&container.ref_pose()[i], 1e-5));
        }
    }
}

#[test]
fn component_space_rotations_are_normalized()
{
    for container in all_containers()
    {
        // drift the local rotations slightly off unit length
        let mut pose = CompactPose::new(&container).unwrap();
        pose.reset_to_ref_pose().unwrap();
        for bone in pose.bone_indices()
        {
            pose[bone].rotation = pose[bone].rotation * 1.004;
        }

        let mut cs_pose = CsPose::from_pose(pose).unwrap();
        for i in 1..container.num_bones()
        {
            let transform = cs_pose.get_component_space_transform(CompactBoneIndex::new(i));
            assert!((transform.rotation.length() - 1.0).abs() <= 1e-4);
        }
    }
}

fn controller_targets(container: &BoneContainer) -> Vec<BoneTransform>
{
    let mut reference = CsPose::new(container).unwrap();
    let spine = container.find_bone("spine").unwrap();
    let head = container.find_bone("head").unwrap();

    let spine_target = Transform::new(Vec3::new(0.1, 1.3, 0.0), Quat::from_rotation_x(0.5), Vec3::ONE);
    let head_target = *reference.get_component_space_transform(head) * Transform::from_position(Vec3::new(0.0, 0.2, 0.0));
    vec![BoneTransform::new(spine, spine_target), BoneTransform::new(head, head_target)]
}

#[test]
fn blend_at_zero_is_a_no_op()
{
    let container = BoneContainer::new_full(humanoid());
    let targets = controller_targets(&container);

    let mut cs_pose = CsPose::new(&container).unwrap();
    let _ = cs_pose.component_space_transforms();
    let before = cs_pose.clone();

    cs_pose.local_blend_cs_bone_transforms(&targets, 0.0);
    assert_eq!(cs_pose.pose().bones(), before.pose().bones());
    for i in 0..container.num_bones()
    {
        let bone = CompactBoneIndex::new(i);
        assert_eq!(cs_pose.is_component_space(bone), before.is_component_space(bone));
    }
}

#[test]
fn blend_at_one_matches_safe_set()
{
    let container = BoneContainer::new_full(humanoid());
    let targets = controller_targets(&container);

    let mut blended = CsPose::new(&container).unwrap();
    let _ = blended.component_space_transforms();
    let mut set = blended.clone();

    blended.local_blend_cs_bone_transforms(&targets, 1.0);
    set.safe_set_cs_bone_transforms(&targets);

    let blended = blended.component_space_transforms();
    let set = set.component_space_transforms();
    for (b, s) in blended.iter().zip(&set)
    {
        assert_abs_diff_eq!(*b, *s, epsilon = 1e-5);
    }
    assert_abs_diff_eq!(set[3], targets[1].transform, epsilon = 1e-5);
}

#[test]
fn partial_blend_lands_between()
{
    let container = BoneContainer::new_full(humanoid());
    let targets = controller_targets(&container);

    let mut cs_pose = CsPose::new(&container).unwrap();
    cs_pose.local_blend_cs_bone_transforms(&targets, 0.5);
    let spine = *cs_pose.get_component_space_transform(targets[0].bone_index);

    let mut reference = CsPose::new(&container).unwrap();
    let ref_spine = *reference.get_component_space_transform(targets[0].bone_index);
    let midpoint = (ref_spine.position + targets[0].transform.position) * 0.5;
    assert_abs_diff_eq!(spine.position, midpoint, epsilon = 1e-5);
}

#[test]
fn safe_set_carries_grandchildren()
{
    let container = BoneContainer::new_full(humanoid());
    let [root, pelvis, spine, head, thigh_l, shin_l] = [0, 1, 2, 3, 4, 5].map(CompactBoneIndex::new);

    let mut cs_pose = CsPose::new(&container).unwrap();
    for i in 0..container.num_bones()
    {
        cs_pose.get_component_space_transform(CompactBoneIndex::new(i));
    }
    let old_head = *cs_pose.get_component_space_transform(head);

    let pelvis_target = Transform::new(Vec3::new(0.5, 2.0, -1.0), Quat::from_rotation_y(FRAC_PI_2), Vec3::ONE);
    cs_pose.safe_set_cs_bone_transforms(&[BoneTransform::new(pelvis, pelvis_target)]);

    for i in 2..container.num_bones()
    {
        assert!(!cs_pose.is_component_space(CompactBoneIndex::new(i)), "bone {i} should be back in local space");
    }

    let local = |bone: CompactBoneIndex| *container.ref_pose_transform(bone);
    let expected_head = local(head) * local(spine) * pelvis_target;
    let expected_shin = local(shin_l) * local(thigh_l) * pelvis_target;
    assert_abs_diff_eq!(*cs_pose.get_component_space_transform(head), expected_head, epsilon = 1e-4);
    assert_abs_diff_eq!(*cs_pose.get_component_space_transform(shin_l), expected_shin, epsilon = 1e-4);
    assert!(!cs_pose.get_component_space_transform(head).equals(&old_head, 1e-3));

    assert_eq!(*cs_pose.get_component_space_transform(root), Transform::IDENTITY);
    assert_eq!(*cs_pose.get_component_space_transform(pelvis), pelvis_target);
}

#[test]
fn setting_a_descendant_leaves_ancestors_alone()
{
    let container = BoneContainer::new_full(three_bone_chain());
    let [root, child1, child2] = [0, 1, 2].map(CompactBoneIndex::new);

    let mut cs_pose = CsPose::new(&container).unwrap();
    let child2_target = Transform::new(Vec3::new(3.0, 0.0, 1.0), Quat::from_rotation_x(FRAC_PI_2), Vec3::splat(2.0));
    cs_pose.set_component_space_transform(child2, child2_target);

    let child1_cs = *cs_pose.get_component_space_transform(child1);
    let expected = *container.ref_pose_transform(child1) * *container.ref_pose_transform(root);
    assert_abs_diff_eq!(child1_cs, expected, epsilon = 1e-5);
    assert_eq!(*cs_pose.get_component_space_transform(child2), child2_target);
    assert!(cs_pose.get_local_space_transform(child1).equals(container.ref_pose_transform(child1), 1e-5));
}

#[test]
fn two_key_sampling()
{
    let container = BoneContainer::new_full(single_bone());
    let from = Transform::new(Vec3::new(0.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE);
    let to = Transform::new(Vec3::new(4.0, 2.0, -2.0), Quat::from_rotation_z(FRAC_PI_2), Vec3::splat(3.0));
    let track = BoneTrack
    {
        skeleton_bone: 0,
        translations: Box::new([from.position, to.position]),
        rotations: Box::new([from.rotation, to.rotation]),
        scales: Box::new([from.scale, to.scale]),
    };
    let sequence = Arc::new(AnimSequence::new("two_keys", container.skeleton_id(), FSeconds(1.0), 2, AnimInterpolation::Linear, vec![track]).unwrap());

    let mut pose = CompactPose::new(&container).unwrap();
    pose.populate_from_animation(&sequence, FSeconds(0.5)).unwrap();

    let sampled = pose[CompactBoneIndex::ROOT];
    assert_abs_diff_eq!(sampled.position, Vec3::new(2.0, 1.0, -1.0), epsilon = 1e-6);
    assert_abs_diff_eq!(sampled.rotation, Quat::from_rotation_z(FRAC_PI_2 * 0.5), epsilon = 1e-6);
    assert_abs_diff_eq!(sampled.scale, Vec3::splat(2.0), epsilon = 1e-6);

    pose.populate_from_animation(&sequence, FSeconds(1.0)).unwrap();
    assert!(pose[CompactBoneIndex::ROOT].equals(&to, 1e-6));
}
