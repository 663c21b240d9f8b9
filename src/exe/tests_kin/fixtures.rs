use std::f32::consts::FRAC_PI_4;
use std::sync::Arc;
use anim_kin::{BoneContainer, ReferenceSkeleton, SkeletonBone};
use glam::{Quat, Vec3};
use math_kin::Transform;

fn bone(name: &str, parent: Option<usize>, transform: Transform) -> SkeletonBone
{
    SkeletonBone { name: name.into(), parent, ref_pose: transform }
}

pub fn single_bone() -> Arc<ReferenceSkeleton>
{
    Arc::new(ReferenceSkeleton::new("single", vec![
        bone("root", None, Transform::from_position(Vec3::new(0.0, 0.5, 0.0))),
    ]).unwrap())
}

// root -> child1 -> child2
pub fn three_bone_chain() -> Arc<ReferenceSkeleton>
{
    Arc::new(ReferenceSkeleton::new("chain", vec![
        bone("root", None, Transform::from_rotation_position(Quat::from_rotation_y(FRAC_PI_4), Vec3::new(0.0, 1.0, 0.0))),
        bone("child1", Some(0), Transform::from_rotation_position(Quat::from_rotation_z(FRAC_PI_4), Vec3::new(0.0, 2.0, 0.0))),
        bone("child2", Some(1), Transform::from_position(Vec3::new(0.0, 1.5, 0.0))),
    ]).unwrap())
}

// A small humanoid with some scale, so composition exercises every component
pub fn humanoid() -> Arc<ReferenceSkeleton>
{
    let scaled = |rotation: Quat, position: Vec3, scale: f32| Transform::new(position, rotation, Vec3::splat(scale));
    Arc::new(ReferenceSkeleton::new("humanoid", vec![
        bone("root", None, Transform::IDENTITY),
        bone("pelvis", Some(0), scaled(Quat::from_rotation_x(0.1), Vec3::new(0.0, 1.0, 0.0), 1.0)),
        bone("spine", Some(1), scaled(Quat::from_rotation_z(-0.2), Vec3::new(0.0, 0.3, 0.0), 1.1)),
        bone("head", Some(2), scaled(Quat::from_rotation_y(0.7), Vec3::new(0.0, 0.5, 0.05), 0.9)),
        bone("thigh_l", Some(1), scaled(Quat::from_rotation_z(2.9), Vec3::new(0.15, 0.0, 0.0), 1.0)),
        bone("shin_l", Some(4), scaled(Quat::from_rotation_x(0.4), Vec3::new(0.0, 0.45, 0.0), 1.0)),
        bone("thigh_r", Some(1), scaled(Quat::from_rotation_z(-2.9), Vec3::new(-0.15, 0.0, 0.0), 1.0)),
        bone("shin_r", Some(6), scaled(Quat::from_rotation_x(0.4), Vec3::new(0.0, 0.45, 0.0), 1.0)),
    ]).unwrap())
}

pub fn all_containers() -> Vec<BoneContainer>
{
    vec![
        BoneContainer::new_full(single_bone()),
        BoneContainer::new_full(three_bone_chain()),
        BoneContainer::new_full(humanoid()),
        // head and left leg only, the rest of the hierarchy is pulled in
        BoneContainer::new(humanoid(), &[3, 5]).unwrap(),
    ]
}
