use std::ops::Mul;
use approx::{AbsDiffEq, RelativeEq};
use bitcode::{Decode, Encode};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Translation + rotation + (non-uniform) scale.
///
/// Composition follows the `child * parent` convention: `local * parent_component_space`
/// produces the child's component space transform.
#[derive(Debug, PartialEq, Clone, Copy, Encode, Decode, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform
{
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}
impl Default for Transform
{
    fn default() -> Self { Self::IDENTITY }
}
impl Transform
{
    pub const IDENTITY: Self = Self
    {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    // |1 - |q|^2| above this is considered not normalized
    pub const ROTATION_NORMALIZED_TOLERANCE: f32 = 0.01;
    const SMALL_NUMBER: f32 = 1.0e-8;

    #[inline] #[must_use]
    pub const fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self
    {
        Self { position, rotation, scale }
    }
    #[inline] #[must_use]
    pub const fn from_position(position: Vec3) -> Self
    {
        Self { position, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
    #[inline] #[must_use]
    pub const fn from_rotation_position(rotation: Quat, position: Vec3) -> Self
    {
        Self { position, rotation, scale: Vec3::ONE }
    }

    #[inline]
    pub fn set_identity(&mut self) { *self = Self::IDENTITY; }

    // Get this transform relative to `other`, such that `result * other == self`
    #[must_use]
    pub fn get_relative_transform(&self, other: &Transform) -> Transform
    {
        let inv_scale = Self::safe_recip(other.scale);
        let inv_rotation = other.rotation.inverse();
        Transform
        {
            position: (inv_rotation * (self.position - other.position)) * inv_scale,
            rotation: inv_rotation * self.rotation,
            scale: self.scale * inv_scale,
        }
    }

    #[inline]
    pub fn set_to_relative_transform(&mut self, parent: &Transform)
    {
        *self = self.get_relative_transform(parent);
    }

    #[inline] #[must_use]
    pub fn inverse(&self) -> Transform
    {
        Self::IDENTITY.get_relative_transform(self)
    }

    #[inline] #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3
    {
        self.rotation * (self.scale * point) + self.position
    }

    #[inline] #[must_use]
    pub fn is_rotation_normalized(&self) -> bool
    {
        (1.0 - self.rotation.length_squared()).abs() <= Self::ROTATION_NORMALIZED_TOLERANCE
    }

    pub fn normalize_rotation(&mut self)
    {
        let length_sq = self.rotation.length_squared();
        self.rotation = match length_sq > Self::SMALL_NUMBER
        {
            true => self.rotation * length_sq.sqrt().recip(),
            false => Quat::IDENTITY,
        };
    }

    #[inline] #[must_use]
    pub fn contains_nan(&self) -> bool
    {
        !(self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite())
    }

    // Blend `from` towards `to` by `alpha`. Rotation takes the shortest path and is renormalized
    #[must_use]
    pub fn blend(from: &Transform, to: &Transform, alpha: f32) -> Transform
    {
        Transform
        {
            position: from.position.lerp(to.position, alpha),
            rotation: from.rotation.lerp(to.rotation, alpha),
            scale: from.scale.lerp(to.scale, alpha),
        }
    }

    #[inline]
    pub fn blend_with(&mut self, target: &Transform, alpha: f32)
    {
        *self = Self::blend(self, target, alpha);
    }

    // q and -q represent the same rotation
    #[must_use]
    pub fn equals(&self, other: &Transform, tolerance: f32) -> bool
    {
        self.position.abs_diff_eq(other.position, tolerance) &&
        self.scale.abs_diff_eq(other.scale, tolerance) &&
        (self.rotation.abs_diff_eq(other.rotation, tolerance) || self.rotation.abs_diff_eq(-other.rotation, tolerance))
    }

    #[inline] #[must_use]
    pub fn to_world_mtx(&self) -> Mat4 { Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position) }

    #[inline]
    fn safe_recip(scale: Vec3) -> Vec3
    {
        let recip = |s: f32| if s.abs() <= Self::SMALL_NUMBER { 0.0 } else { s.recip() };
        Vec3::new(recip(scale.x), recip(scale.y), recip(scale.z))
    }
}

// child_local * parent_accum
impl Mul<Transform> for Transform
{
    type Output = Transform;

    fn mul(self, parent: Transform) -> Self::Output
    {
        Transform
        {
            position: parent.rotation * (parent.scale * self.position) + parent.position,
            rotation: parent.rotation * self.rotation,
            scale: self.scale * parent.scale,
        }
    }
}

impl From<(Vec3, Quat, Vec3)> for Transform
{
    fn from((position, rotation, scale): (Vec3, Quat, Vec3)) -> Self
    {
        Transform { position, rotation, scale }
    }
}
impl From<Transform> for Mat4
{
    fn from(t: Transform) -> Self { t.to_world_mtx() }
}
impl From<Mat4> for Transform
{
    fn from(m: Mat4) -> Self
    {
        let (scale, rotation, position) = m.to_scale_rotation_translation();
        Transform { position, rotation, scale }
    }
}

impl AbsDiffEq for Transform
{
    type Epsilon = f32;

    fn default_epsilon() -> Self::Epsilon { f32::default_epsilon() }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool
    {
        self.equals(other, epsilon)
    }
}
impl RelativeEq for Transform
{
    fn default_max_relative() -> Self::Epsilon { f32::default_max_relative() }

    fn relative_eq(&self, other: &Self, epsilon: Self::Epsilon, max_relative: Self::Epsilon) -> bool
    {
        self.position.relative_eq(&other.position, epsilon, max_relative) &&
        self.scale.relative_eq(&other.scale, epsilon, max_relative) &&
        (self.rotation.relative_eq(&other.rotation, epsilon, max_relative) ||
            self.rotation.relative_eq(&-other.rotation, epsilon, max_relative))
    }
}
