use std::any::Any;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use bitcode::{Decode, Encode};
use glam::{Quat, Vec3};
use math_kin::Transform;
use nab_kin::timing::FSeconds;
use serde::{Deserialize, Serialize};
use crate::SkeletonId;

/// Anything a graph node can play. Nodes downcast to the concrete type they support.
pub trait AnimationAsset: Any + Send + Sync + Debug
{
    fn asset_name(&self) -> &str;
    fn skeleton(&self) -> SkeletonId;
    fn play_length(&self) -> FSeconds;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Encode, Decode, Serialize, Deserialize)]
pub enum AnimInterpolation
{
    #[default]
    Linear,
    Step,
}

#[derive(Debug, PartialEq)]
pub enum SequenceError
{
    NoFrames,
    InvalidLength(f32),
    // a key array must be empty, hold a single constant key, or one key per frame
    KeyCount { skeleton_bone: u32, keys: usize, num_frames: u32 },
    DuplicateTrack(u32),
    Decode,
}
impl Display for SequenceError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}
impl Error for SequenceError { }

// Where a sample time lands between two uniformly spaced keys
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePosition
{
    pub frame: usize,
    pub next_frame: usize,
    pub alpha: f32,
}

/// Keys for one skeleton bone. Empty key arrays leave that component at the reference pose.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct BoneTrack
{
    pub skeleton_bone: u32,
    pub translations: Box<[Vec3]>,
    pub rotations: Box<[Quat]>,
    pub scales: Box<[Vec3]>,
}
impl BoneTrack
{
    #[inline]
    fn key<T: Copy>(keys: &[T], frame: usize) -> T
    {
        keys[frame.min(keys.len() - 1)]
    }

    #[must_use]
    pub fn sample(&self, frame: FramePosition, interpolation: AnimInterpolation, ref_pose: &Transform) -> Transform
    {
        let alpha = match interpolation
        {
            AnimInterpolation::Linear => frame.alpha,
            AnimInterpolation::Step => 0.0,
        };

        let mut sampled = *ref_pose;
        if !self.translations.is_empty()
        {
            let from = Self::key(&self.translations, frame.frame);
            let to = Self::key(&self.translations, frame.next_frame);
            sampled.position = from.lerp(to, alpha);
        }
        if !self.rotations.is_empty()
        {
            let from = Self::key(&self.rotations, frame.frame);
            let to = Self::key(&self.rotations, frame.next_frame);
            sampled.rotation = from.slerp(to, alpha);
            sampled.normalize_rotation();
        }
        if !self.scales.is_empty()
        {
            let from = Self::key(&self.scales, frame.frame);
            let to = Self::key(&self.scales, frame.next_frame);
            sampled.scale = from.lerp(to, alpha);
        }
        sampled
    }
}

/// Uniformly keyed bone animation, authored against one skeleton.
#[derive(Debug, Encode, Decode)]
pub struct AnimSequence
{
    name: String,
    skeleton: SkeletonId,
    length: FSeconds,
    num_frames: u32,
    interpolation: AnimInterpolation,
    tracks: Box<[BoneTrack]>,
}
impl AnimSequence
{
    pub fn new(
        name: impl Into<String>,
        skeleton: SkeletonId,
        length: FSeconds,
        num_frames: u32,
        interpolation: AnimInterpolation,
        tracks: Vec<BoneTrack>) -> Result<Self, SequenceError>
    {
        let sequence = Self
        {
            name: name.into(),
            skeleton,
            length,
            num_frames,
            interpolation,
            tracks: tracks.into_boxed_slice(),
        };
        sequence.validate()?;
        Ok(sequence)
    }

    fn validate(&self) -> Result<(), SequenceError>
    {
        if self.num_frames == 0
        {
            return Err(SequenceError::NoFrames);
        }
        if !self.length.0.is_finite() || self.length.0 < 0.0
        {
            return Err(SequenceError::InvalidLength(self.length.0));
        }

        let check_keys = |skeleton_bone: u32, keys: usize|
        {
            match keys == 0 || keys == 1 || keys == self.num_frames as usize
            {
                true => Ok(()),
                false => Err(SequenceError::KeyCount { skeleton_bone, keys, num_frames: self.num_frames }),
            }
        };
        for (i, track) in self.tracks.iter().enumerate()
        {
            check_keys(track.skeleton_bone, track.translations.len())?;
            check_keys(track.skeleton_bone, track.rotations.len())?;
            check_keys(track.skeleton_bone, track.scales.len())?;

            if self.tracks[..i].iter().any(|t| t.skeleton_bone == track.skeleton_bone)
            {
                return Err(SequenceError::DuplicateTrack(track.skeleton_bone));
            }
        }
        Ok(())
    }

    #[inline] #[must_use] pub fn name(&self) -> &str { &self.name }
    #[inline] #[must_use] pub fn skeleton(&self) -> SkeletonId { self.skeleton }
    #[inline] #[must_use] pub fn length(&self) -> FSeconds { self.length }
    #[inline] #[must_use] pub fn num_frames(&self) -> u32 { self.num_frames }
    #[inline] #[must_use] pub fn interpolation(&self) -> AnimInterpolation { self.interpolation }
    #[inline] #[must_use] pub fn tracks(&self) -> &[BoneTrack] { &self.tracks }

    // Times outside of [0, length] are clamped
    #[must_use]
    pub fn frame_position(&self, time: FSeconds) -> FramePosition
    {
        if self.num_frames <= 1 || self.length.0 <= 0.0
        {
            return FramePosition { frame: 0, next_frame: 0, alpha: 0.0 };
        }

        let last_frame = (self.num_frames - 1) as usize;
        let position = (time.0 / self.length.0).clamp(0.0, 1.0) * last_frame as f32;
        let frame = (position.floor() as usize).min(last_frame);
        FramePosition
        {
            frame,
            next_frame: (frame + 1).min(last_frame),
            alpha: position - frame as f32,
        }
    }

    #[must_use]
    pub fn encode_asset(&self) -> Vec<u8>
    {
        bitcode::encode(self)
    }

    pub fn decode_asset(bytes: &[u8]) -> Result<Self, SequenceError>
    {
        let sequence: Self = bitcode::decode(bytes).map_err(|_| SequenceError::Decode)?;
        sequence.validate()?;
        Ok(sequence)
    }
}
impl AnimationAsset for AnimSequence
{
    fn asset_name(&self) -> &str { &self.name }
    fn skeleton(&self) -> SkeletonId { self.skeleton }
    fn play_length(&self) -> FSeconds { self.length }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> { self }
}

#[cfg(test)]
mod tests
{
    use std::f32::consts::FRAC_PI_2;
    use approx::assert_abs_diff_eq;
    use super::*;

    fn two_key_track() -> BoneTrack
    {
        BoneTrack
        {
            skeleton_bone: 0,
            translations: Box::new([Vec3::ZERO, Vec3::new(2.0, 4.0, 0.0)]),
            rotations: Box::new([Quat::IDENTITY, Quat::from_rotation_y(FRAC_PI_2)]),
            scales: Box::new([]),
        }
    }

    fn two_key_sequence(interpolation: AnimInterpolation) -> AnimSequence
    {
        AnimSequence::new("sway", SkeletonId(1), FSeconds(1.0), 2, interpolation, vec![two_key_track()]).unwrap()
    }

    #[test]
    fn frame_positions()
    {
        let sequence = AnimSequence::new("walk", SkeletonId(1), FSeconds(2.0), 5, AnimInterpolation::Linear, vec![]).unwrap();
        assert_eq!(sequence.frame_position(FSeconds(0.0)), FramePosition { frame: 0, next_frame: 1, alpha: 0.0 });
        assert_eq!(sequence.frame_position(FSeconds(1.25)), FramePosition { frame: 2, next_frame: 3, alpha: 0.5 });
        assert_eq!(sequence.frame_position(FSeconds(2.0)), FramePosition { frame: 4, next_frame: 4, alpha: 0.0 });
        assert_eq!(sequence.frame_position(FSeconds(-3.0)).frame, 0);
        assert_eq!(sequence.frame_position(FSeconds(30.0)).frame, 4);
    }

    #[test]
    fn linear_sampling()
    {
        let sequence = two_key_sequence(AnimInterpolation::Linear);
        let ref_pose = Transform::new(Vec3::ONE, Quat::IDENTITY, Vec3::splat(3.0));
        let sampled = sequence.tracks()[0].sample(sequence.frame_position(FSeconds(0.5)), sequence.interpolation(), &ref_pose);

        assert_abs_diff_eq!(sampled.position, Vec3::new(1.0, 2.0, 0.0));
        assert_abs_diff_eq!(sampled.rotation, Quat::from_rotation_y(FRAC_PI_2 * 0.5), epsilon = 1e-6);
        assert_eq!(sampled.scale, Vec3::splat(3.0)); // no scale keys
    }

    #[test]
    fn step_sampling()
    {
        let sequence = two_key_sequence(AnimInterpolation::Step);
        let sampled = sequence.tracks()[0].sample(sequence.frame_position(FSeconds(0.9)), sequence.interpolation(), &Transform::IDENTITY);
        assert_eq!(sampled.position, Vec3::ZERO);
    }

    #[test]
    fn validation()
    {
        assert_eq!(
            AnimSequence::new("empty", SkeletonId(1), FSeconds(1.0), 0, AnimInterpolation::Linear, vec![]).unwrap_err(),
            SequenceError::NoFrames);
        assert_eq!(
            AnimSequence::new("neg", SkeletonId(1), FSeconds(-1.0), 2, AnimInterpolation::Linear, vec![]).unwrap_err(),
            SequenceError::InvalidLength(-1.0));

        let mut bad_keys = two_key_track();
        bad_keys.translations = Box::new([Vec3::ZERO; 3]);
        assert_eq!(
            AnimSequence::new("bad", SkeletonId(1), FSeconds(1.0), 2, AnimInterpolation::Linear, vec![bad_keys]).unwrap_err(),
            SequenceError::KeyCount { skeleton_bone: 0, keys: 3, num_frames: 2 });

        assert_eq!(
            AnimSequence::new("dupe", SkeletonId(1), FSeconds(1.0), 2, AnimInterpolation::Linear, vec![two_key_track(), two_key_track()]).unwrap_err(),
            SequenceError::DuplicateTrack(0));
    }

    #[test]
    fn asset_decoding_validates()
    {
        let sequence = two_key_sequence(AnimInterpolation::Linear);
        let decoded = AnimSequence::decode_asset(&sequence.encode_asset()).unwrap();
        assert_eq!(decoded.name(), "sway");
        assert_eq!(decoded.tracks().len(), 1);

        assert_eq!(AnimSequence::decode_asset(&[1, 2, 3]).unwrap_err(), SequenceError::Decode);
    }

    #[test]
    fn downcast()
    {
        let asset: Arc<dyn AnimationAsset> = Arc::new(two_key_sequence(AnimInterpolation::Linear));
        assert_eq!(asset.asset_name(), "sway");
        assert!(asset.into_any().downcast::<AnimSequence>().is_ok());
    }
}
