use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::path::Path;
use std::sync::Arc;
use anim_kin::{AnimInterpolation, AnimSequence, BoneContainerError, BoneTrack, GraphSettings, ReferenceSkeleton, SequenceError, SkeletonBone};
use glam::{Quat, Vec3};
use math_kin::Transform;
use nab_kin::timing::FSeconds;
use serde::Deserialize;

#[derive(Debug)]
pub enum RigError
{
    Read(std::io::Error),
    Parse(toml::de::Error),
    UnknownParent { bone: String, parent: String },
    UnknownBone { sequence: String, bone: String },
    UnknownSequence(String),
    NoSequences,
    Skeleton(BoneContainerError),
    Sequence { sequence: String, error: SequenceError },
}
impl Display for RigError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}
impl Error for RigError { }

#[derive(Debug, Deserialize)]
struct BoneDef
{
    name: String,
    parent: Option<String>,
    #[serde(default)]
    ref_pose: Transform,
}

#[derive(Debug, Deserialize)]
struct TrackDef
{
    bone: String,
    #[serde(default)]
    translations: Vec<Vec3>,
    #[serde(default)]
    rotations: Vec<Quat>,
    #[serde(default)]
    scales: Vec<Vec3>,
}

#[derive(Debug, Deserialize)]
struct SequenceDef
{
    name: String,
    length: FSeconds,
    num_frames: u32,
    #[serde(default)]
    interpolation: AnimInterpolation,
    #[serde(default)]
    tracks: Vec<TrackDef>,
}

/// How the probe wires its graph
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProbeDef
{
    /// One sequence plays directly, two are blended
    pub sequences: Vec<String>,
    pub blend_alpha: f32,
    pub sync_group: bool,
}

#[derive(Debug, Deserialize)]
struct RigFileDef
{
    name: String,
    bones: Vec<BoneDef>,
    #[serde(default)]
    sequences: Vec<SequenceDef>,
    #[serde(default)]
    graph: GraphSettings,
    #[serde(default)]
    probe: ProbeDef,
}

/// A skeleton, the sequences authored against it, and the graph to drive them with
#[derive(Debug)]
pub struct Rig
{
    pub skeleton: Arc<ReferenceSkeleton>,
    pub sequences: Vec<Arc<AnimSequence>>,
    pub graph_settings: GraphSettings,
    pub probe: ProbeDef,
}
impl Rig
{
    pub fn load(path: &Path) -> Result<Self, RigError>
    {
        let text = std::fs::read_to_string(path).map_err(RigError::Read)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, RigError>
    {
        let def: RigFileDef = toml::from_str(text).map_err(RigError::Parse)?;

        let mut bones = Vec::with_capacity(def.bones.len());
        for (index, bone_def) in def.bones.iter().enumerate()
        {
            // parents must be declared before their children
            let parent = match &bone_def.parent
            {
                None => None,
                Some(parent_name) =>
                {
                    let found = def.bones[..index].iter().position(|b| &b.name == parent_name);
                    Some(found.ok_or_else(|| RigError::UnknownParent
                    {
                        bone: bone_def.name.clone(),
                        parent: parent_name.clone(),
                    })?)
                }
            };
            bones.push(SkeletonBone { name: bone_def.name.clone(), parent, ref_pose: bone_def.ref_pose });
        }
        let skeleton = Arc::new(ReferenceSkeleton::new(def.name, bones).map_err(RigError::Skeleton)?);

        let mut sequences = Vec::with_capacity(def.sequences.len());
        for seq_def in def.sequences
        {
            let mut tracks = Vec::with_capacity(seq_def.tracks.len());
            for track_def in seq_def.tracks
            {
                let Some(skeleton_bone) = skeleton.find_bone(&track_def.bone) else
                {
                    return Err(RigError::UnknownBone { sequence: seq_def.name, bone: track_def.bone });
                };
                tracks.push(BoneTrack
                {
                    skeleton_bone: skeleton_bone as u32,
                    translations: track_def.translations.into_boxed_slice(),
                    rotations: track_def.rotations.into_boxed_slice(),
                    scales: track_def.scales.into_boxed_slice(),
                });
            }

            let sequence = AnimSequence::new(
                seq_def.name.clone(),
                skeleton.id(),
                seq_def.length,
                seq_def.num_frames,
                seq_def.interpolation,
                tracks)
                .map_err(|error| RigError::Sequence { sequence: seq_def.name, error })?;
            sequences.push(Arc::new(sequence));
        }

        Ok(Self
        {
            skeleton,
            sequences,
            graph_settings: def.graph,
            probe: def.probe,
        })
    }

    pub fn find_sequence(&self, name: &str) -> Result<Arc<AnimSequence>, RigError>
    {
        self.sequences.iter()
            .find(|s| s.name() == name)
            .cloned()
            .ok_or_else(|| RigError::UnknownSequence(name.to_string()))
    }

    /// The sequences the probe should play, defaulting to the first one in the file
    pub fn probe_sequences(&self) -> Result<Vec<Arc<AnimSequence>>, RigError>
    {
        if self.probe.sequences.is_empty()
        {
            return self.sequences.first().cloned().map(|s| vec![s]).ok_or(RigError::NoSequences);
        }
        self.probe.sequences.iter().map(|name| self.find_sequence(name)).collect()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    const ARM_RIG: &str = r#"
name = "arm"

[[bones]]
name = "shoulder"

[[bones]]
name = "elbow"
parent = "shoulder"
ref_pose = { position = [0.0, 1.0, 0.0] }

[[sequences]]
name = "raise"
length = 1.0
num_frames = 2
tracks = [
    { bone = "elbow", translations = [[0.0, 1.0, 0.0], [0.0, 2.0, 0.0]] },
]

[[sequences]]
name = "hold"
length = 0.5
num_frames = 1
interpolation = "Step"

[graph]
max_traversal_depth = 8

[probe]
sequences = ["raise", "hold"]
blend_alpha = 0.25
"#;

    #[test]
    fn parse_arm()
    {
        let rig = Rig::parse(ARM_RIG).unwrap();
        assert_eq!(rig.skeleton.num_bones(), 2);
        assert_eq!(rig.skeleton.bones()[1].parent, Some(0));
        assert_eq!(rig.skeleton.bones()[1].ref_pose.position, Vec3::Y);

        assert_eq!(rig.sequences.len(), 2);
        assert_eq!(rig.sequences[0].tracks()[0].skeleton_bone, 1);
        assert_eq!(rig.sequences[1].interpolation(), AnimInterpolation::Step);

        assert_eq!(rig.graph_settings.max_traversal_depth, 8);
        assert!(rig.graph_settings.traversal_checks);

        let playing = rig.probe_sequences().unwrap();
        assert_eq!(playing.len(), 2);
        assert_eq!(playing[1].name(), "hold");
        assert_eq!(rig.probe.blend_alpha, 0.25);
    }

    #[test]
    fn bad_references()
    {
        let unknown_parent = "name = \"x\"\n[[bones]]\nname = \"a\"\nparent = \"b\"\n";
        assert!(matches!(Rig::parse(unknown_parent), Err(RigError::UnknownParent { .. })));

        let unknown_bone = ARM_RIG.replace("bone = \"elbow\"", "bone = \"wrist\"");
        assert!(matches!(Rig::parse(&unknown_bone), Err(RigError::UnknownBone { .. })));

        let unknown_seq = ARM_RIG.replace("[\"raise\", \"hold\"]", "[\"wave\"]");
        let rig = Rig::parse(&unknown_seq).unwrap();
        assert!(matches!(rig.probe_sequences(), Err(RigError::UnknownSequence(_))));
    }

    #[test]
    fn bad_ref_poses()
    {
        let nan_pose = ARM_RIG.replace("ref_pose = { position = [0.0, 1.0, 0.0] }", "ref_pose = { position = [0.0, nan, 0.0] }");
        assert!(matches!(Rig::parse(&nan_pose), Err(RigError::Skeleton(BoneContainerError::InvalidRefPose { bone: 1 }))));

        let unnormalized = ARM_RIG.replace("ref_pose = { position = [0.0, 1.0, 0.0] }", "ref_pose = { rotation = [0.0, 0.0, 0.0, 2.0] }");
        assert!(matches!(Rig::parse(&unnormalized), Err(RigError::Skeleton(BoneContainerError::InvalidRefPose { bone: 1 }))));
    }

    #[test]
    fn defaults_to_first_sequence()
    {
        let rig = Rig::parse(&ARM_RIG.replace("sequences = [\"raise\", \"hold\"]", "")).unwrap();
        let playing = rig.probe_sequences().unwrap();
        assert_eq!(playing.len(), 1);
        assert_eq!(playing[0].name(), "raise");
    }
}
