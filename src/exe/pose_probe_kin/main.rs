mod rig_file;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use anim_kin::{AnimGraph, AnimNode, AnimSequence, BoneContainer, CompactBoneIndex, GraphError, NodeId, PoseLink, SequenceEvaluatorNode, TwoWayBlendNode};
use clap::Parser;
use math_kin::Transform;
use nab_kin::app::{fatal_error, set_panic_hook, AppRun, ExitReason, FatalError, FatalErrorCode};
use nab_kin::timing::FSeconds;
use crate::rig_file::Rig;

#[derive(Debug)]
struct GraphFailure(GraphError);
impl FatalErrorCode for GraphFailure
{
    fn error_code(&self) -> u16
    {
        match self.0
        {
            GraphError::CircularLink { .. } => 1,
            GraphError::PhaseOrder { .. } => 2,
            GraphError::AlreadyRun { .. } => 3,
            GraphError::DepthExceeded { .. } => 4,
            GraphError::InvalidOutput { .. } => 5,
            GraphError::Pose(_) => 6,
        }
    }
}

#[derive(Debug, Parser)]
struct CliArgs
{
    /// Rig file (toml) describing the skeleton, its sequences, and how to play them
    rig: PathBuf,

    #[arg(long, default_value_t = 4)]
    frames: u32,

    #[arg(long, default_value_t = 1.0 / 30.0)]
    delta_time: f32,

    // skip bones that aren't needed, by skeleton index
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    required_bones: Vec<usize>,

    #[arg(long)]
    debug_data: bool,
}

// evaluators come first so their node ids match their sequence order
fn build_graph(rig: &Rig, sequences: Vec<Arc<AnimSequence>>) -> (AnimGraph, Vec<NodeId>)
{
    let mut nodes: Vec<Box<dyn AnimNode>> = Vec::with_capacity(sequences.len() + 1);
    for sequence in sequences
    {
        let mut evaluator = SequenceEvaluatorNode::new(format!("Play {}", sequence.name()), Some(sequence));
        if rig.probe.sync_group
        {
            evaluator = evaluator.with_sync_group(0, true);
        }
        nodes.push(Box::new(evaluator));
    }
    let evaluators = (0..nodes.len()).map(NodeId).collect::<Vec<_>>();

    let root_link_id = match evaluators.len()
    {
        1 => 0,
        _ =>
        {
            if evaluators.len() > 2
            {
                log::warn!("Only the first two of {} sequences are blended", evaluators.len());
            }
            nodes.push(Box::new(TwoWayBlendNode::new("Blend", PoseLink::new(0), PoseLink::new(1), rig.probe.blend_alpha)));
            nodes.len() - 1
        }
    };

    (AnimGraph::new(nodes, root_link_id, rig.graph_settings.clone()), evaluators)
}

fn log_pose(frame: u32, bone_container: &BoneContainer, transforms: &[Transform])
{
    let bones = bone_container.skeleton().bones();
    for (index, transform) in transforms.iter().enumerate()
    {
        let skeleton_bone = bone_container.skeleton_index(CompactBoneIndex::new(index));
        log::info!("[{frame}] {:<12} pos {:.3} rot {:.3} scale {:.3}",
            bones[skeleton_bone].name,
            transform.position,
            transform.rotation,
            transform.scale);
    }
}

fn run_frames(args: &CliArgs, graph: &mut AnimGraph, evaluators: &[NodeId], bone_container: &BoneContainer) -> Result<(), GraphError>
{
    graph.initialize(bone_container)?;

    let delta_time = FSeconds(args.delta_time);
    for frame in 0..args.frames
    {
        puffin::GlobalProfiler::lock().new_frame();
        let frame_start = Instant::now();

        let time = FSeconds(args.delta_time * frame as f32);
        for &node in evaluators
        {
            if let Some(evaluator) = graph.node_as_mut::<SequenceEvaluatorNode>(node)
            {
                evaluator.explicit_time = time;
            }
        }

        graph.cache_bones(bone_container)?;
        graph.update(bone_container, delta_time)?;
        let transforms = graph.evaluate_component_space(bone_container)?;
        log::debug!("[{frame}] evaluated in {:?}", FSeconds::from(frame_start.elapsed()));
        log_pose(frame, bone_container, &transforms);

        if args.debug_data
        {
            log::info!("[{frame}] graph:\n{}", graph.gather_debug_data());
        }
    }

    Ok(())
}

fn main() -> ExitReason
{
    let app_run = AppRun::<CliArgs>::startup("Pose Probe", env!("CARGO_PKG_VERSION"));
    set_panic_hook();
    puffin::set_scopes_on(cfg!(feature = "frame_profiler"));

    let rig_path = app_run.resolve_path(&app_run.args.rig);
    let rig = match Rig::load(&rig_path)
    {
        Ok(rig) => rig,
        Err(err) =>
        {
            log::error!("Failed to load rig {rig_path:?}: {err}");
            app_run.set_exit_reason(ExitReason::InvalidInput);
            return app_run.get_exit_reason();
        }
    };

    let bone_container = match app_run.args.required_bones.as_slice()
    {
        [] => Ok(BoneContainer::new_full(rig.skeleton.clone())),
        required => BoneContainer::new(rig.skeleton.clone(), required),
    };
    let bone_container = match bone_container
    {
        Ok(bones) => bones,
        Err(err) =>
        {
            log::error!("Invalid required bones {:?}: {err}", app_run.args.required_bones);
            app_run.set_exit_reason(ExitReason::InvalidInput);
            return app_run.get_exit_reason();
        }
    };

    let sequences = match rig.probe_sequences()
    {
        Ok(sequences) => sequences,
        Err(err) =>
        {
            log::error!("Failed to pick sequences: {err}");
            app_run.set_exit_reason(ExitReason::InvalidInput);
            return app_run.get_exit_reason();
        }
    };

    let (mut graph, evaluators) = build_graph(&rig, sequences);
    log::debug!("Built graph with {} nodes for skeleton '{}' ({} of {} bones)",
        graph.num_nodes(),
        rig.skeleton.name(),
        bone_container.num_bones(),
        rig.skeleton.num_bones());

    if let Err(err) = run_frames(&app_run.args, &mut graph, &evaluators, &bone_container)
    {
        log::error!("Graph failed: {err}");
        fatal_error(FatalError::InvalidGraph, GraphFailure(err));
    }

    app_run.get_exit_reason()
}
