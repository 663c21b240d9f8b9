use anim_kin::{AnimGraph, AnimNode, BoneContainer, CompactPose, GraphError, GraphPhase, GraphSettings, NodeId, PoseLink, SequenceEvaluatorNode, TwoWayBlendNode};
use nab_kin::timing::FSeconds;
use crate::fixtures::*;

fn run_frame<'b>(graph: &mut AnimGraph, bones: &'b BoneContainer, delta_time: f32) -> Result<CompactPose<'b>, GraphError>
{
    graph.cache_bones(bones)?;
    graph.update(bones, FSeconds(delta_time))?;
    graph.evaluate(bones)
}

// A -> B -> A
fn cyclic_graph() -> AnimGraph
{
    let nodes: Vec<Box<dyn AnimNode>> = vec![
        Box::new(TwoWayBlendNode::new("a", PoseLink::new(1), PoseLink::unlinked(), 0.0)),
        Box::new(TwoWayBlendNode::new("b", PoseLink::new(0), PoseLink::unlinked(), 0.0)),
    ];
    AnimGraph::new(nodes, 0, GraphSettings::default())
}

#[test]
fn circular_links_are_detected()
{
    let bones = BoneContainer::new_full(three_bone_chain());
    let mut graph = cyclic_graph();
    assert_eq!(
        graph.initialize(&bones),
        Err(GraphError::CircularLink { node: NodeId(0), phase: GraphPhase::Initialize }));

    // the failed traversal released every guard, so it fails the same way again instead of being stuck
    assert_eq!(
        graph.initialize(&bones),
        Err(GraphError::CircularLink { node: NodeId(0), phase: GraphPhase::Initialize }));

    let debug = graph.gather_debug_data().to_string();
    assert!(debug.contains("(circular link)"), "{debug}");
}

#[test]
fn deep_graphs_hit_the_depth_limit()
{
    let bones = BoneContainer::new_full(three_bone_chain());
    let nodes: Vec<Box<dyn AnimNode>> = vec![
        Box::new(TwoWayBlendNode::new("a", PoseLink::new(1), PoseLink::unlinked(), 0.0)),
        Box::new(TwoWayBlendNode::new("b", PoseLink::new(2), PoseLink::unlinked(), 0.0)),
        Box::new(TwoWayBlendNode::new("c", PoseLink::new(3), PoseLink::unlinked(), 0.0)),
        Box::new(SequenceEvaluatorNode::new("leaf", None)),
    ];
    let settings = GraphSettings { max_traversal_depth: 2, ..Default::default() };
    let mut graph = AnimGraph::new(nodes, 0, settings);
    assert_eq!(graph.initialize(&bones), Err(GraphError::DepthExceeded { node: NodeId(2), max_depth: 2 }));
}

#[test]
fn missing_sequence_gives_ref_pose()
{
    let bones = BoneContainer::new_full(humanoid());
    let mut graph = AnimGraph::new(vec![Box::new(SequenceEvaluatorNode::new("empty", None))], 0, GraphSettings::default());
    graph.initialize(&bones).unwrap();

    let mut expected = CompactPose::new(&bones).unwrap();
    expected.reset_to_ref_pose().unwrap();

    for time in [0.0, 0.25, 3.0, -1.0]
    {
        graph.node_as_mut::<SequenceEvaluatorNode>(NodeId(0)).unwrap().explicit_time = FSeconds(time);
        let pose = run_frame(&mut graph, &bones, 1.0 / 60.0).unwrap();
        assert_eq!(pose.bones(), expected.bones());
    }
}

#[test]
fn phases_run_once_per_generation()
{
    let bones = BoneContainer::new_full(three_bone_chain());
    let nodes: Vec<Box<dyn AnimNode>> = vec![
        Box::new(TwoWayBlendNode::new("blend", PoseLink::new(1), PoseLink::new(1), 0.5)),
        Box::new(SequenceEvaluatorNode::new("leaf", None)),
    ];
    let mut graph = AnimGraph::new(nodes, 0, GraphSettings::default());
    graph.initialize(&bones).unwrap();

    for _ in 0..3
    {
        assert!(run_frame(&mut graph, &bones, 0.1).is_ok());
    }

    // the last update still holds, so the pose can be evaluated again
    assert!(graph.evaluate(&bones).is_ok());
    let generations = graph.generations();
    assert_eq!(generations.update, 3);
    assert_eq!(generations.evaluate, 4);
}
