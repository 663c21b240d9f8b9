use std::cell::{Ref, RefCell};
use std::sync::Arc;
use math_kin::Transform;
use nab_kin::timing::FSeconds;
use crate::{AnimNode, AnimationAsset, BoneContainer, CompactPose, ComponentSpacePoseContext, GraphContext, GraphError, GraphGenerations, GraphPhase, GraphSettings, NodeDebugData, NodeId, NodeTable, PoseContext, PoseLink, SyncGroups, TraversalStack, UpdateContext};

/// A graph of animation nodes for one animated instance, driven from its root pose link.
/// Each phase is a complete depth-first traversal; generations advance once per phase call.
pub struct AnimGraph
{
    nodes: Box<NodeTable>,
    root: PoseLink,
    generations: GraphGenerations,
    settings: GraphSettings,
    traversal: TraversalStack,
    sync_groups: RefCell<SyncGroups>,
}
impl AnimGraph
{
    // `root_link_id` indexes into `nodes`, as do the link ids of every node's pose links
    #[must_use]
    pub fn new(nodes: Vec<Box<dyn AnimNode>>, root_link_id: usize, settings: GraphSettings) -> Self
    {
        Self
        {
            nodes: nodes.into_iter().map(RefCell::new).collect(),
            root: PoseLink::new(root_link_id),
            generations: GraphGenerations::default(),
            traversal: TraversalStack::new(settings.max_traversal_depth),
            settings,
            sync_groups: RefCell::new(SyncGroups::default()),
        }
    }

    #[inline] #[must_use] pub fn settings(&self) -> &GraphSettings { &self.settings }
    #[inline] #[must_use] pub fn generations(&self) -> GraphGenerations { self.generations }
    #[inline] #[must_use] pub fn num_nodes(&self) -> usize { self.nodes.len() }
    #[inline] #[must_use] pub fn root(&self) -> &PoseLink { &self.root }

    #[must_use]
    pub fn node(&self, node: NodeId) -> Option<Ref<'_, Box<dyn AnimNode>>>
    {
        self.nodes.get(node.0).and_then(|n| n.try_borrow().ok())
    }
    #[must_use]
    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut dyn AnimNode>
    {
        let cell = self.nodes.get_mut(node.0)?;
        Some(cell.get_mut().as_mut())
    }
    #[must_use]
    pub fn node_as_mut<T: AnimNode + 'static>(&mut self, node: NodeId) -> Option<&mut T>
    {
        let node: &mut dyn AnimNode = self.node_mut(node)?;
        node.as_any_mut().downcast_mut::<T>()
    }

    pub fn initialize(&mut self, bone_container: &BoneContainer) -> Result<(), GraphError>
    {
        puffin::profile_function!();

        self.generations.advance(GraphPhase::Initialize);
        log::debug!("Initializing animation graph with {} nodes ({} bones)", self.nodes.len(), bone_container.num_bones());

        let context = GraphContext::new(&self.nodes, bone_container, self.generations, &self.traversal, &self.settings);
        self.root.initialize(&context)
    }

    pub fn cache_bones(&mut self, bone_container: &BoneContainer) -> Result<(), GraphError>
    {
        puffin::profile_function!();

        self.generations.advance(GraphPhase::CacheBones);
        let context = GraphContext::new(&self.nodes, bone_container, self.generations, &self.traversal, &self.settings);
        self.root.cache_bones(&context)
    }

    /// Advance every relevant node by `delta_time`, then tick sync groups
    pub fn update(&mut self, bone_container: &BoneContainer, delta_time: FSeconds) -> Result<(), GraphError>
    {
        puffin::profile_function!();

        self.generations.advance(GraphPhase::Update);
        self.sync_groups.get_mut().clear();

        {
            let graph = GraphContext::new(&self.nodes, bone_container, self.generations, &self.traversal, &self.settings);
            let context = UpdateContext::new(graph, delta_time, &self.sync_groups);
            self.root.update(&context)?;
        }

        for (node, time) in self.sync_groups.get_mut().tick(delta_time)
        {
            if let Some(node) = self.nodes.get_mut(node.0)
            {
                node.get_mut().set_accumulated_time(time);
            }
        }
        Ok(())
    }

    /// Produce the local-space pose of the graph
    pub fn evaluate<'b>(&mut self, bone_container: &'b BoneContainer) -> Result<CompactPose<'b>, GraphError>
    {
        puffin::profile_function!();

        self.generations.advance(GraphPhase::Evaluate);
        let transforms =
        {
            let context = GraphContext::new(&self.nodes, bone_container, self.generations, &self.traversal, &self.settings);
            let mut output = PoseContext::new(context)?;
            self.root.evaluate(&mut output)?;
            output.pose.move_bones_to()
        };

        let mut pose = CompactPose::new(bone_container)?;
        pose.move_bones_from_vec(transforms)?;
        Ok(pose)
    }

    /// Evaluate and convert to component space, one transform per bone, e.g. for skinning
    pub fn evaluate_component_space(&mut self, bone_container: &BoneContainer) -> Result<Vec<Transform>, GraphError>
    {
        puffin::profile_function!();

        self.generations.advance(GraphPhase::Evaluate);
        let context = GraphContext::new(&self.nodes, bone_container, self.generations, &self.traversal, &self.settings);
        let mut output = PoseContext::new(context)?;
        self.root.evaluate(&mut output)?;

        let mut component_space = ComponentSpacePoseContext::from_local(output)?;
        Ok(component_space.pose.component_space_transforms())
    }

    // Unbind every link, so the next initialize relinks the graph from scratch
    pub fn reset(&mut self)
    {
        self.root.reset();
        for node in self.nodes.iter_mut()
        {
            node.get_mut().visit_pose_links(&mut PoseLink::reset);
        }
        self.sync_groups.get_mut().clear();
    }

    #[must_use]
    pub fn gather_debug_data(&self) -> NodeDebugData<'_>
    {
        let mut debug_data = NodeDebugData::new(&self.nodes, &self.traversal, 1.0, String::new());
        self.root.gather_debug_data(&mut debug_data);
        debug_data
    }

    pub fn override_asset(&mut self, node: NodeId, asset: Arc<dyn AnimationAsset>)
    {
        match self.node_mut(node)
        {
            Some(node) => node.override_asset(asset),
            None => log::warn!("Cannot override the asset of {node}, it is not in the graph"),
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::sync::Arc;
    use approx::assert_abs_diff_eq;
    use glam::{Quat, Vec3};
    use crate::{AnimInterpolation, AnimSequence, BoneTrack, CompactBoneIndex, PoseFault, ReferenceSkeleton, SequenceEvaluatorNode, SkeletonBone, SkeletonId, TwoWayBlendNode};
    use super::*;

    fn two_bone_container() -> BoneContainer
    {
        let skeleton = ReferenceSkeleton::new("arm", vec![
            SkeletonBone { name: "root".into(), parent: None, ref_pose: Transform::IDENTITY },
            SkeletonBone { name: "hand".into(), parent: Some(0), ref_pose: Transform::from_position(Vec3::new(0.0, 1.0, 0.0)) },
        ]).unwrap();
        BoneContainer::new_full(Arc::new(skeleton))
    }

    // moves the hand from x=0 to x=2 over one second
    fn slide(skeleton: SkeletonId) -> Arc<AnimSequence>
    {
        let track = BoneTrack
        {
            skeleton_bone: 1,
            translations: Box::new([Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, 1.0, 0.0)]),
            rotations: Box::new([]),
            scales: Box::new([]),
        };
        Arc::new(AnimSequence::new("slide", skeleton, FSeconds(1.0), 2, AnimInterpolation::Linear, vec![track]).unwrap())
    }

    fn run_frame<'b>(graph: &mut AnimGraph, bones: &'b BoneContainer, delta_time: f32) -> Result<CompactPose<'b>, GraphError>
    {
        graph.cache_bones(bones)?;
        graph.update(bones, FSeconds(delta_time))?;
        graph.evaluate(bones)
    }

    fn set_explicit_time(graph: &mut AnimGraph, node: NodeId, time: f32)
    {
        graph.node_as_mut::<SequenceEvaluatorNode>(node).unwrap().explicit_time = FSeconds(time);
    }

    const HAND: CompactBoneIndex = CompactBoneIndex::new(1);

    #[test]
    fn evaluates_sequence()
    {
        let bones = two_bone_container();
        let mut evaluator = SequenceEvaluatorNode::new("eval", Some(slide(bones.skeleton_id())));
        evaluator.explicit_time = FSeconds(0.5);

        let mut graph = AnimGraph::new(vec![Box::new(evaluator)], 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        let pose = run_frame(&mut graph, &bones, 1.0 / 30.0).unwrap();

        assert_abs_diff_eq!(pose[HAND].position, Vec3::new(1.0, 1.0, 0.0), epsilon = 1e-6);
        assert_eq!(graph.node(NodeId(0)).unwrap().accumulated_time(), Some(FSeconds(0.5)));
    }

    #[test]
    fn explicit_time_is_clamped()
    {
        let bones = two_bone_container();
        let mut graph = AnimGraph::new(vec![Box::new(SequenceEvaluatorNode::new("eval", Some(slide(bones.skeleton_id()))))], 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();

        set_explicit_time(&mut graph, NodeId(0), 7.0);
        let pose = run_frame(&mut graph, &bones, 0.1).unwrap();
        assert_abs_diff_eq!(pose[HAND].position, Vec3::new(2.0, 1.0, 0.0), epsilon = 1e-6);
        assert_eq!(graph.node_as_mut::<SequenceEvaluatorNode>(NodeId(0)).unwrap().explicit_time, FSeconds(1.0));
        assert!(graph.node_as_mut::<TwoWayBlendNode>(NodeId(0)).is_none());
    }

    #[test]
    fn incompatible_skeleton_uses_ref_pose()
    {
        let bones = two_bone_container();
        let mut evaluator = SequenceEvaluatorNode::new("eval", Some(slide(SkeletonId::from_name("other"))));
        evaluator.explicit_time = FSeconds(0.5);

        let mut graph = AnimGraph::new(vec![Box::new(evaluator)], 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        let pose = run_frame(&mut graph, &bones, 0.1).unwrap();
        assert_eq!(pose.bones(), bones.ref_pose());
    }

    #[test]
    fn bad_link_falls_back_to_ref_pose()
    {
        let bones = two_bone_container();
        let mut graph = AnimGraph::new(vec![], 3, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        assert_eq!(graph.root().linked_node(), None);

        let pose = run_frame(&mut graph, &bones, 0.1).unwrap();
        assert_eq!(pose.bones(), bones.ref_pose());
    }

    #[test]
    fn phase_order()
    {
        let bones = two_bone_container();
        let mut graph = AnimGraph::new(vec![Box::new(SequenceEvaluatorNode::new("eval", None))], 0, GraphSettings::default());

        assert_eq!(
            graph.cache_bones(&bones),
            Err(GraphError::PhaseOrder { node: None, phase: GraphPhase::CacheBones, missing: GraphPhase::Initialize }));

        graph.initialize(&bones).unwrap();
        assert_eq!(
            graph.update(&bones, FSeconds(0.1)),
            Err(GraphError::PhaseOrder { node: Some(NodeId(0)), phase: GraphPhase::Update, missing: GraphPhase::CacheBones }));

        graph.cache_bones(&bones).unwrap();
        assert_eq!(
            graph.evaluate(&bones).err(),
            Some(GraphError::PhaseOrder { node: Some(NodeId(0)), phase: GraphPhase::Evaluate, missing: GraphPhase::Update }));

        // no checks, no errors
        let mut unchecked = AnimGraph::new(vec![], 0, GraphSettings { traversal_checks: false, ..Default::default() });
        assert!(unchecked.evaluate(&bones).is_ok());
    }

    #[test]
    fn shared_node_evaluates_through_each_link()
    {
        let bones = two_bone_container();
        let nodes: Vec<Box<dyn AnimNode>> = vec![
            Box::new(TwoWayBlendNode::new("blend", PoseLink::new(1), PoseLink::new(1), 0.5)),
            Box::new(SequenceEvaluatorNode::new("eval", Some(slide(bones.skeleton_id())))),
        ];
        let mut graph = AnimGraph::new(nodes, 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        assert!(run_frame(&mut graph, &bones, 0.1).is_ok());
    }

    #[test]
    fn blends_between_inputs()
    {
        let bones = two_bone_container();
        let mut start = SequenceEvaluatorNode::new("start", Some(slide(bones.skeleton_id())));
        start.explicit_time = FSeconds(0.0);
        let mut end = SequenceEvaluatorNode::new("end", Some(slide(bones.skeleton_id())));
        end.explicit_time = FSeconds(1.0);

        let nodes: Vec<Box<dyn AnimNode>> = vec![
            Box::new(TwoWayBlendNode::new("blend", PoseLink::new(1), PoseLink::new(2), 0.25)),
            Box::new(start),
            Box::new(end),
        ];
        let mut graph = AnimGraph::new(nodes, 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();

        let pose = run_frame(&mut graph, &bones, 0.1).unwrap();
        assert_abs_diff_eq!(pose[HAND].position, Vec3::new(0.5, 1.0, 0.0), epsilon = 1e-6);

        let debug = graph.gather_debug_data();
        let lines: Vec<_> = debug.flattened().into_iter().map(|f| f.debug_line).collect();
        assert_eq!(lines, vec![
            "blend<W:100.0%>(Alpha: 25.0%)".to_string(),
            "start<W:75.0%>('slide' Play Time: 0.000)".to_string(),
            "end<W:25.0%>('slide' Play Time: 1.000)".to_string(),
        ]);
    }

    #[test]
    fn sync_group_follows_leader()
    {
        let bones = two_bone_container();
        let mut leader = SequenceEvaluatorNode::new("leader", Some(slide(bones.skeleton_id()))).with_sync_group(0, true);
        leader.explicit_time = FSeconds(0.4);
        let follower = SequenceEvaluatorNode::new("follower", Some(slide(bones.skeleton_id()))).with_sync_group(0, true);

        let nodes: Vec<Box<dyn AnimNode>> = vec![
            Box::new(TwoWayBlendNode::new("blend", PoseLink::new(1), PoseLink::new(2), 0.25)),
            Box::new(leader),
            Box::new(follower),
        ];
        let mut graph = AnimGraph::new(nodes, 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        run_frame(&mut graph, &bones, 0.1).unwrap();

        // the heavier leader jumps straight to its explicit time, the follower matches its phase
        let leader_time = graph.node(NodeId(1)).unwrap().accumulated_time().unwrap();
        let follower_time = graph.node(NodeId(2)).unwrap().accumulated_time().unwrap();
        assert_abs_diff_eq!(leader_time.0, 0.4, epsilon = 1e-5);
        assert_abs_diff_eq!(follower_time.0, 0.4, epsilon = 1e-5);
    }

    #[test]
    fn looping_jump_wraps()
    {
        let bones = two_bone_container();
        let mut evaluator = SequenceEvaluatorNode::new("eval", Some(slide(bones.skeleton_id()))).with_sync_group(0, true);
        evaluator.explicit_time = FSeconds(0.9);

        let mut graph = AnimGraph::new(vec![Box::new(evaluator)], 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        run_frame(&mut graph, &bones, 0.1).unwrap();
        assert_abs_diff_eq!(graph.node(NodeId(0)).unwrap().accumulated_time().unwrap().0, 0.9, epsilon = 1e-5);

        // 0.9 -> 0.1 is a short step forward across the loop, not a long step back
        set_explicit_time(&mut graph, NodeId(0), 0.1);
        run_frame(&mut graph, &bones, 0.1).unwrap();
        assert_abs_diff_eq!(graph.node(NodeId(0)).unwrap().accumulated_time().unwrap().0, 0.1, epsilon = 1e-5);
    }

    #[test]
    fn override_asset()
    {
        let bones = two_bone_container();
        let mut graph = AnimGraph::new(vec![Box::new(SequenceEvaluatorNode::new("eval", None))], 0, GraphSettings::default());
        assert!(graph.node(NodeId(0)).unwrap().anim_asset().is_none());

        graph.override_asset(NodeId(0), slide(bones.skeleton_id()));
        assert_eq!(graph.node(NodeId(0)).unwrap().anim_asset().unwrap().asset_name(), "slide");
        graph.override_asset(NodeId(4), slide(bones.skeleton_id()));
    }

    #[test]
    fn reset_relinks()
    {
        let bones = two_bone_container();
        let nodes: Vec<Box<dyn AnimNode>> = vec![
            Box::new(TwoWayBlendNode::new("blend", PoseLink::new(1), PoseLink::unlinked(), 0.0)),
            Box::new(SequenceEvaluatorNode::new("eval", None)),
        ];
        let mut graph = AnimGraph::new(nodes, 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        assert_eq!(graph.root().linked_node(), Some(NodeId(0)));

        graph.reset();
        assert_eq!(graph.root().linked_node(), None);
        assert_eq!(
            graph.cache_bones(&bones),
            Err(GraphError::PhaseOrder { node: None, phase: GraphPhase::CacheBones, missing: GraphPhase::Initialize }));

        graph.initialize(&bones).unwrap();
        assert!(run_frame(&mut graph, &bones, 0.1).is_ok());
    }

    #[test]
    fn component_space_output()
    {
        let bones = two_bone_container();
        let mut graph = AnimGraph::new(vec![], 0, GraphSettings::default());
        graph.initialize(&bones).unwrap();
        graph.cache_bones(&bones).unwrap();
        graph.update(&bones, FSeconds(0.1)).unwrap();

        let transforms = graph.evaluate_component_space(&bones).unwrap();
        assert_eq!(transforms.len(), 2);
        assert_abs_diff_eq!(transforms[1].position, Vec3::new(0.0, 1.0, 0.0));
    }

    #[derive(Debug)]
    struct NanNode;
    impl AnimNode for NanNode
    {
        fn name(&self) -> &str { "nan" }
        fn initialize(&mut self, _context: &GraphContext) -> Result<(), GraphError> { Ok(()) }
        fn cache_bones(&mut self, _context: &GraphContext) -> Result<(), GraphError> { Ok(()) }
        fn update(&mut self, _context: &UpdateContext) -> Result<(), GraphError> { Ok(()) }
        fn evaluate(&mut self, output: &mut PoseContext) -> Result<(), GraphError>
        {
            output.reset_to_ref_pose()?;
            output.pose[HAND].rotation = Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0);
            Ok(())
        }
        fn gather_debug_data(&self, _debug_data: &mut NodeDebugData) { }
    }

    #[test]
    fn invalid_output()
    {
        let bones = two_bone_container();
        let mut graph = AnimGraph::new(vec![Box::new(NanNode)], 0, GraphSettings { validate_output: true, ..Default::default() });
        graph.initialize(&bones).unwrap();
        assert_eq!(
            run_frame(&mut graph, &bones, 0.1).err(),
            Some(GraphError::InvalidOutput { node: Some(NodeId(0)), fault: PoseFault::ContainsNaN }));
    }
}
