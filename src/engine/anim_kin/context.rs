use std::cell::{RefCell, RefMut};
use nab_kin::timing::FSeconds;
use crate::{AnimNode, BoneContainer, CompactPose, CsPose, GraphError, GraphGenerations, GraphPhase, GraphSettings, NodeId, PoseError, SyncGroups, TickRecord, TraversalStack};

pub type NodeTable = [RefCell<Box<dyn AnimNode>>];

/// Everything a traversal needs to know about the graph it is walking
#[derive(Clone, Copy)]
pub struct GraphContext<'g>
{
    nodes: &'g NodeTable,
    bone_container: &'g BoneContainer,
    generations: GraphGenerations,
    traversal: &'g TraversalStack,
    settings: &'g GraphSettings,
}
pub type InitializeContext<'g> = GraphContext<'g>;
pub type CacheBonesContext<'g> = GraphContext<'g>;

impl<'g> GraphContext<'g>
{
    #[must_use]
    pub fn new(
        nodes: &'g NodeTable,
        bone_container: &'g BoneContainer,
        generations: GraphGenerations,
        traversal: &'g TraversalStack,
        settings: &'g GraphSettings) -> Self
    {
        Self { nodes, bone_container, generations, traversal, settings }
    }

    #[inline] #[must_use] pub fn bone_container(&self) -> &'g BoneContainer { self.bone_container }
    #[inline] #[must_use] pub fn generations(&self) -> GraphGenerations { self.generations }
    #[inline] #[must_use] pub fn settings(&self) -> &'g GraphSettings { self.settings }
    #[inline] #[must_use] pub fn num_nodes(&self) -> usize { self.nodes.len() }
    #[inline] #[must_use] pub(crate) fn traversal(&self) -> &'g TraversalStack { self.traversal }

    pub(crate) fn borrow_node_mut(&self, node: NodeId, phase: GraphPhase) -> Result<RefMut<'g, Box<dyn AnimNode>>, GraphError>
    {
        // the traversal stack catches cycles first, a failed borrow here means the node was reached another way
        self.nodes[node.0].try_borrow_mut().map_err(|_| GraphError::CircularLink { node, phase })
    }
}

#[derive(Clone, Copy)]
pub struct UpdateContext<'g>
{
    graph: GraphContext<'g>,
    delta_time: FSeconds,
    weight: f32,
    current_node: Option<NodeId>,
    sync_groups: &'g RefCell<SyncGroups>,
}
impl<'g> UpdateContext<'g>
{
    #[must_use]
    pub fn new(graph: GraphContext<'g>, delta_time: FSeconds, sync_groups: &'g RefCell<SyncGroups>) -> Self
    {
        Self
        {
            graph,
            delta_time,
            weight: 1.0,
            current_node: None,
            sync_groups,
        }
    }

    #[inline] #[must_use] pub fn graph(&self) -> &GraphContext<'g> { &self.graph }
    #[inline] #[must_use] pub fn delta_time(&self) -> FSeconds { self.delta_time }
    #[inline] #[must_use] pub fn final_blend_weight(&self) -> f32 { self.weight }
    #[inline] #[must_use] pub fn current_node(&self) -> Option<NodeId> { self.current_node }

    // A context for a child branch contributing `multiplier` of this branch's weight
    #[must_use]
    pub fn fractional_weight(&self, multiplier: f32) -> Self
    {
        Self
        {
            weight: self.weight * multiplier,
            ..*self
        }
    }

    #[must_use]
    pub(crate) fn with_node(&self, node: NodeId) -> Self
    {
        Self
        {
            current_node: Some(node),
            ..*self
        }
    }

    pub fn create_tick_record(&self, group_index: usize, record: TickRecord)
    {
        self.sync_groups.borrow_mut().add(group_index, record);
    }
}
/// A local-space pose being produced by an evaluation
pub struct PoseContext<'g>
{
    graph: GraphContext<'g>,
    pub pose: CompactPose<'g>,
}
impl<'g> PoseContext<'g>
{
    // The pose starts bound to the graph's bones, with undefined (identity) transforms
    pub fn new(graph: GraphContext<'g>) -> Result<Self, PoseError>
    {
        Ok(Self
        {
            pose: CompactPose::new(graph.bone_container)?,
            graph,
        })
    }

    // A scratch context for evaluating a child branch
    pub fn child(&self) -> Result<Self, PoseError>
    {
        Self::new(self.graph)
    }

    #[inline] #[must_use] pub fn graph(&self) -> &GraphContext<'g> { &self.graph }

    pub fn reset_to_ref_pose(&mut self) -> Result<(), PoseError>
    {
        self.pose.reset_to_ref_pose_from(self.graph.bone_container)
    }

    #[must_use] pub fn contains_nan(&self) -> bool { self.pose.contains_nan() }
    #[must_use] pub fn is_normalized(&self) -> bool { self.pose.is_normalized() }
}

/// A pose being adjusted in component space, e.g. by procedural controllers
pub struct ComponentSpacePoseContext<'g>
{
    graph: GraphContext<'g>,
    pub pose: CsPose<'g>,
}
impl<'g> ComponentSpacePoseContext<'g>
{
    pub fn new(graph: GraphContext<'g>) -> Result<Self, PoseError>
    {
        Ok(Self
        {
            pose: CsPose::new(graph.bone_container)?,
            graph,
        })
    }

    pub fn from_local(local: PoseContext<'g>) -> Result<Self, PoseError>
    {
        Ok(Self
        {
            pose: CsPose::from_pose(local.pose)?,
            graph: local.graph,
        })
    }

    #[inline] #[must_use] pub fn graph(&self) -> &GraphContext<'g> { &self.graph }

    pub fn reset_to_ref_pose(&mut self) -> Result<(), PoseError>
    {
        self.pose.init_pose(self.graph.bone_container)
    }

    #[must_use] pub fn contains_nan(&self) -> bool { self.pose.contains_nan() }
    #[must_use] pub fn is_normalized(&self) -> bool { self.pose.is_normalized() }
}
