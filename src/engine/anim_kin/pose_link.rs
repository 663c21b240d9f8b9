use crate::{CacheBonesContext, GraphContext, GraphError, GraphPhase, InitializeContext, NodeDebugData, NodeId, PoseContext, PoseFault, TraversalCounter, UpdateContext};

/// An edge from a node to one of its inputs. The serialized link id is resolved to a node on first use
/// and stays bound until the link is reset.
#[derive(Debug, Clone, Default)]
pub struct PoseLink
{
    link_id: Option<usize>,
    linked_node: Option<NodeId>,

    initialize_counter: TraversalCounter,
    cache_bones_counter: TraversalCounter,
    update_counter: TraversalCounter,
    evaluate_counter: TraversalCounter,
}
impl PoseLink
{
    #[must_use]
    pub fn new(link_id: usize) -> Self
    {
        Self
        {
            link_id: Some(link_id),
            ..Default::default()
        }
    }

    // Always evaluates to the reference pose
    #[must_use]
    pub fn unlinked() -> Self { Self::default() }

    #[inline] #[must_use] pub fn link_id(&self) -> Option<usize> { self.link_id }
    #[inline] #[must_use] pub fn linked_node(&self) -> Option<NodeId> { self.linked_node }

    pub fn reset(&mut self)
    {
        self.linked_node = None;
        self.initialize_counter.reset();
        self.cache_bones_counter.reset();
        self.update_counter.reset();
        self.evaluate_counter.reset();
    }

    pub fn attempt_relink(&mut self, context: &GraphContext)
    {
        if self.linked_node.is_some()
        {
            return;
        }
        let Some(link_id) = self.link_id else { return; };

        match link_id < context.num_nodes()
        {
            true => self.linked_node = Some(NodeId(link_id)),
            false => log::warn!("Pose link {link_id} is out of range of the node table ({} nodes), it will output the reference pose", context.num_nodes()),
        }
    }

    fn require(&self, context: &GraphContext, counter: TraversalCounter, phase: GraphPhase, missing: GraphPhase) -> Result<(), GraphError>
    {
        match !context.settings().traversal_checks || counter.is_synchronized_with(context.generations().get(missing))
        {
            true => Ok(()),
            false => Err(GraphError::PhaseOrder { node: self.linked_node, phase, missing }),
        }
    }

    fn run_once(&mut self, context: &GraphContext, phase: GraphPhase) -> Result<(), GraphError>
    {
        let generation = context.generations().get(phase);
        let counter = match phase
        {
            GraphPhase::Update => &mut self.update_counter,
            _ => &mut self.evaluate_counter,
        };
        if context.settings().traversal_checks && counter.is_synchronized_with(generation)
        {
            return Err(GraphError::AlreadyRun { node: self.linked_node, phase });
        }
        counter.synchronize_with(generation);
        Ok(())
    }

    pub fn initialize(&mut self, context: &InitializeContext) -> Result<(), GraphError>
    {
        self.attempt_relink(context);
        self.initialize_counter.synchronize_with(context.generations().initialize);

        let Some(node) = self.linked_node else { return Ok(()); };
        let _guard = context.traversal().enter(node, GraphPhase::Initialize)?;
        context.borrow_node_mut(node, GraphPhase::Initialize)?.initialize(context)
    }

    pub fn cache_bones(&mut self, context: &CacheBonesContext) -> Result<(), GraphError>
    {
        self.require(context, self.initialize_counter, GraphPhase::CacheBones, GraphPhase::Initialize)?;
        self.cache_bones_counter.synchronize_with(context.generations().cache_bones);

        let Some(node) = self.linked_node else { return Ok(()); };
        let _guard = context.traversal().enter(node, GraphPhase::CacheBones)?;
        context.borrow_node_mut(node, GraphPhase::CacheBones)?.cache_bones(context)
    }

    pub fn update(&mut self, context: &UpdateContext) -> Result<(), GraphError>
    {
        let graph = context.graph();
        self.require(graph, self.initialize_counter, GraphPhase::Update, GraphPhase::Initialize)?;
        self.require(graph, self.cache_bones_counter, GraphPhase::Update, GraphPhase::CacheBones)?;
        self.run_once(graph, GraphPhase::Update)?;

        let Some(node) = self.linked_node else { return Ok(()); };
        let _guard = graph.traversal().enter(node, GraphPhase::Update)?;
        graph.borrow_node_mut(node, GraphPhase::Update)?.update(&context.with_node(node))
    }

    pub fn evaluate(&mut self, output: &mut PoseContext) -> Result<(), GraphError>
    {
        let graph = *output.graph();
        self.require(&graph, self.initialize_counter, GraphPhase::Evaluate, GraphPhase::Initialize)?;
        self.require(&graph, self.cache_bones_counter, GraphPhase::Evaluate, GraphPhase::CacheBones)?;
        self.require(&graph, self.update_counter, GraphPhase::Evaluate, GraphPhase::Update)?;
        self.run_once(&graph, GraphPhase::Evaluate)?;

        match self.linked_node
        {
            Some(node) =>
            {
                let _guard = graph.traversal().enter(node, GraphPhase::Evaluate)?;
                graph.borrow_node_mut(node, GraphPhase::Evaluate)?.evaluate(output)?;
            },
            None => output.reset_to_ref_pose()?,
        }

        if graph.settings().validate_output
        {
            if output.contains_nan()
            {
                return Err(GraphError::InvalidOutput { node: self.linked_node, fault: PoseFault::ContainsNaN });
            }
            if !output.is_normalized()
            {
                return Err(GraphError::InvalidOutput { node: self.linked_node, fault: PoseFault::NotNormalized });
            }
        }
        Ok(())
    }

    pub fn gather_debug_data(&self, debug_data: &mut NodeDebugData)
    {
        let Some(node) = self.linked_node else { return; };

        let traversal = debug_data.traversal();
        let Ok(_guard) = traversal.enter(node, GraphPhase::GatherDebugData) else
        {
            debug_data.add_debug_item(format!("{node} (circular link)"), false);
            return;
        };
        let Some(linked) = debug_data.borrow_node(node) else { return; };
        linked.gather_debug_data(debug_data);
    }
}
