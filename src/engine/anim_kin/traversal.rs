use std::cell::RefCell;
use std::fmt::{Debug, Display, Formatter};
use smallvec::SmallVec;
use crate::GraphError;

/// Index of a node in a graph's node table
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);
impl Debug for NodeId
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        f.write_fmt(format_args!("[Node|{}]", self.0))
    }
}
impl Display for NodeId
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphPhase
{
    Initialize,
    CacheBones,
    Update,
    Evaluate,
    GatherDebugData,
}

/// The generation of each phase, advanced by the graph once per traversal.
/// Generation 0 is never handed out, so a fresh counter is never synchronized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphGenerations
{
    pub initialize: u16,
    pub cache_bones: u16,
    pub update: u16,
    pub evaluate: u16,
}
impl GraphGenerations
{
    #[must_use]
    pub fn get(&self, phase: GraphPhase) -> u16
    {
        match phase
        {
            GraphPhase::Initialize => self.initialize,
            GraphPhase::CacheBones => self.cache_bones,
            GraphPhase::Update => self.update,
            GraphPhase::Evaluate => self.evaluate,
            GraphPhase::GatherDebugData => 0,
        }
    }

    pub fn advance(&mut self, phase: GraphPhase)
    {
        let generation = match phase
        {
            GraphPhase::Initialize => &mut self.initialize,
            GraphPhase::CacheBones => &mut self.cache_bones,
            GraphPhase::Update => &mut self.update,
            GraphPhase::Evaluate => &mut self.evaluate,
            GraphPhase::GatherDebugData => return,
        };
        *generation = generation.wrapping_add(1).max(1);
    }
}

/// The last generation a pose link ran a phase in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalCounter(u16);
impl TraversalCounter
{
    #[inline] #[must_use]
    pub fn is_synchronized_with(self, generation: u16) -> bool { self.0 != 0 && self.0 == generation }
    #[inline]
    pub fn synchronize_with(&mut self, generation: u16) { self.0 = generation; }
    #[inline]
    pub fn reset(&mut self) { self.0 = 0; }
}

/// The chain of (node, phase) currently being traversed, used to catch circular links
#[derive(Debug)]
pub struct TraversalStack
{
    stack: RefCell<SmallVec<[(NodeId, GraphPhase); 16]>>,
    max_depth: usize,
}
impl TraversalStack
{
    #[must_use]
    pub fn new(max_depth: usize) -> Self
    {
        Self
        {
            stack: RefCell::new(SmallVec::new()),
            max_depth,
        }
    }

    /// Push `node` for the duration of the returned guard
    pub fn enter(&self, node: NodeId, phase: GraphPhase) -> Result<TraversalGuard<'_>, GraphError>
    {
        let mut stack = self.stack.borrow_mut();
        if stack.contains(&(node, phase))
        {
            return Err(GraphError::CircularLink { node, phase });
        }
        if stack.len() >= self.max_depth
        {
            return Err(GraphError::DepthExceeded { node, max_depth: self.max_depth });
        }

        stack.push((node, phase));
        Ok(TraversalGuard { traversal: self })
    }

    #[inline] #[must_use]
    pub fn depth(&self) -> usize { self.stack.borrow().len() }
}

pub struct TraversalGuard<'t>
{
    traversal: &'t TraversalStack,
}
impl Drop for TraversalGuard<'_>
{
    fn drop(&mut self)
    {
        self.traversal.stack.borrow_mut().pop();
    }
}
