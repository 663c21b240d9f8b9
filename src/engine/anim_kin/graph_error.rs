use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use crate::{GraphPhase, NodeId, PoseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseFault
{
    ContainsNaN,
    NotNormalized,
}

/// Structural problems found while traversing a graph. These abort the traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError
{
    // a link was re-entered while it was still being traversed
    CircularLink { node: NodeId, phase: GraphPhase },
    PhaseOrder { node: Option<NodeId>, phase: GraphPhase, missing: GraphPhase },
    AlreadyRun { node: Option<NodeId>, phase: GraphPhase },
    DepthExceeded { node: NodeId, max_depth: usize },
    InvalidOutput { node: Option<NodeId>, fault: PoseFault },
    Pose(PoseError),
}
impl Display for GraphError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}
impl Error for GraphError { }
impl From<PoseError> for GraphError
{
    fn from(err: PoseError) -> Self { Self::Pose(err) }
}
