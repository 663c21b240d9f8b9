use std::any::Any;
use std::sync::Arc;
use nab_kin::timing::FSeconds;
use crate::{AnimationAsset, CacheBonesContext, GraphError, InitializeContext, NodeDebugData, PoseContext, PoseLink, UpdateContext};

/// A node in an animation graph. Nodes reach their inputs through [`PoseLink`]s and are driven through
/// four phases per frame: initialize (once, or after a reset), cache bones, update, then evaluate.
///
/// `evaluate` must leave a pose free of NaNs and with normalized rotations.
pub trait AnimNode: AsAnyMut
{
    fn name(&self) -> &str;

    fn initialize(&mut self, context: &InitializeContext) -> Result<(), GraphError>;
    fn cache_bones(&mut self, context: &CacheBonesContext) -> Result<(), GraphError>;
    // Advance timers and weights. No pose data is produced here
    fn update(&mut self, context: &UpdateContext) -> Result<(), GraphError>;
    fn evaluate(&mut self, output: &mut PoseContext) -> Result<(), GraphError>;

    fn gather_debug_data(&self, debug_data: &mut NodeDebugData);

    fn visit_pose_links(&mut self, _visitor: &mut dyn FnMut(&mut PoseLink)) { }

    // Replace the played asset, if this node plays assets of that type
    fn override_asset(&mut self, _asset: Arc<dyn AnimationAsset>) { }
    #[must_use]
    fn anim_asset(&self) -> Option<Arc<dyn AnimationAsset>> { None }

    // Asset players only, used by sync groups
    #[must_use]
    fn accumulated_time(&self) -> Option<FSeconds> { None }
    fn set_accumulated_time(&mut self, _time: FSeconds) { }
}

// Lets the owner of a graph reach the concrete type of a node, e.g. to drive its inputs
pub trait AsAnyMut
{
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
impl<T: Any> AsAnyMut for T
{
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
