use crate::{AnimNode, CacheBonesContext, GraphError, InitializeContext, NodeDebugData, PoseContext, PoseLink, UpdateContext, ZERO_ANIM_WEIGHT_THRESHOLD};

/// Blends two inputs in local space. At alpha 0 only `a` is updated and evaluated, at 1 only `b`
#[derive(Debug)]
pub struct TwoWayBlendNode
{
    name: String,
    pub a: PoseLink,
    pub b: PoseLink,
    pub alpha: f32,

    internal_alpha: f32,
    a_relevant: bool,
    b_relevant: bool,
}
impl TwoWayBlendNode
{
    #[must_use]
    pub fn new(name: impl Into<String>, a: PoseLink, b: PoseLink, alpha: f32) -> Self
    {
        Self
        {
            name: name.into(),
            a,
            b,
            alpha,
            internal_alpha: 0.0,
            a_relevant: true,
            b_relevant: false,
        }
    }

    #[inline] #[must_use] pub fn internal_alpha(&self) -> f32 { self.internal_alpha }
}
impl AnimNode for TwoWayBlendNode
{
    fn name(&self) -> &str { &self.name }

    fn initialize(&mut self, context: &InitializeContext) -> Result<(), GraphError>
    {
        self.internal_alpha = 0.0;
        self.a.initialize(context)?;
        self.b.initialize(context)
    }

    fn cache_bones(&mut self, context: &CacheBonesContext) -> Result<(), GraphError>
    {
        self.a.cache_bones(context)?;
        self.b.cache_bones(context)
    }

    fn update(&mut self, context: &UpdateContext) -> Result<(), GraphError>
    {
        self.internal_alpha = self.alpha.clamp(0.0, 1.0);
        self.a_relevant = self.internal_alpha < 1.0 - ZERO_ANIM_WEIGHT_THRESHOLD;
        self.b_relevant = self.internal_alpha > ZERO_ANIM_WEIGHT_THRESHOLD;

        match (self.a_relevant, self.b_relevant)
        {
            (true, true) =>
            {
                self.a.update(&context.fractional_weight(1.0 - self.internal_alpha))?;
                self.b.update(&context.fractional_weight(self.internal_alpha))
            },
            (true, false) => self.a.update(context),
            _ => self.b.update(context),
        }
    }

    fn evaluate(&mut self, output: &mut PoseContext) -> Result<(), GraphError>
    {
        match (self.a_relevant, self.b_relevant)
        {
            (true, true) =>
            {
                self.a.evaluate(output)?;
                let mut b_output = output.child()?;
                self.b.evaluate(&mut b_output)?;
                output.pose.blend_with(&b_output.pose, self.internal_alpha)?;
                Ok(())
            },
            (true, false) => self.a.evaluate(output),
            _ => self.b.evaluate(output),
        }
    }

    fn gather_debug_data(&self, debug_data: &mut NodeDebugData)
    {
        let debug_line = format!("{}(Alpha: {:.1}%)", debug_data.get_node_name(self), self.internal_alpha * 100.0);
        debug_data.add_debug_item(debug_line, false);

        self.a.gather_debug_data(debug_data.branch_flow(1.0 - self.internal_alpha, ""));
        self.b.gather_debug_data(debug_data.branch_flow(self.internal_alpha, ""));
    }

    fn visit_pose_links(&mut self, visitor: &mut dyn FnMut(&mut PoseLink))
    {
        visitor(&mut self.a);
        visitor(&mut self.b);
    }
}
