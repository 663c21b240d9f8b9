use std::sync::Arc;
use nab_kin::timing::FSeconds;
use crate::{AnimNode, AnimSequence, AnimationAsset, BoneContainer, CacheBonesContext, GraphError, InitializeContext, NodeDebugData, PoseContext, TickRecord, UpdateContext};

/// Samples a sequence at an externally driven time, rather than advancing on its own
#[derive(Debug)]
pub struct SequenceEvaluatorNode
{
    name: String,
    sequence: Option<Arc<AnimSequence>>,
    pub explicit_time: FSeconds,
    pub should_loop_when_in_sync_group: bool,
    pub group_index: Option<usize>,

    internal_time_accumulator: FSeconds,
    blend_weight: f32,
}
impl SequenceEvaluatorNode
{
    #[must_use]
    pub fn new(name: impl Into<String>, sequence: Option<Arc<AnimSequence>>) -> Self
    {
        Self
        {
            name: name.into(),
            sequence,
            explicit_time: FSeconds::ZERO,
            should_loop_when_in_sync_group: true,
            group_index: None,
            internal_time_accumulator: FSeconds::ZERO,
            blend_weight: 0.0,
        }
    }

    #[must_use]
    pub fn with_sync_group(mut self, group_index: usize, should_loop: bool) -> Self
    {
        self.group_index = Some(group_index);
        self.should_loop_when_in_sync_group = should_loop;
        self
    }

    #[inline] #[must_use] pub fn sequence(&self) -> Option<&Arc<AnimSequence>> { self.sequence.as_ref() }
    #[inline] #[must_use] pub fn internal_time_accumulator(&self) -> FSeconds { self.internal_time_accumulator }
    #[inline] #[must_use] pub fn blend_weight(&self) -> f32 { self.blend_weight }

    #[inline]
    fn is_skeleton_compatible(sequence: &AnimSequence, bone_container: &BoneContainer) -> bool
    {
        sequence.skeleton() == bone_container.skeleton_id()
    }

    fn update_asset_player(&mut self, context: &UpdateContext)
    {
        let Some(sequence) = &self.sequence else { return; };

        let length = sequence.length();
        self.explicit_time = self.explicit_time.clamp(FSeconds::ZERO, length);

        let compatible = Self::is_skeleton_compatible(sequence, context.graph().bone_container());
        let (Some(group_index), true, Some(node)) = (self.group_index, compatible, context.current_node()) else
        {
            self.internal_time_accumulator = self.explicit_time;
            return;
        };

        self.internal_time_accumulator = self.internal_time_accumulator.clamp(FSeconds::ZERO, length);
        let mut time_jump = self.explicit_time - self.internal_time_accumulator;
        // keep looped playback continuous when the explicit time wraps around
        if self.should_loop_when_in_sync_group && time_jump.abs().0 > length.0 * 0.5
        {
            time_jump = match time_jump.0 > 0.0
            {
                true => time_jump - length,
                false => time_jump + length,
            };
        }

        let delta_time = context.delta_time();
        let play_rate = match delta_time.is_nearly_zero()
        {
            true => 0.0,
            false => time_jump.0 / delta_time.0,
        };

        context.create_tick_record(group_index, TickRecord
        {
            node,
            asset: sequence.clone(),
            looping: self.should_loop_when_in_sync_group,
            play_rate,
            effective_weight: self.blend_weight,
            current_time: self.internal_time_accumulator,
        });
    }
}
impl AnimNode for SequenceEvaluatorNode
{
    fn name(&self) -> &str { &self.name }

    fn initialize(&mut self, context: &InitializeContext) -> Result<(), GraphError>
    {
        if let Some(sequence) = &self.sequence
        {
            if !Self::is_skeleton_compatible(sequence, context.bone_container())
            {
                log::warn!("Sequence '{}' in {} does not match skeleton '{}', the reference pose will be used instead",
                    sequence.name(), self.name, context.bone_container().skeleton().name());
            }
        }
        Ok(())
    }

    fn cache_bones(&mut self, _context: &CacheBonesContext) -> Result<(), GraphError> { Ok(()) }

    fn update(&mut self, context: &UpdateContext) -> Result<(), GraphError>
    {
        self.blend_weight = context.final_blend_weight();
        self.update_asset_player(context);
        Ok(())
    }

    fn evaluate(&mut self, output: &mut PoseContext) -> Result<(), GraphError>
    {
        match &self.sequence
        {
            Some(sequence) if Self::is_skeleton_compatible(sequence, output.graph().bone_container()) =>
                output.pose.populate_from_animation(sequence, self.internal_time_accumulator)?,
            _ => output.reset_to_ref_pose()?,
        }
        Ok(())
    }

    fn gather_debug_data(&self, debug_data: &mut NodeDebugData)
    {
        let sequence_name = self.sequence.as_ref().map_or("None", |s| s.name());
        let debug_line = format!("{}('{}' Play Time: {:.3})", debug_data.get_node_name(self), sequence_name, self.explicit_time.0);
        debug_data.add_debug_item(debug_line, true);
    }

    fn override_asset(&mut self, asset: Arc<dyn AnimationAsset>)
    {
        match asset.into_any().downcast::<AnimSequence>()
        {
            Ok(sequence) => self.sequence = Some(sequence),
            Err(_) => log::debug!("{} can only play sequences, ignoring asset override", self.name),
        }
    }

    fn anim_asset(&self) -> Option<Arc<dyn AnimationAsset>>
    {
        self.sequence.clone().map(|s| s as Arc<dyn AnimationAsset>)
    }

    fn accumulated_time(&self) -> Option<FSeconds> { Some(self.internal_time_accumulator) }
    fn set_accumulated_time(&mut self, time: FSeconds) { self.internal_time_accumulator = time; }
}
