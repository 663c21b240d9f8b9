use std::sync::Arc;
use math_kin::{inv_lerp, lerp};
use nab_kin::timing::FSeconds;
use smallvec::SmallVec;
use crate::{AnimationAsset, NodeId};

/// An asset player's request to be advanced as part of a sync group
#[derive(Debug, Clone)]
pub struct TickRecord
{
    pub node: NodeId,
    pub asset: Arc<dyn AnimationAsset>,
    pub looping: bool,
    pub play_rate: f32,
    pub effective_weight: f32,
    pub current_time: FSeconds,
}

// Advance `time` by `delta`, wrapping around `length` when looping and clamping otherwise
#[must_use]
pub fn advance_time(time: FSeconds, delta: FSeconds, length: FSeconds, looping: bool) -> FSeconds
{
    if length.0 <= 0.0
    {
        return FSeconds::ZERO;
    }

    let advanced = time + delta;
    match looping
    {
        true => FSeconds(advanced.0.rem_euclid(length.0)),
        false => advanced.clamp(FSeconds::ZERO, length),
    }
}

/// Tick records gathered during an update, by group index
#[derive(Debug, Default)]
pub struct SyncGroups
{
    groups: Vec<SmallVec<[TickRecord; 4]>>,
}
impl SyncGroups
{
    pub fn add(&mut self, group_index: usize, record: TickRecord)
    {
        if self.groups.len() <= group_index
        {
            self.groups.resize_with(group_index + 1, SmallVec::new);
        }
        self.groups[group_index].push(record);
    }

    #[must_use]
    pub fn records(&self, group_index: usize) -> &[TickRecord]
    {
        self.groups.get(group_index).map(|g| g.as_slice()).unwrap_or(&[])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.groups.iter().all(|g| g.is_empty()) }

    pub fn clear(&mut self)
    {
        self.groups.iter_mut().for_each(|g| g.clear());
    }

    /// Advance every group and drain the records. The highest weighted record of each group leads,
    /// advancing by its own play rate; the others follow at the same normalized position.
    #[must_use]
    pub fn tick(&mut self, delta_time: FSeconds) -> SmallVec<[(NodeId, FSeconds); 8]>
    {
        puffin::profile_function!();

        let mut new_times = SmallVec::new();
        for (group_index, group) in self.groups.iter_mut().enumerate()
        {
            let Some(leader) = group.iter()
                .reduce(|best, r| if r.effective_weight > best.effective_weight { r } else { best })
            else { continue; };

            let leader_length = leader.asset.play_length();
            let leader_time = advance_time(leader.current_time, delta_time * leader.play_rate, leader_length, leader.looping);
            let normalized = match leader_length.0 > 0.0
            {
                true => inv_lerp(0.0, leader_length.0, leader_time.0),
                false => 0.0,
            };
            log::trace!("Sync group {group_index} led by {} at {normalized:.3}", leader.node);

            let leader_node = leader.node;
            for record in group.iter()
            {
                let time = match record.node == leader_node
                {
                    true => leader_time,
                    false => FSeconds(lerp(0.0, record.asset.play_length().0, normalized)),
                };
                new_times.push((record.node, time));
            }
            group.clear();
        }
        new_times
    }
}

#[cfg(test)]
mod tests
{
    use approx::assert_relative_eq;
    use crate::{AnimInterpolation, AnimSequence, SkeletonId};
    use super::*;

    fn asset(length: f32) -> Arc<dyn AnimationAsset>
    {
        Arc::new(AnimSequence::new("clip", SkeletonId(1), FSeconds(length), 2, AnimInterpolation::Linear, vec![]).unwrap())
    }

    fn record(node: usize, length: f32, weight: f32, time: f32, play_rate: f32) -> TickRecord
    {
        TickRecord
        {
            node: NodeId(node),
            asset: asset(length),
            looping: true,
            play_rate,
            effective_weight: weight,
            current_time: FSeconds(time),
        }
    }

    #[test]
    fn advancing()
    {
        assert_relative_eq!(advance_time(FSeconds(0.8), FSeconds(0.5), FSeconds(1.0), true).0, 0.3, epsilon = 1e-6);
        assert_relative_eq!(advance_time(FSeconds(0.2), FSeconds(-0.5), FSeconds(1.0), true).0, 0.7, epsilon = 1e-6);
        assert_eq!(advance_time(FSeconds(0.8), FSeconds(0.5), FSeconds(1.0), false), FSeconds(1.0));
        assert_eq!(advance_time(FSeconds(0.8), FSeconds(0.5), FSeconds(0.0), true), FSeconds::ZERO);
    }

    #[test]
    fn leader_drives_followers()
    {
        let mut groups = SyncGroups::default();
        groups.add(1, record(0, 2.0, 0.25, 0.0, 1.0));
        groups.add(1, record(1, 1.0, 0.75, 0.25, 1.0));
        assert!(groups.records(0).is_empty());
        assert_eq!(groups.records(1).len(), 2);

        let times = groups.tick(FSeconds(0.25));
        assert!(groups.is_empty());

        let (leader, leader_time) = times[1];
        assert_eq!(leader, NodeId(1));
        assert_relative_eq!(leader_time.0, 0.5, epsilon = 1e-6);

        // half way through a 2 second clip
        let (follower, follower_time) = times[0];
        assert_eq!(follower, NodeId(0));
        assert_relative_eq!(follower_time.0, 1.0, epsilon = 1e-6);
    }
}
