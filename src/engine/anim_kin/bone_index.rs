use std::fmt::{Debug, Display, Formatter};
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Index into the pruned (LOD-filtered) bone set of a [`crate::BoneContainer`].
/// Distinct from the skeleton's full bone index. Parents always precede children.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Encode, Decode, Serialize, Deserialize)]
pub struct CompactBoneIndex(usize);
impl CompactBoneIndex
{
    pub const ROOT: Self = Self(0);

    #[inline] #[must_use] pub const fn new(index: usize) -> Self { Self(index) }
    #[inline] #[must_use] pub const fn get(self) -> usize { self.0 }
    #[inline] #[must_use] pub const fn is_root(self) -> bool { self.0 == 0 }
}
impl Debug for CompactBoneIndex
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        f.write_fmt(format_args!("[Bone|{}]", self.0))
    }
}
impl Display for CompactBoneIndex
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Display::fmt(&self.0, f) }
}
impl From<CompactBoneIndex> for usize
{
    fn from(index: CompactBoneIndex) -> Self { index.0 }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn root()
    {
        assert!(CompactBoneIndex::ROOT.is_root());
        assert!(!CompactBoneIndex::new(3).is_root());
        assert!(CompactBoneIndex::new(1) < CompactBoneIndex::new(2));
        assert_eq!(format!("{:?}", CompactBoneIndex::new(4)), "[Bone|4]");
    }
}
