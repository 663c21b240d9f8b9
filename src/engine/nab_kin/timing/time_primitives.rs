use std::cmp::Ordering;
use std::ops::{Add, Mul, Sub};
use std::time::Duration;
use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

macro_rules! generate_time_primitive
{
    ($name:ident, $type:ty) =>
    {
        #[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd, Encode, Decode, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $type);
        impl $name
        {
            pub const ZERO: Self = Self(0.0);

            #[inline] #[must_use]
            pub fn clamp(self, min: Self, max: Self) -> Self { Self(self.0.clamp(min.0, max.0)) }
            #[inline] #[must_use]
            pub fn abs(self) -> Self { Self(self.0.abs()) }
            #[inline] #[must_use]
            pub fn is_nearly_zero(self) -> bool { self.0.abs() <= 1.0e-8 }
        }
        impl Ord for $name
        {
            fn cmp(&self, other: &Self) -> Ordering
            {
                self.0.total_cmp(&other.0)
            }
        }
        impl Eq for $name { }
        impl Add for $name
        {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output { Self(self.0 + rhs.0) }
        }
        impl Sub for $name
        {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output { Self(self.0 - rhs.0) }
        }
        impl Mul for $name
        {
            type Output = Self;
            fn mul(self, rhs: Self) -> Self::Output { Self(self.0 * rhs.0) }
        }
        impl Mul<$type> for $name
        {
            type Output = Self;
            fn mul(self, rhs: $type) -> Self::Output { Self(self.0 * rhs) }
        }
    };
}

generate_time_primitive!(FSeconds, f32);

impl From<FSeconds> for Duration { fn from(sec: FSeconds) -> Self { Self::from_secs_f32(sec.0) } }
impl From<Duration> for FSeconds { fn from(d: Duration) -> Self { Self(d.as_secs_f32()) } }

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn conversions()
    {
        assert_eq!(Duration::from(FSeconds(2.0)), Duration::from_secs(2));
        assert_eq!(FSeconds::from(Duration::from_millis(250)), FSeconds(0.25));
    }

    #[test]
    fn clamping()
    {
        assert_eq!(FSeconds(-1.0).clamp(FSeconds::ZERO, FSeconds(2.0)), FSeconds::ZERO);
        assert_eq!(FSeconds(3.0).clamp(FSeconds::ZERO, FSeconds(2.0)), FSeconds(2.0));
        assert!(FSeconds(1.0e-9).is_nearly_zero());
        assert!(!FSeconds(0.016).is_nearly_zero());
    }

    #[test]
    fn ordering()
    {
        let mut times = vec![FSeconds(2.0), FSeconds(0.5), FSeconds(1.0)];
        times.sort();
        assert_eq!(times, vec![FSeconds(0.5), FSeconds(1.0), FSeconds(2.0)]);
    }
}
