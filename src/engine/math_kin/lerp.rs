#[inline] #[must_use]
pub fn lerp(from: f32, to: f32, rel: f32) -> f32
{
    ((1.0 - rel) * from) + (rel * to)
}

#[inline] #[must_use]
pub fn inv_lerp(from: f32, to: f32, value: f32) -> f32
{
    (value - from) / (to - from)
}
