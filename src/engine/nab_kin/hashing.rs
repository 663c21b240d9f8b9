use std::hash::Hasher;
use metrohash::MetroHash64;

// Stable 64-bit hash of a name, used for asset/skeleton identities
#[must_use]
pub fn hash_name(name: &str) -> u64
{
    let mut hasher = MetroHash64::default();
    hasher.write(name.as_bytes());
    hasher.finish()
}
