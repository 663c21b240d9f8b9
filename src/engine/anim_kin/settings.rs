use serde::{Deserialize, Serialize};

/// Runtime checks and limits for graph traversals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings
{
    /// Enforce phase ordering (initialize, cache bones, update, evaluate) on every pose link
    pub traversal_checks: bool,
    /// Reject poses containing NaNs or unnormalized rotations after each link evaluates
    pub validate_output: bool,
    /// Deepest chain of links a single traversal may follow
    pub max_traversal_depth: usize,
}
impl Default for GraphSettings
{
    fn default() -> Self
    {
        Self
        {
            traversal_checks: true,
            validate_output: cfg!(debug_assertions),
            max_traversal_depth: 64,
        }
    }
}
impl GraphSettings
{
    pub fn from_toml_str(toml: &str) -> Result<Self, toml::de::Error>
    {
        toml::from_str(toml)
    }
}
