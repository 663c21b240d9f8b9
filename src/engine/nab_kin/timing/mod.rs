mod time_primitives;
pub use time_primitives::*;
