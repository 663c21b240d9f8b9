mod sequence_evaluator;
pub use sequence_evaluator::*;

mod two_way_blend;
pub use two_way_blend::*;
