mod bone_index;
pub use bone_index::*;

mod bone_container;
pub use bone_container::*;

mod pose;
pub use pose::*;

mod cs_pose;
pub use cs_pose::*;

mod sequence;
pub use sequence::*;

mod settings;
pub use settings::*;

mod graph_error;
pub use graph_error::*;

mod traversal;
pub use traversal::*;

mod context;
pub use context::*;

mod anim_node;
pub use anim_node::*;

mod pose_link;
pub use pose_link::*;

mod sync_group;
pub use sync_group::*;

mod debug_data;
pub use debug_data::*;

mod anim_graph;
pub use anim_graph::*;

mod nodes;
pub use nodes::*;
