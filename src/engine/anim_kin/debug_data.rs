use std::cell::Ref;
use std::fmt::{Display, Formatter};
use nab_kin::debug_panic;
use crate::{AnimNode, NodeId, NodeTable, TraversalStack};

/// One line of a flattened debug trace
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedDebugData
{
    pub debug_line: String,
    pub absolute_weight: f32,
    pub indent: usize,
    pub chain_id: usize,
    pub pose_source: bool,
}

struct DebugItem<'g>
{
    debug_line: String,
    pose_source: bool,
    child_chain: Vec<NodeDebugData<'g>>,
}

/// A human readable trace of the active nodes of a graph, with their weights and played assets
pub struct NodeDebugData<'g>
{
    nodes: &'g NodeTable,
    traversal: &'g TraversalStack,
    absolute_weight: f32,
    node_description: String,
    node_chain: Vec<DebugItem<'g>>,
}
impl<'g> NodeDebugData<'g>
{
    pub(crate) fn new(nodes: &'g NodeTable, traversal: &'g TraversalStack, absolute_weight: f32, node_description: String) -> Self
    {
        Self
        {
            nodes,
            traversal,
            absolute_weight,
            node_description,
            node_chain: Vec::new(),
        }
    }

    #[inline] #[must_use] pub fn absolute_weight(&self) -> f32 { self.absolute_weight }

    #[inline] pub(crate) fn traversal(&self) -> &'g TraversalStack { self.traversal }
    pub(crate) fn borrow_node(&self, node: NodeId) -> Option<Ref<'g, Box<dyn AnimNode>>>
    {
        self.nodes.get(node.0).and_then(|n| n.try_borrow().ok())
    }

    pub fn add_debug_item(&mut self, debug_line: impl Into<String>, pose_source: bool)
    {
        debug_assert!(
            self.node_chain.last().is_none_or(|item| item.child_chain.is_empty()),
            "Cannot add to a chain after it has branched");

        self.node_chain.push(DebugItem
        {
            debug_line: debug_line.into(),
            pose_source,
            child_chain: Vec::new(),
        });
    }

    /// Start a child chain under the latest item, weighted by `branch_weight` of this chain
    pub fn branch_flow(&mut self, branch_weight: f32, node_description: impl Into<String>) -> &mut NodeDebugData<'g>
    {
        if self.node_chain.is_empty()
        {
            debug_panic!("Branching a debug chain with no items");
            self.add_debug_item(String::new(), false);
        }

        let child = NodeDebugData::new(self.nodes, self.traversal, branch_weight * self.absolute_weight, node_description.into());
        let latest = self.node_chain.len() - 1;
        let children = &mut self.node_chain[latest].child_chain;
        children.push(child);
        let last = children.len() - 1;
        &mut children[last]
    }

    // The node's name and weight, followed by any description given when branching (which is consumed)
    #[must_use]
    pub fn get_node_name(&mut self, node: &dyn AnimNode) -> String
    {
        let description = std::mem::take(&mut self.node_description);
        let name = format!("{}<W:{:.1}%> {}", node.name(), self.absolute_weight * 100.0, description);
        name.trim_end().to_string()
    }

    #[must_use]
    pub fn flattened(&self) -> Vec<FlattenedDebugData>
    {
        let mut flattened = Vec::new();
        let mut chain_id = 0;
        self.flatten_into(&mut flattened, 0, &mut chain_id);
        flattened
    }

    fn flatten_into(&self, flattened: &mut Vec<FlattenedDebugData>, indent: usize, chain_id: &mut usize)
    {
        let this_chain = *chain_id;
        for item in &self.node_chain
        {
            flattened.push(FlattenedDebugData
            {
                debug_line: item.debug_line.clone(),
                absolute_weight: self.absolute_weight,
                indent,
                chain_id: this_chain,
                pose_source: item.pose_source,
            });

            // a single child continues this chain
            let multi_branch = item.child_chain.len() > 1;
            let child_indent = if multi_branch { indent + 1 } else { indent };
            for child in &item.child_chain
            {
                if multi_branch
                {
                    *chain_id += 1;
                }
                child.flatten_into(flattened, child_indent, chain_id);
            }
        }
    }
}
impl Display for NodeDebugData<'_>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result
    {
        for line in self.flattened()
        {
            writeln!(f, "{:indent$}{}", "", line.debug_line, indent = line.indent * 2)?;
        }
        Ok(())
    }
}
