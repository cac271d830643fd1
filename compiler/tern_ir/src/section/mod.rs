//! Section indexer.
//!
//! [`index`] flattens one subtree into pre-order and writes the parent link
//! of every node it visits. Resolution and inference iterate the resulting
//! [`Section`] linearly; because the order is pre-order, a declaration is
//! always listed before anything that follows it in source order.

use tern_stack::ensure_sufficient_stack;

use crate::{Ast, NodeId};

/// Pre-order view of one subtree.
#[derive(Debug)]
pub struct Section<'p> {
    root: NodeId,
    nodes: Vec<NodeId>,
    /// `ends[i]` is one past the last position of the subtree at `nodes[i]`.
    ends: Vec<usize>,
    parent: Option<&'p Section<'p>>,
}

impl<'p> Section<'p> {
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Every node of the subtree, in pre-order.
    #[inline]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Exclusive end position of the subtree listed at `pos`.
    #[inline]
    pub fn subtree_end(&self, pos: usize) -> usize {
        self.ends[pos]
    }

    #[inline]
    pub fn parent(&self) -> Option<&'p Section<'p>> {
        self.parent
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `id` belongs to this section's subtree.
    pub fn contains(&self, ast: &Ast, id: NodeId) -> bool {
        let mut node = id;
        while node.is_valid() {
            if node == self.root {
                return true;
            }
            node = ast.parent(node);
        }
        false
    }
}

/// Flatten `root` and record parent links for every node below it.
///
/// The root's own parent becomes the parent section's root, or
/// [`NodeId::INVALID`] for a top-level section.
pub fn index<'p>(ast: &mut Ast, root: NodeId, parent: Option<&'p Section<'p>>) -> Section<'p> {
    let mut nodes = Vec::with_capacity(ast.len());
    let mut ends = Vec::with_capacity(ast.len());
    let above = parent.map_or(NodeId::INVALID, Section::root);
    visit(ast, root, above, &mut nodes, &mut ends);
    tracing::debug!(root = root.raw(), nodes = nodes.len(), "indexed section");
    Section {
        root,
        nodes,
        ends,
        parent,
    }
}

fn visit(ast: &mut Ast, id: NodeId, parent: NodeId, nodes: &mut Vec<NodeId>, ends: &mut Vec<usize>) {
    ensure_sufficient_stack(|| {
        ast.set_parent(id, parent);
        let pos = nodes.len();
        nodes.push(id);
        ends.push(pos);
        for child in ast.children(id) {
            visit(ast, child, id, nodes, ends);
        }
        ends[pos] = nodes.len();
    });
}
