//! Node arena.
//!
//! Every node kind the middle end understands is a variant of [`NodeKind`].
//! Passes match on it exhaustively, so adding a kind is a compile error in
//! each pass until that pass handles it.

mod builder;
mod operators;

use smallvec::SmallVec;

use crate::{Name, NodeId, NodeRange, Span, StringInterner};

pub use builder::AstBuilder;
pub use operators::{InfixOp, PrefixOp};

/// Literal payloads, kept as source text until inference parses them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Literal {
    /// Numeric literal text, e.g. `42`, `017`, `2.5e3`.
    Number(Name),
    Char(char),
    Text(Name),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NodeKind {
    // Scopes
    Module { items: NodeRange },
    Block { stmts: NodeRange },

    // Declarations
    /// `name :: definition`
    ImmutableDecl { name: Name, definition: NodeId },
    /// `name : ty = init`, `name : ty`, or `name := init`.
    MutableDecl { name: Name, ty: NodeId, init: NodeId },

    // Definitions
    /// Procedure-valued expression. `ret` may be [`NodeId::INVALID`].
    Procedure { ret: NodeId, body: NodeId },
    StructDef { fields: NodeRange },
    Field { name: Name, ty: NodeId },
    EnumDef { variants: NodeRange },
    Variant { name: Name },

    // Statements
    ExprStmt { expr: NodeId },
    Assign { target: NodeId, value: NodeId },
    /// `a, b = b, a`
    ParallelAssign { targets: NodeRange, values: NodeRange },
    /// `value` may be [`NodeId::INVALID`].
    Return { value: NodeId },

    // Expressions
    Literal(Literal),
    Ident(Name),
    Infix { left: NodeId, op: NodeId, right: NodeId },
    Prefix { op: NodeId, operand: NodeId },
    Group { expr: NodeId },
    Call { callee: NodeId },
    Cast { expr: NodeId, ty: NodeId },
    /// Embedded native code. `inputs` holds [`NodeKind::NativeBinding`]s,
    /// `output` is one or [`NodeId::INVALID`].
    NativeBlock { source: Name, inputs: NodeRange, output: NodeId },
    /// Binds the identifier `ident` to byte `offset` of the native frame.
    NativeBinding { ident: NodeId, offset: u32 },

    // Operator leaves
    InfixOperator(InfixOp),
    PrefixOperator(PrefixOp),

    // Types
    TypeName(Name),
    ArrayType { elem: NodeId, len: NodeId },
}

impl NodeKind {
    /// Whether this node opens a lexical binding region.
    #[inline]
    pub const fn is_scope(&self) -> bool {
        matches!(self, NodeKind::Module { .. } | NodeKind::Block { .. })
    }

    #[inline]
    pub const fn is_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::ImmutableDecl { .. } | NodeKind::MutableDecl { .. }
        )
    }

    /// Name bound by a declaration node.
    #[inline]
    pub const fn declared_name(&self) -> Option<Name> {
        match self {
            NodeKind::ImmutableDecl { name, .. } | NodeKind::MutableDecl { name, .. } => {
                Some(*name)
            }
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
}

/// Child ids in traversal order. Most nodes have at most three children.
pub type Children = SmallVec<[NodeId; 4]>;

/// Arena owning every node of one compilation unit.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    lists: Vec<NodeId>,
    parents: Vec<NodeId>,
    interner: StringInterner,
}

impl Ast {
    pub fn new() -> Self {
        Ast::default()
    }

    /// Append a node. Its parent stays [`NodeId::INVALID`] until indexed.
    ///
    /// # Panics
    /// Panics if the arena already holds `u32::MAX` nodes.
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let index = u32::try_from(self.nodes.len())
            .ok()
            .filter(|&i| i != u32::MAX)
            .unwrap_or_else(|| panic!("node arena exceeded u32::MAX - 1 nodes"));
        self.nodes.push(Node { kind, span });
        self.parents.push(NodeId::INVALID);
        NodeId::new(index)
    }

    /// Store a child list and return its range.
    ///
    /// # Panics
    /// Panics if the side list would exceed `u32::MAX` entries.
    pub fn alloc_list(&mut self, ids: impl IntoIterator<Item = NodeId>) -> NodeRange {
        let start = self.lists.len();
        self.lists.extend(ids);
        let to_u32 = |n: usize| {
            u32::try_from(n).unwrap_or_else(|_| panic!("node list exceeded u32::MAX entries"))
        };
        NodeRange::new(to_u32(start), to_u32(self.lists.len() - start))
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    #[inline]
    pub fn list(&self, range: NodeRange) -> &[NodeId] {
        &self.lists[range.as_range()]
    }

    /// Parent recorded by the last indexing pass.
    #[inline]
    pub fn parent(&self, id: NodeId) -> NodeId {
        self.parents[id.index()]
    }

    #[inline]
    pub(crate) fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        self.parents[id.index()] = parent;
    }

    #[inline]
    pub fn is_scope(&self, id: NodeId) -> bool {
        self.kind(id).is_scope()
    }

    /// Nearest scope-capable proper ancestor, or `INVALID` above the root.
    pub fn enclosing_scope(&self, id: NodeId) -> NodeId {
        let mut node = self.parent(id);
        while node.is_valid() && !self.is_scope(node) {
            node = self.parent(node);
        }
        node
    }

    /// Nearest enclosing [`NodeKind::Procedure`], or `INVALID`.
    pub fn enclosing_procedure(&self, id: NodeId) -> NodeId {
        let mut node = self.parent(id);
        while node.is_valid() && !matches!(self.kind(node), NodeKind::Procedure { .. }) {
            node = self.parent(node);
        }
        node
    }

    /// Strip any number of grouping parentheses.
    pub fn ungroup(&self, mut id: NodeId) -> NodeId {
        while let NodeKind::Group { expr } = self.kind(id) {
            id = *expr;
        }
        id
    }

    /// Children in the fixed traversal order of each kind. Absent optional
    /// children are skipped.
    pub fn children(&self, id: NodeId) -> Children {
        let mut out = Children::new();
        let mut push = |child: NodeId| {
            if child.is_valid() {
                out.push(child);
            }
        };
        match *self.kind(id) {
            NodeKind::Module { items: list }
            | NodeKind::Block { stmts: list }
            | NodeKind::StructDef { fields: list }
            | NodeKind::EnumDef { variants: list } => {
                self.list(list).iter().copied().for_each(push);
            }
            NodeKind::ImmutableDecl { definition, .. } => push(definition),
            NodeKind::MutableDecl { ty, init, .. } => {
                push(ty);
                push(init);
            }
            NodeKind::Procedure { ret, body } => {
                push(ret);
                push(body);
            }
            NodeKind::Field { ty, .. } => push(ty),
            NodeKind::ExprStmt { expr } | NodeKind::Group { expr } => push(expr),
            NodeKind::Assign { target, value } => {
                push(target);
                push(value);
            }
            NodeKind::ParallelAssign { targets, values } => {
                self.list(targets).iter().copied().for_each(&mut push);
                self.list(values).iter().copied().for_each(push);
            }
            NodeKind::Return { value } => push(value),
            NodeKind::Infix { left, op, right } => {
                push(left);
                push(op);
                push(right);
            }
            NodeKind::Prefix { op, operand } => {
                push(op);
                push(operand);
            }
            NodeKind::Call { callee } => push(callee),
            NodeKind::Cast { expr, ty } => {
                push(expr);
                push(ty);
            }
            NodeKind::NativeBlock { inputs, output, .. } => {
                self.list(inputs).iter().copied().for_each(&mut push);
                push(output);
            }
            NodeKind::NativeBinding { ident, .. } => push(ident),
            NodeKind::ArrayType { elem, len } => {
                push(elem);
                push(len);
            }
            NodeKind::Variant { .. }
            | NodeKind::Literal(_)
            | NodeKind::Ident(_)
            | NodeKind::InfixOperator(_)
            | NodeKind::PrefixOperator(_)
            | NodeKind::TypeName(_) => {}
        }
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn interner(&self) -> &StringInterner {
        &self.interner
    }

    pub fn intern(&mut self, s: &str) -> Name {
        self.interner.intern(s)
    }

    /// Text of `name`.
    pub fn text(&self, name: Name) -> &str {
        self.interner.lookup(name)
    }
}
