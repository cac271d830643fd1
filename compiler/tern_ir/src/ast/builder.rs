//! Programmatic tree construction.
//!
//! Stands in for the parser at the crate boundary: every constructor
//! allocates one node and returns its id. Leaves take the span set by
//! [`AstBuilder::at`] (or [`Span::DUMMY`]); composite nodes cover their
//! children unless a span was set explicitly.

use crate::{Ast, InfixOp, Literal, Name, NodeId, NodeKind, PrefixOp, Span};

#[derive(Debug, Default)]
pub struct AstBuilder {
    ast: Ast,
    pending: Option<Span>,
}

impl AstBuilder {
    pub fn new() -> Self {
        AstBuilder::default()
    }

    /// Use `start..end` as the span of the next allocated node.
    pub fn at(&mut self, start: u32, end: u32) -> &mut Self {
        self.pending = Some(Span::new(start, end));
        self
    }

    pub fn finish(self) -> Ast {
        self.ast
    }

    pub fn name(&mut self, s: &str) -> Name {
        self.ast.intern(s)
    }

    fn node(&mut self, kind: NodeKind, covered: Span) -> NodeId {
        let span = self.pending.take().unwrap_or(covered);
        self.ast.alloc(kind, span)
    }

    fn cover(&self, ids: &[NodeId]) -> Span {
        ids.iter()
            .filter(|id| id.is_valid())
            .fold(Span::DUMMY, |acc, &id| acc.cover(self.ast.span(id)))
    }

    fn leaf(&mut self, kind: NodeKind) -> NodeId {
        self.node(kind, Span::DUMMY)
    }

    // Leaves

    pub fn number(&mut self, text: &str) -> NodeId {
        let text = self.ast.intern(text);
        self.leaf(NodeKind::Literal(Literal::Number(text)))
    }

    pub fn char_lit(&mut self, c: char) -> NodeId {
        self.leaf(NodeKind::Literal(Literal::Char(c)))
    }

    pub fn text(&mut self, text: &str) -> NodeId {
        let text = self.ast.intern(text);
        self.leaf(NodeKind::Literal(Literal::Text(text)))
    }

    pub fn ident(&mut self, name: &str) -> NodeId {
        let name = self.ast.intern(name);
        self.leaf(NodeKind::Ident(name))
    }

    pub fn type_name(&mut self, name: &str) -> NodeId {
        let name = self.ast.intern(name);
        self.leaf(NodeKind::TypeName(name))
    }

    // Expressions

    pub fn infix(&mut self, left: NodeId, op: InfixOp, right: NodeId) -> NodeId {
        let pending = self.pending.take();
        let op = self.leaf(NodeKind::InfixOperator(op));
        self.pending = pending;
        let span = self.cover(&[left, right]);
        self.node(NodeKind::Infix { left, op, right }, span)
    }

    pub fn add(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.infix(left, InfixOp::Add, right)
    }

    pub fn sub(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.infix(left, InfixOp::Sub, right)
    }

    pub fn mul(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.infix(left, InfixOp::Mul, right)
    }

    pub fn div(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.infix(left, InfixOp::Div, right)
    }

    pub fn prefix(&mut self, op: PrefixOp, operand: NodeId) -> NodeId {
        let pending = self.pending.take();
        let op = self.leaf(NodeKind::PrefixOperator(op));
        self.pending = pending;
        let span = self.cover(&[operand]);
        self.node(NodeKind::Prefix { op, operand }, span)
    }

    pub fn neg(&mut self, operand: NodeId) -> NodeId {
        self.prefix(PrefixOp::Minus, operand)
    }

    pub fn group(&mut self, expr: NodeId) -> NodeId {
        let span = self.cover(&[expr]);
        self.node(NodeKind::Group { expr }, span)
    }

    pub fn call(&mut self, callee: NodeId) -> NodeId {
        let span = self.cover(&[callee]);
        self.node(NodeKind::Call { callee }, span)
    }

    pub fn cast(&mut self, expr: NodeId, ty: NodeId) -> NodeId {
        let span = self.cover(&[expr, ty]);
        self.node(NodeKind::Cast { expr, ty }, span)
    }

    /// Native block reading `inputs` and writing `output`, each given as
    /// `(identifier, frame offset)`.
    pub fn native_block(
        &mut self,
        source: &str,
        inputs: &[(&str, u32)],
        output: Option<(&str, u32)>,
    ) -> NodeId {
        let pending = self.pending.take();
        let source = self.ast.intern(source);
        let bindings: Vec<NodeId> = inputs
            .iter()
            .map(|&(name, offset)| self.binding(name, offset))
            .collect();
        let output = output.map_or(NodeId::INVALID, |(name, offset)| self.binding(name, offset));
        let inputs = self.ast.alloc_list(bindings);
        self.pending = pending;
        self.node(NodeKind::NativeBlock { source, inputs, output }, Span::DUMMY)
    }

    fn binding(&mut self, name: &str, offset: u32) -> NodeId {
        let ident = self.ident(name);
        self.leaf(NodeKind::NativeBinding { ident, offset })
    }

    // Declarations and definitions

    /// `name :: definition`
    pub fn constant(&mut self, name: &str, definition: NodeId) -> NodeId {
        let name = self.ast.intern(name);
        let span = self.cover(&[definition]);
        self.node(NodeKind::ImmutableDecl { name, definition }, span)
    }

    /// `name := init`
    pub fn var(&mut self, name: &str, init: NodeId) -> NodeId {
        self.var_typed(name, None, Some(init))
    }

    /// `name : ty = init` with either side optional.
    pub fn var_typed(&mut self, name: &str, ty: Option<NodeId>, init: Option<NodeId>) -> NodeId {
        let name = self.ast.intern(name);
        let ty = ty.unwrap_or(NodeId::INVALID);
        let init = init.unwrap_or(NodeId::INVALID);
        let span = self.cover(&[ty, init]);
        self.node(NodeKind::MutableDecl { name, ty, init }, span)
    }

    pub fn procedure(&mut self, ret: Option<NodeId>, body: NodeId) -> NodeId {
        let ret = ret.unwrap_or(NodeId::INVALID);
        let span = self.cover(&[ret, body]);
        self.node(NodeKind::Procedure { ret, body }, span)
    }

    pub fn struct_def(&mut self, fields: &[(&str, NodeId)]) -> NodeId {
        let pending = self.pending.take();
        let ids: Vec<NodeId> = fields
            .iter()
            .map(|&(name, ty)| {
                let name = self.ast.intern(name);
                let span = self.cover(&[ty]);
                self.node(NodeKind::Field { name, ty }, span)
            })
            .collect();
        let span = self.cover(&ids);
        let fields = self.ast.alloc_list(ids);
        self.pending = pending;
        self.node(NodeKind::StructDef { fields }, span)
    }

    pub fn enum_def(&mut self, variants: &[&str]) -> NodeId {
        let pending = self.pending.take();
        let ids: Vec<NodeId> = variants
            .iter()
            .map(|&name| {
                let name = self.ast.intern(name);
                self.leaf(NodeKind::Variant { name })
            })
            .collect();
        let variants = self.ast.alloc_list(ids);
        self.pending = pending;
        self.node(NodeKind::EnumDef { variants }, Span::DUMMY)
    }

    pub fn array_type(&mut self, elem: NodeId, len: NodeId) -> NodeId {
        let span = self.cover(&[elem, len]);
        self.node(NodeKind::ArrayType { elem, len }, span)
    }

    // Statements

    pub fn expr_stmt(&mut self, expr: NodeId) -> NodeId {
        let span = self.cover(&[expr]);
        self.node(NodeKind::ExprStmt { expr }, span)
    }

    pub fn assign(&mut self, target: NodeId, value: NodeId) -> NodeId {
        let span = self.cover(&[target, value]);
        self.node(NodeKind::Assign { target, value }, span)
    }

    pub fn parallel_assign(&mut self, targets: &[NodeId], values: &[NodeId]) -> NodeId {
        let span = self.cover(targets).cover(self.cover(values));
        let targets = self.ast.alloc_list(targets.iter().copied());
        let values = self.ast.alloc_list(values.iter().copied());
        self.node(NodeKind::ParallelAssign { targets, values }, span)
    }

    pub fn ret(&mut self, value: Option<NodeId>) -> NodeId {
        let value = value.unwrap_or(NodeId::INVALID);
        let span = self.cover(&[value]);
        self.node(NodeKind::Return { value }, span)
    }

    // Scopes

    pub fn block(&mut self, stmts: &[NodeId]) -> NodeId {
        let span = self.cover(stmts);
        let stmts = self.ast.alloc_list(stmts.iter().copied());
        self.node(NodeKind::Block { stmts }, span)
    }

    pub fn module(&mut self, items: &[NodeId]) -> NodeId {
        let span = self.cover(items);
        let items = self.ast.alloc_list(items.iter().copied());
        self.node(NodeKind::Module { items }, span)
    }
}
