//! Bottom-up type inference.
//!
//! Every node of the section gets a [`Type`]. Expressions are typed from
//! their children, declarations from their annotation or initializer, and
//! statements are typed `empty` after their stores and returns are checked.
//! Results are memoized per node, so a declaration reached through an
//! identifier is typed once no matter how often it is used.
//!
//! A rule that produces [`Type::Uncastable`] from healthy operands reports
//! it; a rule that merely passes an error along stays silent.

mod literal;

use rustc_hash::FxHashMap;
use tern_diagnostic::{Diagnostic, ErrorCode};
use tern_ir::{Ast, Name, NodeId, NodeKind, NodeRange, Section};
use tern_stack::ensure_sufficient_stack;

use crate::lattice::{can_assign, can_cast, prefix_type, promote};
use crate::resolve::procedure_target;
use crate::{Resolution, Type};

/// Value parsed from a literal while typing it.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LiteralValue {
    Integer(u64),
    Float(f64),
    Char(char),
}

#[derive(Debug)]
pub struct TypeTable {
    types: Vec<Type>,
    literals: FxHashMap<NodeId, LiteralValue>,
    diagnostics: Vec<Diagnostic>,
}

impl TypeTable {
    /// Type of `id`; [`Type::Uninferred`] for nodes outside the section.
    #[inline]
    pub fn type_of(&self, id: NodeId) -> Type {
        self.types.get(id.index()).copied().unwrap_or(Type::Uninferred)
    }

    pub fn literal(&self, id: NodeId) -> Option<LiteralValue> {
        self.literals.get(&id).copied()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Visit {
    Pending,
    Active,
    Done,
}

struct Inferer<'a> {
    ast: &'a Ast,
    resolution: &'a Resolution,
    table: TypeTable,
    visits: Vec<Visit>,
}

/// Type every node of `section`. Requires `resolution` for the same
/// section; unresolved identifiers are typed [`Type::Unresolved`].
pub fn infer(ast: &Ast, section: &Section<'_>, resolution: &Resolution) -> TypeTable {
    let mut inferer = Inferer {
        ast,
        resolution,
        table: TypeTable {
            types: vec![Type::Uninferred; ast.len()],
            literals: FxHashMap::default(),
            diagnostics: Vec::new(),
        },
        visits: vec![Visit::Pending; ast.len()],
    };
    for &id in section.nodes() {
        inferer.infer_node(id);
    }
    tracing::debug!(
        root = section.root().raw(),
        literals = inferer.table.literals.len(),
        errors = inferer.table.diagnostics.len(),
        "inferred section"
    );
    inferer.table
}

impl Inferer<'_> {
    fn infer_node(&mut self, id: NodeId) -> Type {
        match self.visits[id.index()] {
            Visit::Done => return self.table.types[id.index()],
            Visit::Active => {
                self.error(
                    Diagnostic::error(ErrorCode::E3004)
                        .with_message("cannot infer a type for a self-referential definition")
                        .with_label(self.ast.span(id), "depends on itself"),
                );
                return Type::Uncastable;
            }
            Visit::Pending => {}
        }
        self.visits[id.index()] = Visit::Active;
        let ty = ensure_sufficient_stack(|| self.compute(id));
        self.table.types[id.index()] = ty;
        self.visits[id.index()] = Visit::Done;
        tracing::trace!(node = id.raw(), %ty, "typed");
        ty
    }

    fn compute(&mut self, id: NodeId) -> Type {
        match *self.ast.kind(id) {
            NodeKind::Module { .. }
            | NodeKind::Block { .. }
            | NodeKind::StructDef { .. }
            | NodeKind::EnumDef { .. }
            | NodeKind::Field { .. }
            | NodeKind::Variant { .. }
            | NodeKind::InfixOperator(_)
            | NodeKind::PrefixOperator(_) => Type::Empty,

            NodeKind::ImmutableDecl { definition, .. } => self.infer_node(definition),
            NodeKind::MutableDecl { name, ty, init } => self.mutable_decl(id, name, ty, init),
            NodeKind::Procedure { .. } => Type::Procedure,

            NodeKind::ExprStmt { expr } => {
                self.infer_node(expr);
                Type::Empty
            }
            NodeKind::Assign { target, value } => {
                self.check_store(target, value);
                Type::Empty
            }
            NodeKind::ParallelAssign { targets, values } => {
                self.parallel_assign(id, targets, values);
                Type::Empty
            }
            NodeKind::Return { value } => {
                self.check_return(id, value);
                Type::Empty
            }

            NodeKind::Literal(lit) => self.literal(id, lit),
            NodeKind::Ident(_) => match self.resolution.declaration(id) {
                Some(decl) => self.infer_node(decl),
                None => Type::Unresolved,
            },
            NodeKind::Infix { left, op, right } => self.infix(id, left, op, right),
            NodeKind::Prefix { op, operand } => self.prefix(id, op, operand),
            NodeKind::Group { expr } => self.infer_node(expr),
            NodeKind::Call { callee } => self.call(id, callee),
            NodeKind::Cast { expr, ty } => self.cast(id, expr, ty),
            NodeKind::NativeBlock { inputs, output, .. } => self.native_block(inputs, output),
            NodeKind::NativeBinding { ident, .. } => {
                let ty = self.infer_node(ident);
                if !ty.is_error() && !ty.is_numeric() && ty != Type::Char {
                    self.error(
                        Diagnostic::error(ErrorCode::E4001)
                            .with_message(format!("native blocks cannot exchange `{ty}` values"))
                            .with_label(self.ast.span(id), "bound here"),
                    );
                }
                ty
            }

            NodeKind::TypeName(name) => {
                let ast = self.ast;
                let text = ast.text(name);
                Type::from_name(text).unwrap_or_else(|| {
                    self.error(
                        Diagnostic::error(ErrorCode::E2002)
                            .with_message(format!("unknown type `{text}`"))
                            .with_label(self.ast.span(id), "not a builtin type"),
                    );
                    Type::Unresolved
                })
            }
            NodeKind::ArrayType { .. } => {
                self.error(
                    Diagnostic::error(ErrorCode::E3009)
                        .with_message("array types are not supported yet")
                        .with_label(self.ast.span(id), "array type"),
                );
                Type::Uncastable
            }
        }
    }

    fn literal(&mut self, id: NodeId, lit: tern_ir::Literal) -> Type {
        match lit {
            tern_ir::Literal::Number(text) => match literal::scan_number(self.ast.text(text)) {
                Ok((ty, value)) => {
                    self.table.literals.insert(id, value);
                    ty
                }
                Err(err) => {
                    self.error(
                        Diagnostic::error(ErrorCode::E3008)
                            .with_message(err.to_string())
                            .with_label(self.ast.span(id), "in this literal"),
                    );
                    Type::Uncastable
                }
            },
            tern_ir::Literal::Char(c) => {
                self.table.literals.insert(id, LiteralValue::Char(c));
                Type::Char
            }
            tern_ir::Literal::Text(_) => Type::Text,
        }
    }

    fn mutable_decl(&mut self, id: NodeId, name: Name, ty: NodeId, init: NodeId) -> Type {
        let declared = ty.valid().map(|t| self.infer_node(t));
        let initial = init.valid().map(|i| self.infer_node(i));
        match (declared, initial) {
            (Some(dest), Some(src)) => {
                if !can_assign(dest, src) {
                    self.error(
                        Diagnostic::error(ErrorCode::E3001)
                            .with_message(format!(
                                "cannot initialize `{}` of type `{dest}` with `{src}`",
                                self.ast.text(name)
                            ))
                            .with_label(self.ast.span(init), format!("this is `{src}`")),
                    );
                }
                dest
            }
            (Some(dest), None) => dest,
            (None, Some(src)) => src,
            (None, None) => {
                self.error(
                    Diagnostic::error(ErrorCode::E3004)
                        .with_message(format!(
                            "`{}` needs a type or an initializer",
                            self.ast.text(name)
                        ))
                        .with_label(self.ast.span(id), "declared here"),
                );
                Type::Uncastable
            }
        }
    }

    fn infix(&mut self, id: NodeId, left: NodeId, op: NodeId, right: NodeId) -> Type {
        let lt = self.infer_node(left);
        self.infer_node(op);
        let rt = self.infer_node(right);
        let ty = promote(lt, rt);
        if ty == Type::Uncastable && !lt.is_error() && !rt.is_error() {
            let symbol = match self.ast.kind(op) {
                NodeKind::InfixOperator(op) => op.as_symbol(),
                _ => "?",
            };
            let mut diag = Diagnostic::error(ErrorCode::E3001)
                .with_message(format!("cannot apply `{symbol}` to `{lt}` and `{rt}`"))
                .with_label(self.ast.span(id), "incompatible operands")
                .with_secondary_label(self.ast.span(left), format!("this is `{lt}`"))
                .with_secondary_label(self.ast.span(right), format!("this is `{rt}`"));
            if (lt.is_signed() && rt.is_unsigned()) || (lt.is_unsigned() && rt.is_signed()) {
                diag = diag.with_note("signed and unsigned operands must be cast explicitly");
            }
            self.error(diag);
        }
        ty
    }

    fn prefix(&mut self, id: NodeId, op: NodeId, operand: NodeId) -> Type {
        self.infer_node(op);
        let operand_ty = self.infer_node(operand);
        let NodeKind::PrefixOperator(prefix_op) = *self.ast.kind(op) else {
            unreachable!("prefix expression without a prefix operator leaf");
        };
        let ty = prefix_type(prefix_op, operand_ty);
        if ty == Type::Uncastable && !operand_ty.is_error() {
            self.error(
                Diagnostic::error(ErrorCode::E3002)
                    .with_message(format!("cannot apply unary `{prefix_op}` to `{operand_ty}`"))
                    .with_label(self.ast.span(id), "not a numeric operand"),
            );
        }
        ty
    }

    fn call(&mut self, id: NodeId, callee: NodeId) -> Type {
        let callee_ty = self.infer_node(callee);
        if callee_ty.is_error() {
            return callee_ty;
        }
        if callee_ty != Type::Procedure {
            self.error(
                Diagnostic::error(ErrorCode::E3007)
                    .with_message(format!("`{callee_ty}` is not callable"))
                    .with_label(self.ast.span(id), "called here"),
            );
            return Type::Uncastable;
        }
        let ast = self.ast;
        match procedure_target(ast, self.resolution, callee).map(|p| ast.kind(p)) {
            Some(&NodeKind::Procedure { ret, .. }) if ret.is_valid() => self.infer_node(ret),
            _ => Type::Empty,
        }
    }

    fn cast(&mut self, id: NodeId, expr: NodeId, ty: NodeId) -> Type {
        let from = self.infer_node(expr);
        let to = self.infer_node(ty);
        if from.is_error() {
            return from;
        }
        if to.is_error() {
            return to;
        }
        if !can_cast(from, to) {
            self.error(
                Diagnostic::error(ErrorCode::E3003)
                    .with_message(format!("cannot cast `{from}` to `{to}`"))
                    .with_label(self.ast.span(id), "invalid cast"),
            );
            return Type::Uncastable;
        }
        to
    }

    fn native_block(&mut self, inputs: NodeRange, output: NodeId) -> Type {
        let ast = self.ast;
        for &input in ast.list(inputs) {
            self.infer_node(input);
        }
        let Some(output) = output.valid() else {
            return Type::Empty;
        };
        let ty = self.infer_node(output);
        if let NodeKind::NativeBinding { ident, .. } = *self.ast.kind(output) {
            self.check_writable(ident);
        }
        ty
    }

    /// Type-check `target = value`.
    fn check_store(&mut self, target: NodeId, value: NodeId) {
        let target_ty = self.infer_node(target);
        let value_ty = self.infer_node(value);
        if !self.check_writable(target) {
            return;
        }
        if target_ty == Type::Procedure {
            self.error(
                Diagnostic::error(ErrorCode::E3009)
                    .with_message("procedure variables cannot be reassigned")
                    .with_label(self.ast.span(target), "holds a procedure")
                    .with_note("declare a new name for the other procedure"),
            );
            return;
        }
        if !can_assign(target_ty, value_ty) {
            self.error(
                Diagnostic::error(ErrorCode::E3001)
                    .with_message(format!("cannot assign `{value_ty}` to a `{target_ty}` slot"))
                    .with_label(self.ast.span(value), format!("this is `{value_ty}`"))
                    .with_secondary_label(self.ast.span(target), format!("this is `{target_ty}`")),
            );
        }
    }

    fn parallel_assign(&mut self, id: NodeId, targets: NodeRange, values: NodeRange) {
        let ast = self.ast;
        let targets = ast.list(targets);
        let values = ast.list(values);
        if targets.len() != values.len() {
            for &node in targets.iter().chain(values) {
                self.infer_node(node);
            }
            self.error(
                Diagnostic::error(ErrorCode::E3006)
                    .with_message(format!(
                        "assignment has {} targets but {} values",
                        targets.len(),
                        values.len()
                    ))
                    .with_label(self.ast.span(id), "unbalanced assignment"),
            );
            return;
        }
        for (&target, &value) in targets.iter().zip(values) {
            self.check_store(target, value);
        }
    }

    /// Whether `target` names a mutable declaration. Reports otherwise,
    /// except for unresolved names, which were reported already.
    fn check_writable(&mut self, target: NodeId) -> bool {
        let target = self.ast.ungroup(target);
        if !matches!(self.ast.kind(target), NodeKind::Ident(_)) {
            self.error(
                Diagnostic::error(ErrorCode::E3009)
                    .with_message("only plain variables can be assigned")
                    .with_label(self.ast.span(target), "not a variable"),
            );
            return false;
        }
        let Some(decl) = self.resolution.declaration(target) else {
            return false;
        };
        match *self.ast.kind(decl) {
            NodeKind::MutableDecl { .. } => true,
            NodeKind::ImmutableDecl { name, .. } => {
                self.error(
                    Diagnostic::error(ErrorCode::E3005)
                        .with_message(format!(
                            "cannot assign to constant `{}`",
                            self.ast.text(name)
                        ))
                        .with_label(self.ast.span(target), "assignment to a constant")
                        .with_secondary_label(self.ast.span(decl), "declared with `::` here"),
                );
                false
            }
            _ => unreachable!("identifier bound to a non-declaration"),
        }
    }

    fn check_return(&mut self, id: NodeId, value: NodeId) {
        let value_ty = value.valid().map_or(Type::Empty, |v| self.infer_node(v));
        // Returning from the top level ends the start procedure.
        let Some(procedure) = self.ast.enclosing_procedure(id).valid() else {
            return;
        };
        let NodeKind::Procedure { ret, .. } = *self.ast.kind(procedure) else {
            unreachable!("enclosing procedure is not a procedure node");
        };
        let Some(ret) = ret.valid() else {
            return;
        };
        let ret_ty = self.infer_node(ret);
        if !value.is_valid() && ret_ty != Type::Empty && !ret_ty.is_error() {
            self.error(
                Diagnostic::error(ErrorCode::E3001)
                    .with_message(format!("missing return value of type `{ret_ty}`"))
                    .with_label(self.ast.span(id), "returns nothing"),
            );
        } else if value.is_valid() && !can_assign(ret_ty, value_ty) {
            self.error(
                Diagnostic::error(ErrorCode::E3001)
                    .with_message(format!("cannot return `{value_ty}` from a procedure returning `{ret_ty}`"))
                    .with_label(self.ast.span(value), format!("this is `{value_ty}`"))
                    .with_secondary_label(self.ast.span(ret), "return type declared here"),
            );
        }
    }

    fn error(&mut self, diag: Diagnostic) {
        self.table.diagnostics.push(diag);
    }
}
