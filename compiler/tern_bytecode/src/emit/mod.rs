//! Tree to bytecode lowering.
//!
//! A post-order walk that returns, for every value-producing node, the
//! register holding its value. Operands are converted to the machine kind of
//! the consuming node's type before use, so every arithmetic instruction
//! reads words of exactly one kind.
//!
//! Each procedure literal gets its own [`Procedure`] and register space. A
//! procedure is registered before its body is lowered, so it can call
//! itself. Values of an enclosing procedure are not reachable from a nested
//! one, except constants bound to literals, which are loaded again.

mod error;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tern_diagnostic::{Diagnostic, ErrorCode};
use tern_ir::{Ast, InfixOp, Literal, Name, NodeId, NodeKind, NodeRange, PrefixOp, Span};
use tern_stack::ensure_sufficient_stack;
use tern_types::{procedure_target, LiteralValue, Resolution, Type, TypeTable};

use crate::{
    ConstIdx, Instruction, MetaIdx, Metadata, NativeCall, NativeSlot, NumKind, Opcode, Operand,
    ProcIdx, Procedure, Program, Register, Word,
};

pub use error::GenError;

/// Most inputs a native block may take.
pub const MAX_NATIVE_INPUTS: usize = 6;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct GenOptions {
    /// Highest register number a procedure may use. Capped at
    /// [`Register::DEFAULT_LIMIT`]; lower it to exercise exhaustion.
    pub register_limit: u16,
}

impl Default for GenOptions {
    fn default() -> Self {
        GenOptions {
            register_limit: Register::DEFAULT_LIMIT,
        }
    }
}

/// A generated program with the recoverable problems found on the way.
#[derive(Debug)]
pub struct Generated {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

impl Generated {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// The procedure being lowered.
struct Frame {
    index: ProcIdx,
    /// Declared return type, if any.
    ret: Option<Type>,
    /// Registers bound to declarations.
    bound: FxHashSet<Register>,
}

impl Frame {
    fn new(index: ProcIdx, ret: Option<Type>) -> Self {
        Frame {
            index,
            ret,
            bound: FxHashSet::default(),
        }
    }
}

struct Generator<'a> {
    ast: &'a Ast,
    root: NodeId,
    resolution: &'a Resolution,
    types: &'a TypeTable,
    register_limit: u16,
    program: Program,
    /// Procedure literal to its index.
    procedure_ids: FxHashMap<NodeId, ProcIdx>,
    /// Declaration to the procedure holding its register.
    owners: FxHashMap<NodeId, ProcIdx>,
    frame: Frame,
    diagnostics: Vec<Diagnostic>,
}

/// Lower the tree under `root` into a [`Program`] whose `start` procedure
/// runs the root's statements.
///
/// `resolution` and `types` must cover `root` and be free of errors;
/// violating that is a bug in the caller and panics.
pub fn generate(
    ast: &Ast,
    root: NodeId,
    resolution: &Resolution,
    types: &TypeTable,
    options: GenOptions,
) -> Result<Generated, GenError> {
    let mut generator = Generator {
        ast,
        root,
        resolution,
        types,
        register_limit: options.register_limit.min(Register::DEFAULT_LIMIT),
        program: Program::new(),
        procedure_ids: FxHashMap::default(),
        owners: FxHashMap::default(),
        frame: Frame::new(ProcIdx::START, None),
        diagnostics: Vec::new(),
    };
    generator.node(root)?;
    tracing::debug!(
        root = root.raw(),
        procedures = generator.program.procedures.len(),
        constants = generator.program.constants.len(),
        metadata = generator.program.metadata.len(),
        errors = generator.diagnostics.len(),
        "generated program"
    );
    Ok(Generated {
        program: generator.program,
        diagnostics: generator.diagnostics,
    })
}

type Value = Result<Option<Register>, GenError>;

impl Generator<'_> {
    fn node(&mut self, id: NodeId) -> Value {
        ensure_sufficient_stack(|| self.lower(id))
    }

    fn lower(&mut self, id: NodeId) -> Value {
        let ast = self.ast;
        match *ast.kind(id) {
            NodeKind::Module { items: list } | NodeKind::Block { stmts: list } => {
                for &stmt in ast.list(list) {
                    self.node(stmt)?;
                }
                Ok(None)
            }

            NodeKind::ImmutableDecl { definition, .. } => self.immutable_decl(id, definition),
            NodeKind::MutableDecl { init, .. } => self.mutable_decl(id, init),
            NodeKind::Procedure { ret, body } => {
                self.procedure(id, ret, body)?;
                Ok(None)
            }
            // Type-level nodes produce no code.
            NodeKind::StructDef { .. }
            | NodeKind::EnumDef { .. }
            | NodeKind::Field { .. }
            | NodeKind::Variant { .. }
            | NodeKind::InfixOperator(_)
            | NodeKind::PrefixOperator(_)
            | NodeKind::TypeName(_)
            | NodeKind::ArrayType { .. } => Ok(None),

            NodeKind::ExprStmt { expr } => {
                self.node(expr)?;
                Ok(None)
            }
            NodeKind::Assign { target, value } => {
                self.assign(id, target, value)?;
                Ok(None)
            }
            NodeKind::ParallelAssign { targets, values } => {
                self.parallel_assign(targets, values)?;
                Ok(None)
            }
            NodeKind::Return { value } => {
                self.ret(id, value)?;
                Ok(None)
            }

            NodeKind::Literal(lit) => self.literal(id, lit, ast.span(id)),
            NodeKind::Ident(_) => self.ident(id),
            NodeKind::Infix { left, op, right } => self.infix(id, left, op, right),
            NodeKind::Prefix { op, operand } => self.prefix(id, op, operand),
            NodeKind::Group { expr } => self.node(expr),
            NodeKind::Call { callee } => self.call(id, callee),
            NodeKind::Cast { expr, .. } => {
                let Some(value) = self.node(expr)? else {
                    return Ok(None);
                };
                self.convert(value, self.ty(expr), self.ty(id), ast.span(id))
                    .map(Some)
            }
            NodeKind::NativeBlock {
                source,
                inputs,
                output,
            } => self.native_block(id, source, inputs, output),
            NodeKind::NativeBinding { ident, .. } => self.node(ident),
        }
    }

    // Emission

    #[inline]
    fn ty(&self, id: NodeId) -> Type {
        self.types.type_of(id)
    }

    fn current(&mut self) -> &mut Procedure {
        &mut self.program.procedures[self.frame.index.index()]
    }

    fn emit(&mut self, instruction: Instruction, ty: Type, span: Span) {
        let procedure = self.current();
        tracing::trace!(procedure = %procedure.name, %instruction, "emit");
        procedure.push(instruction, span);
        if !instruction.out.is_none() {
            procedure.last_register = instruction.out;
            procedure.last_type = ty;
        }
    }

    fn fresh(&mut self, span: Span) -> Result<Register, GenError> {
        let limit = self.register_limit;
        let procedure = self.current();
        let next = procedure.next_register;
        if next > limit {
            return Err(GenError::RegisterSpaceExhausted {
                procedure: procedure.name.clone(),
                limit,
                span,
            });
        }
        procedure.next_register = next + 1;
        Ok(Register::new(next))
    }

    fn copy(&mut self, out: Register, value: Register, ty: Type, span: Span) {
        self.emit(
            Instruction::new(Opcode::CopyValue, out, Operand::Reg(value), Operand::None),
            ty,
            span,
        );
    }

    /// Convert `value` from `from` to `to`. Types lowering to the same kind
    /// need no instruction.
    fn convert(
        &mut self,
        value: Register,
        from: Type,
        to: Type,
        span: Span,
    ) -> Result<Register, GenError> {
        let (Some(from_kind), Some(to_kind)) = (NumKind::of(from), NumKind::of(to)) else {
            return Ok(value);
        };
        if from_kind == to_kind {
            return Ok(value);
        }
        let out = self.fresh(span)?;
        self.emit(
            Instruction::new(
                Opcode::Convert {
                    from: from_kind,
                    to: to_kind,
                },
                out,
                Operand::Reg(value),
                Operand::None,
            ),
            to,
            span,
        );
        Ok(out)
    }

    /// Lower `id` and convert its value to `ty`.
    fn operand(&mut self, id: NodeId, ty: Type) -> Value {
        let Some(value) = self.node(id)? else {
            return Ok(None);
        };
        self.convert(value, self.ty(id), ty, self.ast.span(id)).map(Some)
    }

    fn constant(&mut self, word: Word, span: Span) -> Result<ConstIdx, GenError> {
        let index = u32::try_from(self.program.constants.len())
            .map_err(|_| GenError::ConstantPoolExhausted { span })?;
        self.program.constants.push(word);
        Ok(ConstIdx::new(index))
    }

    #[cold]
    fn unsupported(&mut self, span: Span, what: &str) {
        self.diagnostics.push(
            Diagnostic::error(ErrorCode::E3009)
                .with_message(format!("{what} cannot be lowered to bytecode"))
                .with_label(span, "not supported here"),
        );
    }

    // Expressions

    /// Load the literal `id` into a fresh register; `span` locates the use.
    fn literal(&mut self, id: NodeId, lit: Literal, span: Span) -> Value {
        if let Literal::Text(_) = lit {
            self.unsupported(span, "text values");
            return Ok(None);
        }
        let Some(value) = self.types.literal(id) else {
            unreachable!("numeric literal without a parsed value");
        };
        let ty = self.ty(id);
        let word = match value {
            LiteralValue::Integer(v) => Word::from_u64(v),
            LiteralValue::Float(v) => Word::from_f64(v),
            LiteralValue::Char(c) => Word::from_u64(u64::from(u32::from(c))),
        };
        self.load(word, ty, span).map(Some)
    }

    fn load(&mut self, word: Word, ty: Type, span: Span) -> Result<Register, GenError> {
        let constant = self.constant(word, span)?;
        let out = self.fresh(span)?;
        self.emit(
            Instruction::new(
                Opcode::LoadConst,
                out,
                Operand::Const(constant),
                Operand::None,
            ),
            ty,
            span,
        );
        Ok(out)
    }

    /// `-literal` as one signed constant, when the result fits `kind`.
    /// Covers the most negative value, whose magnitude does not.
    fn folded_negation(&self, operand: NodeId, kind: NumKind) -> Option<Word> {
        let operand = self.ast.ungroup(operand);
        let is_number = matches!(self.ast.kind(operand), NodeKind::Literal(Literal::Number(_)));
        if !kind.is_signed() || !is_number {
            return None;
        }
        let Some(LiteralValue::Integer(magnitude)) = self.types.literal(operand) else {
            return None;
        };
        let negated = i64::try_from(-i128::from(magnitude)).ok()?;
        let min = i64::MIN >> (64 - kind.bits());
        (negated >= min).then_some(Word::from_i64(negated))
    }

    fn ident(&mut self, id: NodeId) -> Value {
        let ast = self.ast;
        let Some(decl) = self.resolution.declaration(id) else {
            unreachable!("lowering an unresolved identifier");
        };
        if let NodeKind::ImmutableDecl { definition, .. } = *ast.kind(decl) {
            if let NodeKind::StructDef { .. } | NodeKind::EnumDef { .. } =
                ast.kind(ast.ungroup(definition))
            {
                self.unsupported(ast.span(id), "struct and enum values");
                return Ok(None);
            }
        }
        if self.ty(decl) == Type::Procedure {
            return Ok(None);
        }
        // A declaration whose value failed to lower has no register; that
        // failure was reported already.
        let Some(&owner) = self.owners.get(&decl) else {
            return Ok(None);
        };
        if owner != self.frame.index {
            return self.outer_value(id, decl);
        }
        match self.current().registers.get(&decl) {
            Some(&register) => Ok(Some(register)),
            None => unreachable!("declaration owned by this procedure has no register"),
        }
    }

    /// Read `decl` of an enclosing procedure from `ident`.
    fn outer_value(&mut self, ident: NodeId, decl: NodeId) -> Value {
        let ast = self.ast;
        if let NodeKind::ImmutableDecl { definition, .. } = *ast.kind(decl) {
            let definition = ast.ungroup(definition);
            if let NodeKind::Literal(lit) = *ast.kind(definition) {
                return self.literal(definition, lit, ast.span(ident));
            }
        }
        self.capture_error(ident, decl);
        Ok(None)
    }

    #[cold]
    fn capture_error(&mut self, ident: NodeId, decl: NodeId) {
        let ast = self.ast;
        let name = ast.kind(decl).declared_name().map_or("", |n| ast.text(n));
        self.diagnostics.push(
            Diagnostic::error(ErrorCode::E3010)
                .with_message(format!("cannot use `{name}` from an enclosing procedure"))
                .with_label(ast.span(ident), "used here")
                .with_secondary_label(ast.span(decl), "declared in another procedure")
                .with_note("only constants bound to literals can be read across procedures"),
        );
    }

    fn infix(&mut self, id: NodeId, left: NodeId, op: NodeId, right: NodeId) -> Value {
        let ast = self.ast;
        let NodeKind::InfixOperator(op) = *ast.kind(op) else {
            unreachable!("infix expression without an infix operator leaf");
        };
        let ty = self.ty(id);
        let Some(kind) = NumKind::of(ty) else {
            unreachable!("arithmetic typed `{ty}`");
        };
        let lhs = self.operand(left, ty)?;
        let rhs = self.operand(right, ty)?;
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Ok(None);
        };
        let opcode = match op {
            InfixOp::Add => Opcode::Add(kind),
            InfixOp::Sub => Opcode::Sub(kind),
            InfixOp::Mul => Opcode::Mul(kind),
            InfixOp::Div => Opcode::Div(kind),
        };
        let span = ast.span(id);
        let out = self.fresh(span)?;
        self.emit(
            Instruction::new(opcode, out, Operand::Reg(lhs), Operand::Reg(rhs)),
            ty,
            span,
        );
        Ok(Some(out))
    }

    fn prefix(&mut self, id: NodeId, op: NodeId, operand: NodeId) -> Value {
        let ast = self.ast;
        let NodeKind::PrefixOperator(op) = *ast.kind(op) else {
            unreachable!("prefix expression without a prefix operator leaf");
        };
        let ty = self.ty(id);
        if op == PrefixOp::Minus {
            if let Some(word) = NumKind::of(ty).and_then(|kind| self.folded_negation(operand, kind)) {
                return self.load(word, ty, ast.span(id)).map(Some);
            }
        }
        let Some(value) = self.operand(operand, ty)? else {
            return Ok(None);
        };
        match op {
            PrefixOp::Plus => Ok(Some(value)),
            PrefixOp::Minus => {
                let Some(kind) = NumKind::of(ty) else {
                    unreachable!("negation typed `{ty}`");
                };
                let span = ast.span(id);
                let out = self.fresh(span)?;
                self.emit(
                    Instruction::new(Opcode::Neg(kind), out, Operand::Reg(value), Operand::None),
                    ty,
                    span,
                );
                Ok(Some(out))
            }
        }
    }

    fn call(&mut self, id: NodeId, callee: NodeId) -> Value {
        let span = self.ast.span(id);
        // Lowers a procedure literal in callee position.
        self.node(callee)?;
        let Some(target) = procedure_target(self.ast, self.resolution, callee) else {
            self.unsupported(span, "indirect calls");
            return Ok(None);
        };
        let Some(&index) = self.procedure_ids.get(&target) else {
            unreachable!("call to a procedure that was never lowered");
        };
        let out = self.fresh(span)?;
        self.emit(
            Instruction::new(Opcode::Call, out, Operand::Proc(index), Operand::None),
            self.ty(id),
            span,
        );
        Ok(Some(out))
    }

    fn native_block(&mut self, id: NodeId, source: Name, inputs: NodeRange, output: NodeId) -> Value {
        let ast = self.ast;
        let span = ast.span(id);
        let inputs = ast.list(inputs);
        if inputs.len() > MAX_NATIVE_INPUTS {
            self.diagnostics.push(
                Diagnostic::error(ErrorCode::E4002)
                    .with_message(format!(
                        "native block takes {} inputs, at most {MAX_NATIVE_INPUTS} are supported",
                        inputs.len()
                    ))
                    .with_label(span, "too many inputs"),
            );
            return Ok(None);
        }

        let mut slots = Vec::with_capacity(inputs.len());
        for &input in inputs {
            let (ident, offset) = self.binding(input);
            let Some(register) = self.node(ident)? else {
                return Ok(None);
            };
            slots.push(self.slot(ident, offset, register));
        }
        let output_slot = match output.valid() {
            Some(output) => {
                let (ident, offset) = self.binding(output);
                let Some(register) = self.place(ident) else {
                    return Ok(None);
                };
                Some(self.slot(ident, offset, register))
            }
            None => None,
        };

        let out = output_slot.as_ref().map_or(Register::NONE, |slot| slot.register);
        let index = u32::try_from(self.program.metadata.len())
            .map(MetaIdx::new)
            .map_err(|_| GenError::MetadataExhausted { span })?;
        self.program.metadata.push(Metadata::Native(NativeCall {
            source: ast.text(source).to_owned(),
            inputs: slots,
            output: output_slot,
        }));
        let ty = output.valid().map_or(Type::Empty, |o| self.ty(o));
        self.emit(
            Instruction::new(Opcode::CallNative, out, Operand::Meta(index), Operand::None),
            ty,
            span,
        );
        Ok(Some(out).filter(|r| !r.is_none()))
    }

    fn binding(&self, id: NodeId) -> (NodeId, u32) {
        match *self.ast.kind(id) {
            NodeKind::NativeBinding { ident, offset } => (ident, offset),
            ref other => unreachable!("native block slot is {other:?}"),
        }
    }

    fn slot(&self, ident: NodeId, offset: u32, register: Register) -> NativeSlot {
        let name = match *self.ast.kind(self.ast.ungroup(ident)) {
            NodeKind::Ident(name) => self.ast.text(name).to_owned(),
            _ => String::new(),
        };
        NativeSlot {
            name,
            offset,
            register,
        }
    }

    // Declarations and statements

    fn immutable_decl(&mut self, id: NodeId, definition: NodeId) -> Value {
        let Some(value) = self.node(definition)? else {
            return Ok(None);
        };
        let span = self.ast.span(id);
        let value = self.convert(value, self.ty(definition), self.ty(id), span)?;
        self.bind(id, value, span).map(Some)
    }

    fn mutable_decl(&mut self, id: NodeId, init: NodeId) -> Value {
        let span = self.ast.span(id);
        let ty = self.ty(id);
        let value = match init.valid() {
            Some(init) => {
                let Some(value) = self.node(init)? else {
                    return Ok(None);
                };
                self.convert(value, self.ty(init), ty, span)?
            }
            None if ty == Type::Text => {
                self.unsupported(span, "text values");
                return Ok(None);
            }
            // Frames start zeroed.
            None => self.fresh(span)?,
        };
        self.bind(id, value, span).map(Some)
    }

    /// Give `decl` a register holding `value`, copying when `value` already
    /// belongs to another declaration.
    fn bind(&mut self, decl: NodeId, value: Register, span: Span) -> Result<Register, GenError> {
        let register = if self.frame.bound.contains(&value) {
            let copy = self.fresh(span)?;
            self.copy(copy, value, self.ty(decl), span);
            copy
        } else {
            value
        };
        self.frame.bound.insert(register);
        self.owners.insert(decl, self.frame.index);
        self.current().registers.insert(decl, register);

        let ast = self.ast;
        if self.frame.index == ProcIdx::START && ast.enclosing_scope(decl) == self.root {
            if let Some(name) = ast.kind(decl).declared_name() {
                self.program
                    .data_symbols
                    .insert(ast.text(name).to_owned(), register);
            }
        }
        Ok(register)
    }

    /// Register an assignment to `target` writes, if it is writable from the
    /// current procedure.
    fn place(&mut self, target: NodeId) -> Option<Register> {
        let ident = self.ast.ungroup(target);
        let Some(decl) = self.resolution.declaration(ident) else {
            unreachable!("assignment to an unresolved name");
        };
        let owner = *self.owners.get(&decl)?;
        if owner != self.frame.index {
            self.capture_error(ident, decl);
            return None;
        }
        self.current().registers.get(&decl).copied()
    }

    fn assign(&mut self, id: NodeId, target: NodeId, value: NodeId) -> Result<(), GenError> {
        let Some(register) = self.node(value)? else {
            return Ok(());
        };
        let target_ty = self.ty(target);
        let converted = self.convert(register, self.ty(value), target_ty, self.ast.span(value))?;
        if let Some(place) = self.place(target) {
            self.copy(place, converted, target_ty, self.ast.span(id));
        }
        Ok(())
    }

    /// `a, b = b, a`: every value is staged in a register no target aliases
    /// before any target is written.
    fn parallel_assign(&mut self, targets: NodeRange, values: NodeRange) -> Result<(), GenError> {
        let ast = self.ast;
        let mut staged: SmallVec<[Option<(Register, Type)>; 4]> = SmallVec::new();
        for &value in ast.list(values) {
            let ty = self.ty(value);
            let span = ast.span(value);
            let entry = match self.node(value)? {
                Some(register) if self.frame.bound.contains(&register) => {
                    let temp = self.fresh(span)?;
                    self.copy(temp, register, ty, span);
                    Some((temp, ty))
                }
                Some(register) => Some((register, ty)),
                None => None,
            };
            staged.push(entry);
        }

        for (&target, entry) in ast.list(targets).iter().zip(staged) {
            let Some((temp, ty)) = entry else {
                continue;
            };
            let span = ast.span(target);
            let target_ty = self.ty(target);
            let converted = self.convert(temp, ty, target_ty, span)?;
            if let Some(place) = self.place(target) {
                self.copy(place, converted, target_ty, span);
            }
        }
        Ok(())
    }

    fn ret(&mut self, id: NodeId, value: NodeId) -> Result<(), GenError> {
        let span = self.ast.span(id);
        let operand = match value.valid() {
            Some(value) => {
                let Some(register) = self.node(value)? else {
                    return Ok(());
                };
                let register = match self.frame.ret {
                    Some(ret) => self.convert(register, self.ty(value), ret, span)?,
                    None => register,
                };
                Operand::Reg(register)
            }
            None => Operand::None,
        };
        self.emit(
            Instruction::new(Opcode::Return, Register::NONE, operand, Operand::None),
            Type::Empty,
            span,
        );
        Ok(())
    }

    fn procedure(&mut self, id: NodeId, ret: NodeId, body: NodeId) -> Result<(), GenError> {
        let ast = self.ast;
        let span = ast.span(id);
        let (name, constant) = match ast.parent(id).valid().map(|p| *ast.kind(p)) {
            Some(NodeKind::ImmutableDecl { name, .. }) => (ast.text(name).to_owned(), true),
            Some(NodeKind::MutableDecl { name, .. }) => (ast.text(name).to_owned(), false),
            _ => (format!("procedure@{}", span.start), false),
        };
        let index = u16::try_from(self.program.procedures.len())
            .map(ProcIdx::new)
            .map_err(|_| GenError::ProcedureSpaceExhausted { span })?;
        self.program.procedures.push(Procedure::new(name.clone()));
        self.procedure_ids.insert(id, index);
        if constant {
            self.program.text_symbols.insert(name, index);
        }

        let ret = ret.valid().map(|r| self.ty(r));
        let outer = std::mem::replace(&mut self.frame, Frame::new(index, ret));
        let result = self.procedure_body(body, ret);
        self.frame = outer;
        result
    }

    fn procedure_body(&mut self, body: NodeId, ret: Option<Type>) -> Result<(), GenError> {
        self.node(body)?;
        let Some(ret) = ret else {
            return Ok(());
        };
        let procedure = self.current();
        let (last, last_type) = (procedure.last_register, procedure.last_type);
        if !last.is_none() {
            self.convert(last, last_type, ret, self.ast.span(body))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "tests use unwrap to panic on unexpected state"
)]
mod tests;
