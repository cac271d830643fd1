//! The register machine.
//!
//! Every call gets a fresh zeroed register file sized to the callee's
//! register count. Instructions run in order; the value of a procedure is
//! the one written by its last writing instruction, unless a `RETURN`
//! leaves early with its own operand.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tern_bytecode::{
    Instruction, MetaIdx, Metadata, NumKind, Opcode, Operand, ProcIdx, Procedure, Program, Register, Word,
};
use tern_ir::Span;
use tern_stack::ensure_sufficient_stack;

use crate::arith::{self, ArithOp};
use crate::native::{NativeBackend, NativeError, NativeFn};
use crate::{VmError, VmErrorKind};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct VmConfig {
    /// Deepest chain of nested `CALL`s allowed.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_call_depth: 256,
        }
    }
}

/// Result of running `start`.
#[derive(Clone, PartialEq, Debug)]
pub struct RunOutput {
    pub value: Word,
    /// Final register file of `start`.
    pub registers: Vec<Word>,
}

impl RunOutput {
    pub fn register(&self, register: Register) -> Option<Word> {
        self.registers.get(register.index()).copied()
    }

    /// Final value of the top-level variable `name`.
    pub fn symbol(&self, program: &Program, name: &str) -> Option<Word> {
        self.register(program.data_symbol(name)?)
    }
}

pub struct Vm<'p, B> {
    program: &'p Program,
    backend: B,
    config: VmConfig,
    natives: FxHashMap<MetaIdx, NativeFn>,
    depth: usize,
}

impl<'p, B: NativeBackend> Vm<'p, B> {
    pub fn new(program: &'p Program, backend: B, config: VmConfig) -> Self {
        Vm {
            program,
            backend,
            config,
            natives: FxHashMap::default(),
            depth: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Number of native blocks compiled so far.
    pub fn compiled_natives(&self) -> usize {
        self.natives.len()
    }

    /// Run procedure `proc` and return its value.
    pub fn evaluate(&mut self, proc: ProcIdx) -> Result<Word, VmError> {
        let program = self.program;
        let Some(procedure) = program.procedure(proc) else {
            return Err(VmError {
                kind: VmErrorKind::MalformedInstruction("no such procedure"),
                procedure: format!("{proc:?}"),
                pc: 0,
                span: Span::DUMMY,
            });
        };
        self.execute(procedure).map(|(value, _)| value)
    }

    /// Run `start`.
    pub fn run(&mut self) -> Result<RunOutput, VmError> {
        let program = self.program;
        let Some(start) = program.procedure(ProcIdx::START) else {
            return Err(VmError {
                kind: VmErrorKind::MalformedInstruction("program has no start procedure"),
                procedure: "start".to_owned(),
                pc: 0,
                span: Span::DUMMY,
            });
        };
        let (value, registers) = self.execute(start)?;
        tracing::debug!(value = ?value, registers = registers.len(), "program finished");
        Ok(RunOutput { value, registers })
    }

    fn execute(&mut self, procedure: &'p Procedure) -> Result<(Word, Vec<Word>), VmError> {
        let program = self.program;
        let mut frame = vec![Word::ZERO; procedure.frame_size()];
        let mut result = Word::ZERO;

        for (pc, &instruction) in procedure.instructions.iter().enumerate() {
            tracing::trace!(procedure = %procedure.name, pc, %instruction, "execute");
            let fail = |kind: VmErrorKind| VmError {
                kind,
                procedure: procedure.name.clone(),
                pc,
                span: procedure.spans.get(pc).copied().unwrap_or(Span::DUMMY),
            };
            let Instruction {
                op,
                out,
                left,
                right,
            } = instruction;

            let value = match op {
                Opcode::Noop => continue,
                Opcode::CopyValue => read(&frame, left).map_err(fail)?,
                Opcode::LoadConst => {
                    let Operand::Const(idx) = left else {
                        return Err(fail(malformed("LOAD_CONST needs a constant operand")));
                    };
                    program
                        .constant(idx)
                        .ok_or_else(|| fail(malformed("constant index out of range")))?
                }
                Opcode::Call => {
                    let Operand::Proc(idx) = left else {
                        return Err(fail(malformed("CALL needs a procedure operand")));
                    };
                    let Some(callee) = program.procedure(idx) else {
                        return Err(fail(malformed("call to a missing procedure")));
                    };
                    if self.depth >= self.config.max_call_depth {
                        return Err(fail(VmErrorKind::CallDepthExceeded {
                            limit: self.config.max_call_depth,
                        }));
                    }
                    self.depth += 1;
                    let called = ensure_sufficient_stack(|| self.execute(callee));
                    self.depth -= 1;
                    called?.0
                }
                Opcode::Return => {
                    let value = match left {
                        Operand::None => Word::ZERO,
                        operand => read(&frame, operand).map_err(fail)?,
                    };
                    return Ok((value, frame));
                }
                Opcode::CallNative => {
                    let Operand::Meta(idx) = left else {
                        return Err(fail(malformed("CALL_NATIVE needs a metadata operand")));
                    };
                    match self.call_native(idx, &frame).map_err(fail)? {
                        Some(value) => value,
                        None => continue,
                    }
                }
                Opcode::Add(kind) => binary(ArithOp::Add, kind, &frame, left, right).map_err(fail)?,
                Opcode::Sub(kind) => binary(ArithOp::Sub, kind, &frame, left, right).map_err(fail)?,
                Opcode::Mul(kind) => binary(ArithOp::Mul, kind, &frame, left, right).map_err(fail)?,
                Opcode::Div(kind) => binary(ArithOp::Div, kind, &frame, left, right).map_err(fail)?,
                Opcode::Neg(kind) => {
                    let operand = read(&frame, left).map_err(fail)?;
                    arith::negate(kind, operand).map_err(fail)?
                }
                Opcode::Convert { from, to } => {
                    let operand = read(&frame, left).map_err(fail)?;
                    arith::convert(from, to, operand)
                }
            };

            write(&mut frame, out, value).map_err(fail)?;
            result = value;
        }
        Ok((result, frame))
    }

    /// Run native block `idx`, compiling it on first use.
    fn call_native(&mut self, idx: MetaIdx, frame: &[Word]) -> Result<Option<Word>, VmErrorKind> {
        let program = self.program;
        let Some(Metadata::Native(call)) = program.metadata(idx) else {
            return Err(malformed("metadata index out of range"));
        };
        let function = match self.natives.get(&idx) {
            Some(&function) => function,
            None => {
                let function = self.backend.compile(call)?;
                if !function.fits(call) {
                    return Err(NativeError::shape(call, &function).into());
                }
                tracing::debug!(
                    metadata = idx.raw(),
                    inputs = call.inputs.len(),
                    "compiled native block"
                );
                self.natives.insert(idx, function);
                function
            }
        };
        let args = call
            .inputs
            .iter()
            .map(|slot| read(frame, Operand::Reg(slot.register)).map(Word::bits))
            .collect::<Result<SmallVec<[u64; 6]>, _>>()?;
        Ok(function.call(&args)?.map(Word::from_bits))
    }
}

fn binary(
    op: ArithOp,
    kind: NumKind,
    frame: &[Word],
    left: Operand,
    right: Operand,
) -> Result<Word, VmErrorKind> {
    arith::binary(op, kind, read(frame, left)?, read(frame, right)?)
}

#[cold]
fn malformed(what: &'static str) -> VmErrorKind {
    VmErrorKind::MalformedInstruction(what)
}

fn read(frame: &[Word], operand: Operand) -> Result<Word, VmErrorKind> {
    match operand {
        Operand::Reg(register) => frame
            .get(register.index())
            .copied()
            .ok_or_else(|| malformed("register out of range")),
        _ => Err(malformed("expected a register operand")),
    }
}

fn write(frame: &mut [Word], out: Register, value: Word) -> Result<(), VmErrorKind> {
    if out.is_none() {
        return Err(malformed("instruction writes no register"));
    }
    let slot = frame
        .get_mut(out.index())
        .ok_or_else(|| malformed("register out of range"))?;
    *slot = value;
    Ok(())
}
