use tern_bytecode::NumKind;
use tern_ir::Span;
use thiserror::Error;

use crate::{ArithOp, NativeError};

/// A run-time failure, located at the instruction that raised it.
#[derive(Clone, PartialEq, Debug, Error)]
#[error("{kind} (in `{procedure}` at instruction {pc})")]
pub struct VmError {
    pub kind: VmErrorKind,
    pub procedure: String,
    pub pc: usize,
    /// Source of the failing instruction, `Span::DUMMY` when it has none.
    pub span: Span,
}

#[derive(Clone, PartialEq, Debug, Error)]
pub enum VmErrorKind {
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in {op} of `{kind}` values")]
    IntegerOverflow { op: ArithOp, kind: NumKind },
    #[error("call depth exceeded the limit of {limit}")]
    CallDepthExceeded { limit: usize },
    #[error(transparent)]
    Native(#[from] NativeError),
    /// The program's operands do not match its opcodes.
    #[error("malformed instruction: {0}")]
    MalformedInstruction(&'static str),
}
