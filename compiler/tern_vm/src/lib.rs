//! Interpreter for Tern bytecode.
//!
//! A [`Vm`] runs a [`Program`](tern_bytecode::Program) starting at its
//! `start` procedure. Arithmetic is checked: integer overflow and division
//! by zero are run-time errors rather than wrapping or trapping. Native
//! blocks are handed to a [`NativeBackend`] and cached per block.

mod arith;
mod error;
mod interpreter;
mod native;

pub use arith::{binary, convert, negate, ArithOp};
pub use error::{VmError, VmErrorKind};
pub use interpreter::{RunOutput, Vm, VmConfig};
pub use native::{NativeBackend, NativeError, NativeFn, UnavailableBackend};
