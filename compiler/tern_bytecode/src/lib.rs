//! Register bytecode for the Tern toolchain.
//!
//! [`generate`] lowers a resolved and typed tree into a [`Program`]: a set
//! of procedures of three-address [`Instruction`]s over untyped 64-bit
//! [`Word`] registers. Every arithmetic opcode names the [`NumKind`] its
//! operands are read as, so the interpreter never consults the type
//! system.

mod emit;
mod program;
mod word;

pub use emit::{generate, GenError, GenOptions, Generated, MAX_NATIVE_INPUTS};
pub use program::{
    ConstIdx, Instruction, MetaIdx, Metadata, NativeCall, NativeSlot, Opcode, Operand, ProcIdx,
    Procedure, Program, Register,
};
pub use word::{NumKind, Word};
