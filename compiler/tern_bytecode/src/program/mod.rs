//! Three-address register bytecode.
//!
//! A [`Program`] is a set of [`Procedure`]s sharing one constant pool and
//! one metadata table. Each procedure owns a private register space;
//! registers are allocated once and never reused, so a register number
//! identifies one value for the whole procedure.

use std::fmt;

use rustc_hash::FxHashMap;
use tern_ir::{NodeId, Span};
use tern_types::Type;

use crate::{NumKind, Word};

/// Register in a procedure frame. Register 0 is the "no register" sentinel.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Register(u16);

impl Register {
    pub const NONE: Register = Register(0);
    /// Highest register number a procedure may use by default.
    pub const DEFAULT_LIMIT: u16 = 0x7FFF;

    #[inline]
    pub const fn new(raw: u16) -> Self {
        Register(raw)
    }

    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            f.write_str("r_")
        } else {
            write!(f, "r{}", self.0)
        }
    }
}

macro_rules! pool_index {
    ($(#[$doc:meta])* $name:ident($raw:ty), $prefix:literal) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[repr(transparent)]
        pub struct $name($raw);

        impl $name {
            #[inline]
            pub const fn new(raw: $raw) -> Self {
                $name(raw)
            }

            #[inline]
            pub const fn raw(self) -> $raw {
                self.0
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

pool_index!(
    /// Index into [`Program::constants`].
    ConstIdx(u32),
    "c"
);
pool_index!(
    /// Index into [`Program::metadata`].
    MetaIdx(u32),
    "m"
);
pool_index!(
    /// Index into [`Program::procedures`]. Procedure 0 is `start`.
    ProcIdx(u16),
    "p"
);

impl ProcIdx {
    pub const START: ProcIdx = ProcIdx(0);
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Opcode {
    Noop,
    /// `out = left`
    CopyValue,
    /// `out = constants[left]`
    LoadConst,
    /// `out = procedures[left]()`
    Call,
    /// Leave the procedure with `left`, or zero without an operand.
    Return,
    /// `out = native(metadata[left])`
    CallNative,
    Add(NumKind),
    Sub(NumKind),
    Mul(NumKind),
    Div(NumKind),
    /// `out = -left`
    Neg(NumKind),
    /// `out = left as to`
    Convert { from: NumKind, to: NumKind },
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Noop => f.write_str("NOOP"),
            Opcode::CopyValue => f.write_str("COPY_VALUE"),
            Opcode::LoadConst => f.write_str("LOAD_CONST"),
            Opcode::Call => f.write_str("CALL"),
            Opcode::Return => f.write_str("RETURN"),
            Opcode::CallNative => f.write_str("CALL_NATIVE"),
            Opcode::Add(kind) => write!(f, "ADD.{kind}"),
            Opcode::Sub(kind) => write!(f, "SUB.{kind}"),
            Opcode::Mul(kind) => write!(f, "MUL.{kind}"),
            Opcode::Div(kind) => write!(f, "DIV.{kind}"),
            Opcode::Neg(kind) => write!(f, "NEG.{kind}"),
            Opcode::Convert { from, to } => write!(f, "CONVERT.{from}.{to}"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    #[default]
    None,
    Reg(Register),
    Const(ConstIdx),
    Meta(MetaIdx),
    Proc(ProcIdx),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => f.write_str("_"),
            Operand::Reg(r) => write!(f, "{r:?}"),
            Operand::Const(c) => write!(f, "{c:?}"),
            Operand::Meta(m) => write!(f, "{m:?}"),
            Operand::Proc(p) => write!(f, "{p:?}"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    pub op: Opcode,
    pub out: Register,
    pub left: Operand,
    pub right: Operand,
}

impl Instruction {
    pub const fn new(op: Opcode, out: Register, left: Operand, right: Operand) -> Self {
        Instruction { op, out, left, right }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}, {}", self.op, self.out, self.left)?;
        if self.right != Operand::None {
            write!(f, ", {}", self.right)?;
        }
        Ok(())
    }
}

/// One value a native block reads or writes.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NativeSlot {
    pub name: String,
    /// Byte offset of the value in the native frame.
    pub offset: u32,
    pub register: Register,
}

/// Everything a native backend needs to build one block.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NativeCall {
    pub source: String,
    pub inputs: Vec<NativeSlot>,
    pub output: Option<NativeSlot>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Metadata {
    Native(NativeCall),
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Procedure {
    pub name: String,
    pub instructions: Vec<Instruction>,
    /// Source span of each instruction, parallel to `instructions`.
    pub spans: Vec<Span>,
    /// Register bound to each declaration owned by this procedure.
    pub registers: FxHashMap<NodeId, Register>,
    /// Next register to allocate; one past the highest in use.
    pub next_register: u16,
    /// Register written by the last writing instruction.
    pub last_register: Register,
    /// Type of `last_register`.
    pub last_type: Type,
}

impl Procedure {
    pub fn new(name: impl Into<String>) -> Self {
        Procedure {
            name: name.into(),
            instructions: Vec::new(),
            spans: Vec::new(),
            registers: FxHashMap::default(),
            next_register: 1,
            last_register: Register::NONE,
            last_type: Type::Empty,
        }
    }

    /// Size of a register file for this procedure, sentinel included.
    #[inline]
    pub fn frame_size(&self) -> usize {
        usize::from(self.next_register)
    }

    pub fn push(&mut self, instruction: Instruction, span: Span) {
        self.instructions.push(instruction);
        self.spans.push(span);
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        for (pc, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "  {pc:4}  {instruction}")?;
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    pub constants: Vec<Word>,
    pub procedures: Vec<Procedure>,
    pub metadata: Vec<Metadata>,
    /// Top-level variables of `start` by name.
    pub data_symbols: FxHashMap<String, Register>,
    /// Named procedures by name.
    pub text_symbols: FxHashMap<String, ProcIdx>,
}

impl Program {
    /// An empty program with only the `start` procedure.
    pub fn new() -> Self {
        Program {
            constants: Vec::new(),
            procedures: vec![Procedure::new("start")],
            metadata: Vec::new(),
            data_symbols: FxHashMap::default(),
            text_symbols: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn procedure(&self, idx: ProcIdx) -> Option<&Procedure> {
        self.procedures.get(idx.index())
    }

    #[inline]
    pub fn constant(&self, idx: ConstIdx) -> Option<Word> {
        self.constants.get(idx.index()).copied()
    }

    #[inline]
    pub fn metadata(&self, idx: MetaIdx) -> Option<&Metadata> {
        self.metadata.get(idx.index())
    }

    pub fn data_symbol(&self, name: &str) -> Option<Register> {
        self.data_symbols.get(name).copied()
    }

    pub fn text_symbol(&self, name: &str) -> Option<ProcIdx> {
        self.text_symbols.get(name).copied()
    }
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

/// Disassembly listing of every procedure.
impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, procedure) in self.procedures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{procedure}")?;
        }
        Ok(())
    }
}
