//! Register words and the machine kinds that interpret them.

use std::fmt;

use tern_types::Type;

/// An untyped 64-bit register word.
///
/// A word carries no kind of its own; each instruction says how to read it.
/// Canonical forms: signed integers sign-extended, unsigned integers
/// zero-extended, `f64` as its bit pattern, `f32` as its bit pattern in the
/// low 32 bits.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Word(u64);

impl Word {
    pub const ZERO: Word = Word(0);

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Word(bits)
    }

    #[inline]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[inline]
    #[expect(clippy::cast_sign_loss, reason = "two's complement reinterpretation")]
    pub const fn from_i64(value: i64) -> Self {
        Word(value as u64)
    }

    #[inline]
    #[expect(clippy::cast_possible_wrap, reason = "two's complement reinterpretation")]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Word(value)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_f64(value: f64) -> Self {
        Word(value.to_bits())
    }

    #[inline]
    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    #[inline]
    pub fn from_f32(value: f32) -> Self {
        Word(u64::from(value.to_bits()))
    }

    #[inline]
    #[expect(clippy::cast_possible_truncation, reason = "f32 lives in the low 32 bits")]
    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:#018x})", self.0)
    }
}

/// Machine kind an arithmetic or conversion opcode reads its words as.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NumKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumKind {
    pub const ALL: [NumKind; 10] = [
        NumKind::I8,
        NumKind::I16,
        NumKind::I32,
        NumKind::I64,
        NumKind::U8,
        NumKind::U16,
        NumKind::U32,
        NumKind::U64,
        NumKind::F32,
        NumKind::F64,
    ];

    /// Kind a value of `ty` is lowered to, or `None` for types without a
    /// machine representation.
    ///
    /// Relaxed literal types take the widest kind of their family, `char`
    /// is a 32-bit code point, and the native-width integers are 64 bits.
    pub const fn of(ty: Type) -> Option<NumKind> {
        Some(match ty {
            Type::Int8 => NumKind::I8,
            Type::Int16 => NumKind::I16,
            Type::Int32 => NumKind::I32,
            Type::Int64 | Type::Int | Type::InferredNumber | Type::InferredSigned => NumKind::I64,
            Type::Uint8 => NumKind::U8,
            Type::Uint16 => NumKind::U16,
            Type::Uint32 | Type::Char => NumKind::U32,
            Type::Uint64 | Type::Uint | Type::InferredUnsigned => NumKind::U64,
            Type::Float32 => NumKind::F32,
            Type::Float64 | Type::InferredFloat => NumKind::F64,
            Type::Text
            | Type::Empty
            | Type::Procedure
            | Type::Uninferred
            | Type::Unresolved
            | Type::Uncastable => return None,
        })
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, NumKind::F32 | NumKind::F64)
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self, NumKind::I8 | NumKind::I16 | NumKind::I32 | NumKind::I64)
    }

    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, NumKind::U8 | NumKind::U16 | NumKind::U32 | NumKind::U64)
    }

    pub const fn bits(self) -> u32 {
        match self {
            NumKind::I8 | NumKind::U8 => 8,
            NumKind::I16 | NumKind::U16 => 16,
            NumKind::I32 | NumKind::U32 | NumKind::F32 => 32,
            NumKind::I64 | NumKind::U64 | NumKind::F64 => 64,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            NumKind::I8 => "i8",
            NumKind::I16 => "i16",
            NumKind::I32 => "i32",
            NumKind::I64 => "i64",
            NumKind::U8 => "u8",
            NumKind::U16 => "u16",
            NumKind::U32 => "u32",
            NumKind::U64 => "u64",
            NumKind::F32 => "f32",
            NumKind::F64 => "f64",
        }
    }
}

impl fmt::Display for NumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
